//! Configuration module for loading TOML config files.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::DebateError;

/// Upper bound on the engine-busy settling delay.
pub const MAX_SETTLE_MS: u64 = 200;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub voices: VoicesConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub announcements: AnnouncementsConfig,
}

/// Debate service connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    /// Audience the bearer token is requested for.
    pub audience: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            audience: "debate-arena-api".to_string(),
            timeout_secs: 120,
            connect_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Preferred voice for one speaker role.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleVoiceConfig {
    /// Voice name fragments, most preferred first.
    #[serde(default)]
    pub names: Vec<String>,
    /// Locale to fall back to when no name matches.
    #[serde(default)]
    pub locale: Option<String>,
}

impl RoleVoiceConfig {
    fn new(names: &[&str], locale: &str) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            locale: Some(locale.to_string()),
        }
    }
}

/// Voice configuration for TTS.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoicesConfig {
    /// Session language; voices in this language are preferred.
    pub language: String,
    pub moderator: RoleVoiceConfig,
    pub pro: RoleVoiceConfig,
    pub con: RoleVoiceConfig,
}

impl Default for VoicesConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            moderator: RoleVoiceConfig::new(&["af_sky", "David", "Google US English"], "en-US"),
            pro: RoleVoiceConfig::new(&["bf_emma", "Zira", "Google UK English Female"], "en-GB"),
            con: RoleVoiceConfig::new(&["bm_george", "Mark", "Google UK English Male"], "en-GB"),
        }
    }
}

/// Narration timing and synthesis settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Pause after stopping a stray utterance before starting the next one.
    pub settle_ms: u64,
    /// Delay before re-checking an empty voice catalogue.
    pub voice_retry_ms: u64,
    /// Longest text chunk handed to the synthesizer at once.
    pub chunk_chars: usize,
    /// Silence between utterances in the recording.
    pub gap_seconds: f32,
    pub sample_rate: u32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            settle_ms: 150,
            voice_retry_ms: 300,
            chunk_chars: 200,
            gap_seconds: 0.5,
            sample_rate: 24_000,
        }
    }
}

impl SpeechConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms.min(MAX_SETTLE_MS))
    }

    pub fn voice_retry_delay(&self) -> Duration {
        Duration::from_millis(self.voice_retry_ms)
    }
}

/// Moderator lines spoken locally around server statements.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnnouncementsConfig {
    /// Template for the moderator's question echo; `{question}` is replaced.
    pub question: String,
    /// Spoken after the closing arguments.
    pub closing_outro: String,
    /// Spoken after the verdict; `{winner}` is replaced.
    pub verdict: String,
}

impl Default for AnnouncementsConfig {
    fn default() -> Self {
        Self {
            question: "Next question: {question}".to_string(),
            closing_outro: "This concludes our debate. We will now await judgment.".to_string(),
            verdict: "After careful consideration, the winner of this debate is... the {winner} side!"
                .to_string(),
        }
    }
}

impl AnnouncementsConfig {
    pub fn question_line(&self, question: &str) -> String {
        self.question.replace("{question}", question)
    }

    pub fn verdict_line(&self, winner: &str) -> String {
        self.verdict.replace("{winner}", &winner.to_uppercase())
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DebateError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| DebateError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, DebateError> {
        toml::from_str(content)
            .map_err(|e| DebateError::ConfigError(format!("Failed to parse config: {}", e)))
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config::default()
}
