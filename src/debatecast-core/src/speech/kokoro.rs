//! Local narration using kokoro-tiny.
//!
//! Utterances are synthesized chunk by chunk and appended to a
//! [`NarrationRecorder`], which is written out as a WAV file at the end of
//! the session.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kokoro_tiny::TtsEngine;
use tracing::{debug, info};

use crate::config::SpeechConfig;
use crate::error::DebateError;
use crate::speech::engine::SpeechEngine;
use crate::speech::text::split_into_chunks;
use crate::voice::Voice;

/// Default voice when the caller has no preference.
const FALLBACK_VOICE: &str = "af_sky";

/// Accumulates narrated audio for the whole session.
pub struct NarrationRecorder {
    samples: Mutex<Vec<f32>>,
    sample_rate: u32,
    gap_samples: usize,
}

impl NarrationRecorder {
    pub fn new(sample_rate: u32, gap_seconds: f32) -> Self {
        Self {
            samples: Mutex::new(Vec::new()),
            sample_rate,
            gap_samples: (gap_seconds.max(0.0) * sample_rate as f32) as usize,
        }
    }

    /// Append one utterance followed by the configured silence gap.
    pub fn append(&self, utterance: &[f32]) -> Result<(), DebateError> {
        let mut samples = self
            .samples
            .lock()
            .map_err(|_| DebateError::Narration("Recorder lock poisoned".to_string()))?;
        samples.extend_from_slice(utterance);
        samples.extend(std::iter::repeat_n(0.0, self.gap_samples));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.samples.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration_secs(&self) -> f32 {
        self.len() as f32 / self.sample_rate as f32
    }

    /// Save the recording as a mono 32-bit float WAV file.
    pub fn save_wav<P: AsRef<Path>>(&self, path: P) -> Result<(), DebateError> {
        let samples = self
            .samples
            .lock()
            .map_err(|_| DebateError::Narration("Recorder lock poisoned".to_string()))?;
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path.as_ref(), spec)
            .map_err(|e| DebateError::Narration(format!("Failed to create WAV: {}", e)))?;
        for sample in samples.iter() {
            writer
                .write_sample(*sample)
                .map_err(|e| DebateError::Narration(format!("Failed to write WAV: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| DebateError::Narration(format!("Failed to save WAV: {}", e)))?;
        info!(path = %path.as_ref().display(), seconds = self.duration_secs(), "Narration saved");
        Ok(())
    }
}

/// Speech engine backed by the kokoro-tiny synthesizer.
pub struct KokoroEngine {
    engine: Arc<Mutex<TtsEngine>>,
    available_voices: Vec<String>,
    recorder: Arc<NarrationRecorder>,
    chunk_chars: usize,
    speaking: AtomicBool,
    /// Bumped by `stop`; an utterance started under an older value is discarded.
    generation: AtomicU64,
}

impl KokoroEngine {
    /// Initialize the TTS engine (downloads model on first run).
    pub async fn new(config: &SpeechConfig) -> Result<Self, DebateError> {
        let engine = TtsEngine::new()
            .await
            .map_err(|e| DebateError::Narration(format!("Failed to initialize TTS: {}", e)))?;

        let available_voices = engine.voices();
        info!(voices = available_voices.len(), "Kokoro engine ready");

        Ok(Self {
            engine: Arc::new(Mutex::new(engine)),
            available_voices,
            recorder: Arc::new(NarrationRecorder::new(config.sample_rate, config.gap_seconds)),
            chunk_chars: config.chunk_chars.max(1),
            speaking: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        })
    }

    pub fn recorder(&self) -> Arc<NarrationRecorder> {
        Arc::clone(&self.recorder)
    }

    /// Validate that a voice ID exists.
    fn validate_voice(&self, voice_id: &str) -> Result<(), DebateError> {
        if !self.available_voices.iter().any(|v| v == voice_id) {
            return Err(DebateError::Narration(format!("Unknown voice '{}'", voice_id)));
        }
        Ok(())
    }

    async fn synthesize_chunk(&self, chunk: String, voice_id: String) -> Result<Vec<f32>, DebateError> {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || {
            let mut engine = engine
                .lock()
                .map_err(|_| DebateError::Narration("TTS engine lock poisoned".to_string()))?;
            engine
                .synthesize(&chunk, Some(voice_id.as_str()))
                .map_err(|e| DebateError::Narration(format!("Synthesis failed: {}", e)))
        })
        .await
        .map_err(|e| DebateError::Narration(format!("Synthesis task failed: {}", e)))?
    }
}

#[async_trait]
impl SpeechEngine for KokoroEngine {
    async fn list_voices(&self) -> Vec<Voice> {
        self.available_voices
            .iter()
            .map(|id| {
                let voice = Voice::new(id.clone(), kokoro_locale(id));
                if id == FALLBACK_VOICE { voice.as_default() } else { voice }
            })
            .collect()
    }

    async fn speak(&self, text: &str, voice: Option<&Voice>) -> Result<(), DebateError> {
        let voice_id = voice
            .map(|v| v.name.clone())
            .unwrap_or_else(|| FALLBACK_VOICE.to_string());
        self.validate_voice(&voice_id)?;

        let generation = self.generation.load(Ordering::SeqCst);
        self.speaking.store(true, Ordering::SeqCst);

        let mut utterance = Vec::new();
        for chunk in split_into_chunks(text, self.chunk_chars) {
            if self.generation.load(Ordering::SeqCst) != generation {
                break;
            }
            match self.synthesize_chunk(chunk, voice_id.clone()).await {
                Ok(samples) => utterance.extend(samples),
                Err(e) => {
                    self.speaking.store(false, Ordering::SeqCst);
                    return Err(e);
                }
            }
        }

        let result = if self.generation.load(Ordering::SeqCst) == generation {
            self.recorder.append(&utterance)
        } else {
            debug!(voice = %voice_id, "Utterance stopped; discarding audio");
            Ok(())
        };
        self.speaking.store(false, Ordering::SeqCst);
        result
    }

    fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.speaking.store(false, Ordering::SeqCst);
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "kokoro"
    }
}

/// Locale implied by a kokoro voice id prefix ("af_sky" is American English).
pub fn kokoro_locale(voice_id: &str) -> &'static str {
    match voice_id.chars().next() {
        Some('a') => "en-US",
        Some('b') => "en-GB",
        Some('e') => "es-ES",
        Some('f') => "fr-FR",
        Some('h') => "hi-IN",
        Some('i') => "it-IT",
        Some('j') => "ja-JP",
        Some('p') => "pt-BR",
        Some('z') => "zh-CN",
        _ => "und",
    }
}
