//! Voice selection for narration.
//!
//! Maps a speaker label to one of the voices the speech engine offers. The
//! policy is a pure strategy so platforms with different catalogues can swap
//! it out.

use serde::{Deserialize, Serialize};

use crate::config::{RoleVoiceConfig, VoicesConfig};
use crate::statement::SpeakerRole;

/// A synthesis voice offered by the speech engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub name: String,
    /// BCP 47 tag, e.g. "en-GB".
    pub locale: String,
    pub is_default: bool,
}

impl Voice {
    pub fn new(name: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locale: locale.into(),
            is_default: false,
        }
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    fn speaks(&self, language: &str) -> bool {
        self.locale
            .to_lowercase()
            .starts_with(&language.to_lowercase())
    }
}

/// Strategy for picking a voice per speaker.
pub trait VoicePolicy: Send + Sync {
    /// Pick a voice for `speaker` from `voices`, or `None` for the engine default.
    fn select_voice(&self, speaker: &str, voices: &[Voice]) -> Option<Voice>;
}

/// Name and locale heuristics with a deterministic fallback chain.
#[derive(Debug, Clone)]
pub struct HeuristicVoicePolicy {
    config: VoicesConfig,
}

impl HeuristicVoicePolicy {
    pub fn new(config: VoicesConfig) -> Self {
        Self { config }
    }

    fn preferences(&self, role: SpeakerRole) -> Option<&RoleVoiceConfig> {
        match role {
            SpeakerRole::Moderator => Some(&self.config.moderator),
            SpeakerRole::Pro => Some(&self.config.pro),
            SpeakerRole::Con => Some(&self.config.con),
            SpeakerRole::Other => None,
        }
    }

    fn preferred<'a>(&self, prefs: &RoleVoiceConfig, voices: &'a [Voice]) -> Option<&'a Voice> {
        let language = &self.config.language;
        prefs
            .names
            .iter()
            .find_map(|n| voices.iter().find(|v| v.speaks(language) && v.name.contains(n.as_str())))
            .or_else(|| {
                prefs
                    .locale
                    .as_deref()
                    .and_then(|locale| voices.iter().find(|v| v.speaks(locale)))
            })
    }

    fn fallback<'a>(&self, voices: &'a [Voice]) -> Option<&'a Voice> {
        let language = &self.config.language;
        voices
            .iter()
            .find(|v| v.is_default && v.speaks(language))
            .or_else(|| voices.iter().find(|v| v.speaks(language)))
            .or_else(|| voices.first())
    }
}

impl Default for HeuristicVoicePolicy {
    fn default() -> Self {
        Self::new(VoicesConfig::default())
    }
}

impl VoicePolicy for HeuristicVoicePolicy {
    fn select_voice(&self, speaker: &str, voices: &[Voice]) -> Option<Voice> {
        let role = SpeakerRole::from_speaker(speaker);
        self.preferences(role)
            .and_then(|prefs| self.preferred(prefs, voices))
            .or_else(|| self.fallback(voices))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalogue() -> Vec<Voice> {
        vec![
            Voice::new("Microsoft David", "en-US"),
            Voice::new("Google UK English Female", "en-GB"),
            Voice::new("Google UK English Male", "en-GB"),
            Voice::new("Google Deutsch", "de-DE").as_default(),
        ]
    }

    #[test]
    fn test_empty_catalogue_selects_none() {
        let policy = HeuristicVoicePolicy::default();
        assert_eq!(policy.select_voice("Pro", &[]), None);
    }

    #[test]
    fn test_roles_map_to_preferred_voices() {
        let policy = HeuristicVoicePolicy::default();
        let voices = catalogue();

        assert_eq!(policy.select_voice("Moderator", &voices).unwrap().name, "Microsoft David");
        assert_eq!(policy.select_voice("Judge", &voices).unwrap().name, "Microsoft David");
        assert_eq!(policy.select_voice("pro", &voices).unwrap().name, "Google UK English Female");
        assert_eq!(policy.select_voice("Con", &voices).unwrap().name, "Google UK English Male");
    }

    #[test]
    fn test_unknown_role_falls_back_to_language_match() {
        let policy = HeuristicVoicePolicy::default();
        let voices = catalogue();

        // The default voice is German, so the first English voice wins.
        assert_eq!(policy.select_voice("audience", &voices).unwrap().name, "Microsoft David");
    }

    #[test]
    fn test_falls_back_to_first_voice_without_language_match() {
        let policy = HeuristicVoicePolicy::default();
        let voices = vec![Voice::new("Thomas", "fr-FR"), Voice::new("Anna", "de-DE")];

        assert_eq!(policy.select_voice("pro", &voices).unwrap().name, "Thomas");
    }

    #[test]
    fn test_locale_preference_without_name_match() {
        let policy = HeuristicVoicePolicy::default();
        let voices = vec![Voice::new("Samantha", "en-US"), Voice::new("Daniel", "en-GB")];

        assert_eq!(policy.select_voice("con", &voices).unwrap().name, "Daniel");
    }

    #[test]
    fn test_kokoro_voice_ids() {
        let policy = HeuristicVoicePolicy::default();
        let voices = vec![
            Voice::new("af_sky", "en-US"),
            Voice::new("bf_emma", "en-GB"),
            Voice::new("bm_george", "en-GB"),
        ];

        assert_eq!(policy.select_voice("moderator", &voices).unwrap().name, "af_sky");
        assert_eq!(policy.select_voice("pro", &voices).unwrap().name, "bf_emma");
        assert_eq!(policy.select_voice("con", &voices).unwrap().name, "bm_george");
    }

    #[test]
    fn test_name_preference_order_beats_catalogue_order() {
        let policy = HeuristicVoicePolicy::default();
        let voices = vec![
            Voice::new("Google UK English Female", "en-GB"),
            Voice::new("bf_emma", "en-GB"),
        ];

        assert_eq!(policy.select_voice("pro", &voices).unwrap().name, "bf_emma");
    }

    #[test]
    fn test_selection_is_deterministic() {
        let policy = HeuristicVoicePolicy::default();
        let voices = catalogue();
        let first = policy.select_voice("pro", &voices);
        assert_eq!(first, policy.select_voice("pro", &voices));
    }
}
