//! Silent engine that paces narration by reading speed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::DebateError;
use crate::speech::engine::SpeechEngine;
use crate::voice::Voice;

/// Produces no audio; each utterance lasts as long as reading it would.
pub struct PacedTextEngine {
    words_per_minute: u32,
    speaking: AtomicBool,
    stop: Notify,
}

impl PacedTextEngine {
    pub fn new(words_per_minute: u32) -> Self {
        Self {
            words_per_minute: words_per_minute.max(1),
            speaking: AtomicBool::new(false),
            stop: Notify::new(),
        }
    }

    /// Time it takes to read `text` aloud.
    pub fn duration_for(&self, text: &str) -> Duration {
        let words = text.split_whitespace().count() as u64;
        Duration::from_millis(words * 60_000 / self.words_per_minute as u64)
    }
}

impl Default for PacedTextEngine {
    fn default() -> Self {
        Self::new(180)
    }
}

#[async_trait]
impl SpeechEngine for PacedTextEngine {
    async fn list_voices(&self) -> Vec<Voice> {
        vec![Voice::new("text", "en").as_default()]
    }

    async fn speak(&self, text: &str, _voice: Option<&Voice>) -> Result<(), DebateError> {
        let stopped = self.stop.notified();
        self.speaking.store(true, Ordering::SeqCst);
        tokio::select! {
            _ = tokio::time::sleep(self.duration_for(text)) => {}
            _ = stopped => {}
        }
        self.speaking.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stop.notify_waiters();
        self.speaking.store(false, Ordering::SeqCst);
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "paced-text"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_duration_scales_with_words() {
        let engine = PacedTextEngine::new(60);
        assert_eq!(engine.duration_for("one two three"), Duration::from_secs(3));
        assert_eq!(engine.duration_for(""), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_stop_ends_utterance_early() {
        let engine = Arc::new(PacedTextEngine::new(1));
        let speaking = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.speak("a very long speech", None).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(engine.is_speaking());
        engine.stop();

        tokio::time::timeout(Duration::from_secs(1), speaking)
            .await
            .expect("stop should end the utterance")
            .unwrap()
            .unwrap();
        assert!(!engine.is_speaking());
    }
}
