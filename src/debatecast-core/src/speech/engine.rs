//! Speech engine boundary.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::DebateError;
use crate::voice::Voice;

/// A text-to-speech engine that can play one utterance at a time.
///
/// Implementations:
/// - `KokoroEngine`: local synthesis into a WAV recording
/// - `PacedTextEngine`: no audio, paces by word count
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Voices currently available. May be empty while the engine warms up.
    async fn list_voices(&self) -> Vec<Voice>;

    /// Speak `text` and resolve when the utterance ends.
    ///
    /// `voice` of `None` means the engine's own default.
    async fn speak(&self, text: &str, voice: Option<&Voice>) -> Result<(), DebateError>;

    /// Stop the current utterance, if any.
    fn stop(&self);

    /// Whether the engine is producing speech right now.
    fn is_speaking(&self) -> bool;

    /// Notification fired when the voice catalogue changes.
    fn voices_changed(&self) -> Option<broadcast::Receiver<()>> {
        None
    }

    /// Engine name for logging.
    fn name(&self) -> &str;
}
