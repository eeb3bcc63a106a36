//! Narration: the speech engine boundary and the queue in front of it.

pub mod engine;
pub mod kokoro;
pub mod paced;
pub mod queue;
pub mod text;

pub use engine::SpeechEngine;
pub use kokoro::{KokoroEngine, NarrationRecorder};
pub use paced::PacedTextEngine;
pub use queue::{NarrationOutcome, SpeechQueue};
