//! Debatecast Core Library
//!
//! Drives a remotely hosted, turn-based AI debate and narrates each turn
//! aloud: session state, the debate service client, voice selection and
//! the serialized speech queue.

pub mod config;
pub mod epoch;
pub mod error;
pub mod pipeline;
pub mod remote;
pub mod script;
pub mod session;
pub mod speech;
pub mod state;
pub mod statement;
pub mod voice;

pub use config::Config;
pub use epoch::Epoch;
pub use error::{DebateError, StatusCategory};
pub use pipeline::{DebatePipeline, PipelineCallback, PipelineEvent, PipelineState, TurnReport};
pub use remote::{CredentialSupplier, HttpTurnClient, StaticToken, TurnClient};
pub use session::{Phase, Session, SessionId, SessionSnapshot, SessionSummary};
pub use speech::{
    KokoroEngine, NarrationOutcome, NarrationRecorder, PacedTextEngine, SpeechEngine, SpeechQueue,
};
pub use state::DebateState;
pub use statement::{SpeakerRole, Statement, StatementKind};
pub use voice::{HeuristicVoicePolicy, Voice, VoicePolicy};
