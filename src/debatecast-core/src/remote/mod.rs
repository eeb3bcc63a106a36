//! Remote turn client boundary.
//!
//! One call per phase transition. Clients never retry; failures surface
//! immediately so the caller can decide what to do.

pub mod http;

use async_trait::async_trait;

use crate::error::DebateError;
use crate::session::{SessionId, SessionSnapshot, SessionSummary};

pub use http::HttpTurnClient;

/// Request/response access to the debate service.
#[async_trait]
pub trait TurnClient: Send + Sync {
    /// Start a new debate; the snapshot carries the allocated session id.
    async fn start_session(&self, topic: &str) -> Result<SessionSnapshot, DebateError>;

    /// Ask both sides a question and collect their responses and rebuttals.
    async fn submit_question(
        &self,
        id: &SessionId,
        question: &str,
    ) -> Result<SessionSnapshot, DebateError>;

    /// Collect closing arguments from both sides.
    async fn request_closing(&self, id: &SessionId) -> Result<SessionSnapshot, DebateError>;

    /// Ask the judge for a verdict.
    async fn request_judgment(&self, id: &SessionId) -> Result<SessionSnapshot, DebateError>;

    /// Fetch the authoritative record of a session.
    async fn fetch_session(&self, id: &SessionId) -> Result<SessionSnapshot, DebateError>;

    /// List the current user's debates.
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, DebateError>;
}

/// Supplies bearer tokens for the debate service.
#[async_trait]
pub trait CredentialSupplier: Send + Sync {
    /// Token scoped to `audience`. Failures must be `DebateError::Auth`.
    async fn bearer_token(&self, audience: &str) -> Result<String, DebateError>;
}

/// A fixed token, e.g. from the environment.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl CredentialSupplier for StaticToken {
    async fn bearer_token(&self, _audience: &str) -> Result<String, DebateError> {
        if self.0.trim().is_empty() {
            return Err(DebateError::Auth("Empty bearer token".to_string()));
        }
        Ok(self.0.clone())
    }
}
