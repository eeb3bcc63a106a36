//! Error types for the debate client.

use thiserror::Error;

/// Coarse classification of a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCategory {
    /// The request was malformed or the debate is in the wrong state (400).
    BadRequest,
    /// The debate id is unknown to the service (404).
    NotFound,
    /// The request body failed schema validation (422).
    Validation,
    /// The service failed while handling the request (5xx).
    Server,
    /// The request never produced a response (connect, timeout, DNS).
    Transport,
    /// A response arrived but could not be decoded.
    Decode,
}

impl StatusCategory {
    /// Classify an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => StatusCategory::NotFound,
            422 => StatusCategory::Validation,
            400..=499 => StatusCategory::BadRequest,
            _ => StatusCategory::Server,
        }
    }
}

#[derive(Error, Debug)]
pub enum DebateError {
    #[error("Remote call failed ({category:?}): {message}")]
    Remote {
        category: StatusCategory,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Narration failed: {0}")]
    Narration(String),

    #[error("Response belongs to a discarded session (epoch {actual}, current {expected})")]
    StaleResponse { expected: u64, actual: u64 },

    #[error("Another action is still in progress")]
    Busy,

    #[error("No debate session is loaded")]
    NoSession,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DebateError {
    /// Status category for remote and transport failures.
    pub fn category(&self) -> Option<StatusCategory> {
        match self {
            DebateError::Remote { category, .. } => Some(*category),
            DebateError::Http(e) if e.is_decode() => Some(StatusCategory::Decode),
            DebateError::Http(_) => Some(StatusCategory::Transport),
            _ => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, DebateError::Auth(_))
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, DebateError::StaleResponse { .. })
    }

    /// Whether re-invoking the same action may succeed.
    pub fn is_retryable_by_user(&self) -> bool {
        matches!(self, DebateError::Remote { .. } | DebateError::Http(_) | DebateError::Busy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_category_mapping() {
        assert_eq!(StatusCategory::from_status(404), StatusCategory::NotFound);
        assert_eq!(StatusCategory::from_status(422), StatusCategory::Validation);
        assert_eq!(StatusCategory::from_status(400), StatusCategory::BadRequest);
        assert_eq!(StatusCategory::from_status(500), StatusCategory::Server);
        assert_eq!(StatusCategory::from_status(503), StatusCategory::Server);
    }

    #[test]
    fn test_error_predicates() {
        let remote = DebateError::Remote {
            category: StatusCategory::Server,
            message: "boom".to_string(),
        };
        assert!(remote.is_retryable_by_user());
        assert_eq!(remote.category(), Some(StatusCategory::Server));
        assert!(!remote.is_auth());

        let auth = DebateError::Auth("expired".to_string());
        assert!(auth.is_auth());
        assert!(!auth.is_retryable_by_user());
        assert_eq!(auth.category(), None);

        let stale = DebateError::StaleResponse { expected: 2, actual: 1 };
        assert!(stale.is_stale());
    }
}
