//! Debate session data: identifiers, phases, and server snapshots.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::statement::Statement;

/// Opaque session identifier allocated by the debate service.
///
/// The service reports ids as integers; they are kept as strings locally and
/// written back as integers when they parse as one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.parse::<i64>() {
            Ok(n) => serializer.serialize_i64(n),
            Err(_) => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => SessionId(s),
            RawId::Number(n) => SessionId(n.to_string()),
        })
    }
}

/// Phase of a debate session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    NotStarted,
    Opening,
    AwaitingQuestion,
    ProcessingTurn,
    ClosingArguments,
    AwaitingVerdict,
    Judged,
}

impl Phase {
    /// Ordering used to keep phase transitions monotonic.
    ///
    /// The question loop (`AwaitingQuestion` / `ProcessingTurn`) shares one
    /// rank so a debate can take any number of questions.
    pub fn rank(&self) -> u8 {
        match self {
            Phase::NotStarted => 0,
            Phase::Opening => 1,
            Phase::AwaitingQuestion | Phase::ProcessingTurn => 2,
            Phase::ClosingArguments => 3,
            Phase::AwaitingVerdict => 4,
            Phase::Judged => 5,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Phase::NotStarted => "Not started",
            Phase::Opening => "Opening statements",
            Phase::AwaitingQuestion => "Awaiting question",
            Phase::ProcessingTurn => "Processing turn",
            Phase::ClosingArguments => "Closing arguments",
            Phase::AwaitingVerdict => "Awaiting verdict",
            Phase::Judged => "Judged",
        }
    }
}

/// Session snapshot returned by the debate service.
///
/// A snapshot with `logs` is full: its transcript replaces the local one.
/// Without `logs` it is partial and only updates the fields it carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(rename = "debate_id", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(rename = "logs", default, skip_serializing_if = "Option::is_none")]
    pub statements: Option<Vec<Statement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    /// Judge responses report the verdict here as well as in `winner`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judgment: Option<String>,
    /// Free-form phase hint some responses carry (e.g. "Turn processed").
    #[serde(rename = "message", default, skip_serializing_if = "Option::is_none")]
    pub phase_marker: Option<String>,
}

impl SessionSnapshot {
    /// Full snapshot with the given transcript.
    pub fn full(id: SessionId, topic: impl Into<String>, statements: Vec<Statement>) -> Self {
        Self {
            session_id: Some(id),
            topic: Some(topic.into()),
            statements: Some(statements),
            ..Default::default()
        }
    }

    pub fn with_winner(mut self, winner: impl Into<String>) -> Self {
        self.winner = Some(winner.into());
        self
    }

    pub fn is_full(&self) -> bool {
        self.statements.is_some()
    }

    /// The decided winner, if any. Blank values count as undecided.
    pub fn decided_winner(&self) -> Option<&str> {
        self.winner
            .as_deref()
            .or(self.judgment.as_deref())
            .map(str::trim)
            .filter(|w| !w.is_empty())
    }
}

/// Locally tracked debate session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub topic: String,
    pub phase: Phase,
    pub transcript: Vec<Statement>,
    pub questions: Vec<String>,
    pub winner: Option<String>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            topic: String::new(),
            phase: Phase::NotStarted,
            transcript: Vec::new(),
            questions: Vec::new(),
            winner: None,
        }
    }

    pub fn has_closing(&self) -> bool {
        self.transcript.iter().any(Statement::is_closing)
    }

    /// Phase implied by the transcript and winner alone.
    pub fn derived_phase(&self) -> Phase {
        if self.winner.is_some() {
            Phase::Judged
        } else if self.has_closing() {
            Phase::AwaitingVerdict
        } else if self.transcript.is_empty() {
            Phase::NotStarted
        } else {
            Phase::AwaitingQuestion
        }
    }
}

/// Entry in the list of the user's debates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub winner: Option<String>,
    #[serde(default)]
    pub questions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::StatementKind;

    #[test]
    fn test_session_id_accepts_numbers_and_strings() {
        let snapshot: SessionSnapshot = serde_json::from_str(r#"{"debate_id": 42}"#).unwrap();
        assert_eq!(snapshot.session_id, Some(SessionId::new("42")));

        let snapshot: SessionSnapshot = serde_json::from_str(r#"{"debate_id": "abc"}"#).unwrap();
        assert_eq!(snapshot.session_id, Some(SessionId::new("abc")));
    }

    #[test]
    fn test_session_id_serializes_numeric_ids_as_numbers() {
        assert_eq!(serde_json::to_value(SessionId::new("7")).unwrap(), serde_json::json!(7));
        assert_eq!(
            serde_json::to_value(SessionId::new("x-7")).unwrap(),
            serde_json::json!("x-7")
        );
    }

    #[test]
    fn test_judge_response_with_both_winner_fields() {
        let json = r#"{"message":"Debate judged","judgment":"pro","winner":"pro","logs":[]}"#;
        let snapshot: SessionSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.decided_winner(), Some("pro"));
        assert!(snapshot.is_full());
    }

    #[test]
    fn test_blank_winner_is_undecided() {
        let snapshot = SessionSnapshot::default().with_winner("  ");
        assert_eq!(snapshot.decided_winner(), None);
        assert!(!snapshot.is_full());
    }

    #[test]
    fn test_phase_ranks_share_question_loop() {
        assert_eq!(Phase::AwaitingQuestion.rank(), Phase::ProcessingTurn.rank());
        assert!(Phase::Judged.rank() > Phase::AwaitingVerdict.rank());
        assert!(Phase::Opening.rank() > Phase::NotStarted.rank());
    }

    #[test]
    fn test_derived_phase() {
        let mut session = Session::new(SessionId::new("1"));
        assert_eq!(session.derived_phase(), Phase::NotStarted);

        session.transcript.push(Statement::new("pro", "Yes.", StatementKind::Opening));
        assert_eq!(session.derived_phase(), Phase::AwaitingQuestion);

        session.transcript.push(Statement::new("con", "No.", StatementKind::Closing));
        assert_eq!(session.derived_phase(), Phase::AwaitingVerdict);

        session.winner = Some("con".to_string());
        assert_eq!(session.derived_phase(), Phase::Judged);
    }
}
