//! Statements spoken during a debate.
//!
//! A statement is produced by the remote service (or locally, for
//! announcements) and never changes after creation.

use serde::{Deserialize, Serialize};

/// Role a speaker plays, derived from the free-form speaker label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeakerRole {
    /// Moderator or judge.
    Moderator,
    /// Arguing in favor of the topic.
    Pro,
    /// Arguing against the topic.
    Con,
    /// Any label the heuristics do not recognise.
    Other,
}

impl SpeakerRole {
    /// Classify a speaker label by substring, moderator/judge first.
    pub fn from_speaker(speaker: &str) -> Self {
        let lower = speaker.to_lowercase();
        if lower.contains("moderator") || lower.contains("judge") {
            SpeakerRole::Moderator
        } else if lower.contains("pro") {
            SpeakerRole::Pro
        } else if lower.contains("con") {
            SpeakerRole::Con
        } else {
            SpeakerRole::Other
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SpeakerRole::Moderator => "MODERATOR",
            SpeakerRole::Pro => "PRO",
            SpeakerRole::Con => "CON",
            SpeakerRole::Other => "SPEAKER",
        }
    }
}

/// What part of the debate a statement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StatementKind {
    Opening,
    Response,
    Rebuttal,
    Closing,
    Verdict,
    System,
}

impl StatementKind {
    /// Wire name used by the debate service.
    pub fn wire_name(&self) -> &'static str {
        match self {
            StatementKind::Opening => "opening_statement",
            StatementKind::Response => "initial_question_response",
            StatementKind::Rebuttal => "rebuttal",
            StatementKind::Closing => "closing_argument",
            StatementKind::Verdict => "judgment",
            StatementKind::System => "narration",
        }
    }
}

impl From<String> for StatementKind {
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "opening_statement" | "opening" => StatementKind::Opening,
            // The service has shipped this key misspelt; accept both.
            "initial_question_response" | "intitial_question_response" | "response" => {
                StatementKind::Response
            }
            "rebuttal" => StatementKind::Rebuttal,
            "closing_argument" | "closing" => StatementKind::Closing,
            "judgment" | "verdict" => StatementKind::Verdict,
            _ => StatementKind::System,
        }
    }
}

impl From<StatementKind> for String {
    fn from(kind: StatementKind) -> Self {
        kind.wire_name().to_string()
    }
}

/// A single entry of the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// Speaker label as reported by the service (e.g. "moderator", "pro").
    pub speaker: String,
    /// Spoken text.
    pub text: String,
    /// Debate part this statement belongs to.
    #[serde(rename = "response_type", default = "default_kind")]
    pub kind: StatementKind,
}

fn default_kind() -> StatementKind {
    StatementKind::System
}

impl Statement {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>, kind: StatementKind) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            kind,
        }
    }

    /// A locally generated moderator announcement.
    pub fn announcement(text: impl Into<String>) -> Self {
        Self::new("moderator", text, StatementKind::System)
    }

    pub fn role(&self) -> SpeakerRole {
        SpeakerRole::from_speaker(&self.speaker)
    }

    pub fn is_closing(&self) -> bool {
        self.kind == StatementKind::Closing
    }

    /// Get the speaker label with role, e.g. "pro (PRO)".
    pub fn display_name_with_role(&self) -> String {
        format!("{} ({})", self.speaker, self.role().display_name())
    }
}
