//! What gets said for each debate action.
//!
//! A turn's narration is the statements the service revealed, with the
//! moderator's question echo read through the question template, followed by
//! any closing announcement for the action.

use crate::config::AnnouncementsConfig;
use crate::session::Phase;
use crate::statement::{SpeakerRole, Statement, StatementKind};

/// A user action the pipeline can run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnAction {
    Start { topic: String },
    Question { question: String },
    Closing,
    Judgment,
    /// First local view of an existing session.
    Replay,
    /// Reload an existing session without narrating it.
    Refresh,
}

impl TurnAction {
    pub fn name(&self) -> &'static str {
        match self {
            TurnAction::Start { .. } => "start",
            TurnAction::Question { .. } => "question",
            TurnAction::Closing => "closing",
            TurnAction::Judgment => "judgment",
            TurnAction::Replay => "replay",
            TurnAction::Refresh => "refresh",
        }
    }

    /// Phase while the action's statements are being narrated.
    pub fn narrating_phase(&self) -> Option<Phase> {
        match self {
            TurnAction::Start { .. } => Some(Phase::Opening),
            TurnAction::Question { .. } => Some(Phase::ProcessingTurn),
            TurnAction::Closing => Some(Phase::ClosingArguments),
            TurnAction::Judgment => Some(Phase::AwaitingVerdict),
            TurnAction::Replay | TurnAction::Refresh => None,
        }
    }

    /// Phase once narration has finished.
    pub fn completed_phase(&self) -> Option<Phase> {
        match self {
            TurnAction::Start { .. } | TurnAction::Question { .. } => Some(Phase::AwaitingQuestion),
            TurnAction::Closing => Some(Phase::AwaitingVerdict),
            TurnAction::Judgment => Some(Phase::Judged),
            TurnAction::Replay | TurnAction::Refresh => None,
        }
    }
}

/// Lines to narrate for `action`, in speaking order.
///
/// `winner` is the session's verdict after the action was applied.
pub fn narration_lines(
    action: &TurnAction,
    revealed: &[Statement],
    winner: Option<&str>,
    announcements: &AnnouncementsConfig,
) -> Vec<Statement> {
    if *action == TurnAction::Refresh {
        return Vec::new();
    }

    let mut lines: Vec<Statement> = revealed
        .iter()
        .map(|statement| {
            if is_question_echo(statement) {
                Statement::new(
                    statement.speaker.clone(),
                    announcements.question_line(&statement.text),
                    statement.kind,
                )
            } else {
                statement.clone()
            }
        })
        .collect();

    match action {
        TurnAction::Closing if !revealed.is_empty() => {
            lines.push(Statement::announcement(announcements.closing_outro.clone()));
        }
        TurnAction::Judgment => {
            if let Some(winner) = winner {
                lines.push(Statement::announcement(announcements.verdict_line(winner)));
            }
        }
        _ => {}
    }

    lines
}

/// The moderator repeating the user's question at the start of a turn.
fn is_question_echo(statement: &Statement) -> bool {
    statement.kind == StatementKind::Response && statement.role() == SpeakerRole::Moderator
}
