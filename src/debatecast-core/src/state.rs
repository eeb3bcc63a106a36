//! Debate state machine.
//!
//! Holds the current session and derives the flags the front end uses to
//! decide which actions are available.

use tracing::{debug, warn};

use crate::session::{Phase, Session, SessionId, SessionSnapshot};
use crate::statement::Statement;

/// Session state plus the derived question flag.
#[derive(Debug, Clone, Default)]
pub struct DebateState {
    session: Option<Session>,
    needs_question: bool,
    /// Set while a turn is in flight; keeps `needs_question` false.
    suppressed: bool,
}

impl DebateState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session.as_ref().map(|s| &s.id)
    }

    pub fn transcript(&self) -> &[Statement] {
        self.session
            .as_ref()
            .map(|s| s.transcript.as_slice())
            .unwrap_or(&[])
    }

    pub fn current_phase(&self) -> Phase {
        self.session
            .as_ref()
            .map(|s| s.phase)
            .unwrap_or(Phase::NotStarted)
    }

    pub fn is_judged(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.winner.is_some())
    }

    pub fn is_ended(&self) -> bool {
        self.is_judged() || self.session.as_ref().is_some_and(Session::has_closing)
    }

    pub fn needs_question(&self) -> bool {
        self.needs_question && !self.is_ended()
    }

    /// Track a freshly allocated session with an empty transcript.
    ///
    /// The question prompt stays suppressed until the opening has been narrated.
    pub fn begin(&mut self, id: SessionId) {
        self.session = Some(Session::new(id));
        self.suppress_question();
    }

    /// Replace the session wholesale with a server snapshot.
    ///
    /// Returns every statement of the new transcript, in order.
    pub fn replace(&mut self, id: SessionId, snapshot: &SessionSnapshot) -> Vec<Statement> {
        let mut session = Session::new(id);
        session.topic = snapshot.topic.clone().unwrap_or_default();
        session.transcript = snapshot.statements.clone().unwrap_or_default();
        session.questions = snapshot.questions.clone().unwrap_or_default();
        session.winner = snapshot.decided_winner().map(str::to_string);
        session.phase = session.derived_phase();

        let revealed = session.transcript.clone();
        self.session = Some(session);
        self.suppressed = false;
        self.needs_question = !self.is_ended() && !self.is_judged();
        debug!(
            phase = ?self.current_phase(),
            statements = revealed.len(),
            "Session state replaced"
        );
        revealed
    }

    /// Merge a snapshot into the current session.
    ///
    /// The phase is left alone; the pipeline advances it once the revealed
    /// statements have been narrated.
    ///
    /// Full snapshots are authoritative for the transcript; the returned
    /// statements are the ones not previously known, in transcript order.
    /// Applying the same snapshot twice reveals nothing the second time.
    /// A snapshot for a different session replaces state wholesale.
    pub fn apply_snapshot(&mut self, id: &SessionId, snapshot: &SessionSnapshot) -> Vec<Statement> {
        if self.session_id() != Some(id) {
            return self.replace(id.clone(), snapshot);
        }
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };

        if let Some(topic) = snapshot.topic.as_ref().filter(|t| !t.is_empty()) {
            session.topic = topic.clone();
        }

        let mut revealed = Vec::new();
        if let Some(statements) = &snapshot.statements {
            let common = session
                .transcript
                .iter()
                .zip(statements.iter())
                .take_while(|(a, b)| a == b)
                .count();
            if common < session.transcript.len() {
                warn!(
                    session = %session.id,
                    local = session.transcript.len(),
                    common,
                    "Server transcript diverged from local copy; adopting server version"
                );
            }
            revealed = statements[common..].to_vec();
            session.transcript = statements.clone();
        }

        if let Some(questions) = &snapshot.questions {
            session.questions = questions.clone();
        }
        if let Some(winner) = snapshot.decided_winner() {
            session.winner = Some(winner.to_string());
        }

        if !self.suppressed {
            self.needs_question = !self.is_ended();
        }
        revealed
    }

    /// Move to `phase` unless that would go backwards.
    pub fn advance_phase(&mut self, phase: Phase) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if phase.rank() < session.phase.rank() {
            warn!(from = ?session.phase, to = ?phase, "Refusing backwards phase transition");
            return false;
        }
        session.phase = phase;
        true
    }

    /// Hide the question prompt while a turn is in flight.
    pub fn suppress_question(&mut self) {
        self.suppressed = true;
        self.needs_question = false;
    }

    /// Re-derive the question prompt after a turn finished or failed.
    pub fn restore_question(&mut self) {
        self.suppressed = false;
        self.needs_question = self.session.is_some() && !self.is_ended();
    }

    /// Forget the session entirely.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::StatementKind;

    fn opening() -> Vec<Statement> {
        vec![
            Statement::new("moderator", "Welcome.", StatementKind::Opening),
            Statement::new("pro", "Yes.", StatementKind::Opening),
            Statement::new("con", "No.", StatementKind::Opening),
        ]
    }

    fn id() -> SessionId {
        SessionId::new("1")
    }

    #[test]
    fn test_replace_derives_flags() {
        let mut state = DebateState::new();
        let revealed = state.replace(id(), &SessionSnapshot::full(id(), "Topic", opening()));

        assert_eq!(revealed.len(), 3);
        assert_eq!(state.current_phase(), Phase::AwaitingQuestion);
        assert!(state.needs_question());
        assert!(!state.is_ended());
        assert!(!state.is_judged());
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut state = DebateState::new();
        state.replace(id(), &SessionSnapshot::full(id(), "Topic", vec![]));

        let snapshot = SessionSnapshot::full(id(), "Topic", opening());
        let first = state.apply_snapshot(&id(), &snapshot);
        let flags = (state.needs_question(), state.is_ended(), state.is_judged(), state.current_phase());
        let second = state.apply_snapshot(&id(), &snapshot);

        assert_eq!(first.len(), 3);
        assert!(second.is_empty());
        assert_eq!(state.transcript().len(), 3);
        assert_eq!(
            flags,
            (state.needs_question(), state.is_ended(), state.is_judged(), state.current_phase())
        );
    }

    #[test]
    fn test_winner_implies_judged_and_ended() {
        let mut state = DebateState::new();
        state.replace(id(), &SessionSnapshot::full(id(), "Topic", opening()));
        state.apply_snapshot(&id(), &SessionSnapshot::default().with_winner("pro"));

        assert!(state.is_judged());
        assert!(state.is_ended());
        assert!(!state.needs_question());
        assert_eq!(state.transcript().len(), 3);
        assert_eq!(state.current_phase(), Phase::AwaitingQuestion);

        assert!(state.advance_phase(Phase::Judged));
        assert_eq!(state.current_phase(), Phase::Judged);
    }

    #[test]
    fn test_closing_ends_debate_without_judgment() {
        let mut transcript = opening();
        transcript.push(Statement::new("pro", "In closing.", StatementKind::Closing));

        let mut state = DebateState::new();
        state.replace(id(), &SessionSnapshot::full(id(), "Topic", transcript));

        assert!(state.is_ended());
        assert!(!state.is_judged());
        assert!(!state.needs_question());
        assert_eq!(state.current_phase(), Phase::AwaitingVerdict);
    }

    #[test]
    fn test_suppression_survives_snapshots_until_restored() {
        let mut state = DebateState::new();
        state.replace(id(), &SessionSnapshot::full(id(), "Topic", vec![]));
        state.suppress_question();

        state.apply_snapshot(&id(), &SessionSnapshot::full(id(), "Topic", opening()));
        assert!(!state.needs_question());

        state.restore_question();
        assert!(state.needs_question());
    }

    #[test]
    fn test_phase_does_not_move_backwards() {
        let mut state = DebateState::new();
        state.replace(id(), &SessionSnapshot::full(id(), "Topic", opening()).with_winner("con"));

        assert!(!state.advance_phase(Phase::AwaitingQuestion));
        assert_eq!(state.current_phase(), Phase::Judged);
    }

    #[test]
    fn test_divergent_transcript_adopts_server_version() {
        let mut state = DebateState::new();
        state.replace(id(), &SessionSnapshot::full(id(), "Topic", opening()));

        let mut server = opening();
        server[2] = Statement::new("con", "Actually, no.", StatementKind::Opening);
        let revealed = state.apply_snapshot(&id(), &SessionSnapshot::full(id(), "Topic", server));

        assert_eq!(revealed.len(), 1);
        assert_eq!(state.transcript()[2].text, "Actually, no.");
    }

    #[test]
    fn test_snapshot_for_other_session_replaces() {
        let mut state = DebateState::new();
        state.replace(id(), &SessionSnapshot::full(id(), "Topic", opening()));

        let other = SessionId::new("2");
        let revealed = state.apply_snapshot(&other, &SessionSnapshot::full(other.clone(), "Other", vec![]));

        assert!(revealed.is_empty());
        assert_eq!(state.session_id(), Some(&other));
        assert!(state.transcript().is_empty());
    }
}
