//! Turn orchestration.
//!
//! Runs one user action at a time: call the debate service, merge the
//! response into the session state, then narrate the new statements in
//! transcript order before accepting the next action.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::config::AnnouncementsConfig;
use crate::epoch::Epoch;
use crate::error::{DebateError, StatusCategory};
use crate::remote::TurnClient;
use crate::script::{TurnAction, narration_lines};
use crate::session::{Phase, Session, SessionId, SessionSnapshot, SessionSummary};
use crate::speech::{NarrationOutcome, SpeechQueue};
use crate::state::DebateState;
use crate::statement::Statement;

/// What the pipeline is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    /// Waiting for the debate service.
    Dispatching,
    /// Narrating the statements of the last response.
    Narrating,
}

/// Events emitted while actions run.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    StateChanged { state: PipelineState },
    /// A statement the service returned that had not been seen before.
    StatementRevealed { statement: Statement },
    /// A line is about to be spoken.
    NarrationStarted { speaker: String, text: String },
    NarrationFinished { speaker: String, outcome: NarrationOutcome },
    PhaseChanged { phase: Phase },
    /// An action failed; the debate can be resumed by retrying it.
    Error { message: String },
}

/// Callback for pipeline events.
pub type PipelineCallback = Box<dyn Fn(PipelineEvent) + Send + Sync>;

/// Summary of one completed action.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    pub session: Option<SessionId>,
    /// Statements newly added to the transcript.
    pub revealed: usize,
    pub narrated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Phase after the action.
    pub phase: Phase,
}

impl TurnReport {
    fn new(session: Option<SessionId>, revealed: usize) -> Self {
        Self {
            session,
            revealed,
            narrated: 0,
            skipped: 0,
            failed: 0,
            cancelled: 0,
            phase: Phase::NotStarted,
        }
    }

    fn record(&mut self, outcome: &NarrationOutcome) {
        match outcome {
            NarrationOutcome::Completed => self.narrated += 1,
            NarrationOutcome::Skipped => self.skipped += 1,
            NarrationOutcome::Failed(_) => self.failed += 1,
            NarrationOutcome::Cancelled => self.cancelled += 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Activity {
    state: PipelineState,
    /// Epoch the running action was started under.
    epoch: u64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives a debate session through the service and the speech queue.
pub struct DebatePipeline {
    client: Arc<dyn TurnClient>,
    queue: Arc<SpeechQueue>,
    /// Shared with the queue.
    epoch: Epoch,
    announcements: AnnouncementsConfig,
    state: Mutex<DebateState>,
    activity: Mutex<Activity>,
    last_error: Mutex<Option<String>>,
    /// Question text kept for resubmission after a failed turn.
    draft_question: Mutex<Option<String>>,
    /// Sessions whose transcript has already been narrated locally.
    viewed: Mutex<HashSet<SessionId>>,
    callback: Option<PipelineCallback>,
}

impl DebatePipeline {
    pub fn new(
        client: Arc<dyn TurnClient>,
        queue: Arc<SpeechQueue>,
        announcements: AnnouncementsConfig,
    ) -> Self {
        let epoch = queue.epoch().clone();
        let activity = Activity {
            state: PipelineState::Idle,
            epoch: epoch.current(),
        };
        Self {
            client,
            queue,
            epoch,
            announcements,
            state: Mutex::new(DebateState::new()),
            activity: Mutex::new(activity),
            last_error: Mutex::new(None),
            draft_question: Mutex::new(None),
            viewed: Mutex::new(HashSet::new()),
            callback: None,
        }
    }

    /// Set a callback for pipeline events.
    pub fn with_callback(mut self, callback: PipelineCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Start a new debate on `topic` and narrate the opening statements.
    ///
    /// Any session already loaded is reset first. Refused while another
    /// action is running.
    pub async fn start(&self, topic: &str) -> Result<TurnReport, DebateError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(DebateError::InvalidInput("Please enter a debate topic.".to_string()));
        }
        let discard = self.session_id().is_some();
        self.run(
            TurnAction::Start {
                topic: topic.to_string(),
            },
            None,
            discard,
        )
        .await
    }

    /// Put a question to both sides and narrate their responses and rebuttals.
    ///
    /// On failure the question is kept and available from [`Self::draft_question`].
    pub async fn submit_question(&self, question: &str) -> Result<TurnReport, DebateError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(DebateError::InvalidInput("Question cannot be empty.".to_string()));
        }
        let id = self.require_session()?;
        if self.is_ended() {
            return Err(DebateError::InvalidInput(
                "The debate has ended; no more questions can be asked.".to_string(),
            ));
        }
        let report = self
            .run(
                TurnAction::Question {
                    question: question.to_string(),
                },
                Some(id),
                false,
            )
            .await?;
        *lock(&self.draft_question) = None;
        Ok(report)
    }

    /// Ask both sides for closing arguments.
    pub async fn request_closing(&self) -> Result<TurnReport, DebateError> {
        let id = self.require_session()?;
        if self.is_ended() {
            return Err(DebateError::InvalidInput(
                "Closing arguments have already been given.".to_string(),
            ));
        }
        self.run(TurnAction::Closing, Some(id), false).await
    }

    /// Ask the judge for a verdict.
    pub async fn request_judgment(&self) -> Result<TurnReport, DebateError> {
        let id = self.require_session()?;
        if self.is_judged() {
            return Err(DebateError::InvalidInput("The debate has already been judged.".to_string()));
        }
        self.run(TurnAction::Judgment, Some(id), false).await
    }

    /// Load an existing session from the service.
    ///
    /// The transcript is narrated only the first time a session is viewed;
    /// later loads just refresh it. Opening the session that is already
    /// loaded is a reconciliation.
    pub async fn open_session(&self, id: SessionId) -> Result<TurnReport, DebateError> {
        let discard = match self.session_id() {
            Some(current) if current == id => return self.reconcile().await,
            Some(_) => true,
            None => false,
        };

        let first_view = !lock(&self.viewed).contains(&id);
        let action = if first_view {
            TurnAction::Replay
        } else {
            TurnAction::Refresh
        };
        self.run(action, Some(id), discard).await
    }

    /// Replace local state with the service's record without narrating.
    pub async fn reconcile(&self) -> Result<TurnReport, DebateError> {
        let id = self.require_session()?;
        self.run(TurnAction::Refresh, Some(id), false).await
    }

    /// List the user's debates.
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, DebateError> {
        self.client.list_sessions().await
    }

    /// Stop the statement being spoken; the rest of the turn continues.
    pub fn stop_narration(&self) {
        self.queue.stop_current();
    }

    /// Drop the session, all pending narration, and any in-flight action.
    pub fn reset(&self) {
        let epoch = self.discard_session();
        *lock(&self.activity) = Activity {
            state: PipelineState::Idle,
            epoch,
        };
        self.emit_event(PipelineEvent::StateChanged {
            state: PipelineState::Idle,
        });
        self.emit_event(PipelineEvent::PhaseChanged {
            phase: Phase::NotStarted,
        });
    }

    /// Clear the session and advance the epoch. Returns the new epoch.
    fn discard_session(&self) -> u64 {
        let epoch = {
            // Held across the epoch change so no older action can write in between.
            let mut state = lock(&self.state);
            let epoch = self.queue.cancel_all();
            state.reset();
            epoch
        };
        *lock(&self.last_error) = None;
        *lock(&self.draft_question) = None;
        info!(epoch, "Debate session reset");
        epoch
    }

    pub fn activity(&self) -> PipelineState {
        lock(&self.activity).state
    }

    pub fn is_idle(&self) -> bool {
        self.activity() == PipelineState::Idle
    }

    pub fn phase(&self) -> Phase {
        lock(&self.state).current_phase()
    }

    pub fn needs_question(&self) -> bool {
        lock(&self.state).needs_question()
    }

    pub fn is_ended(&self) -> bool {
        lock(&self.state).is_ended()
    }

    pub fn is_judged(&self) -> bool {
        lock(&self.state).is_judged()
    }

    pub fn session(&self) -> Option<Session> {
        lock(&self.state).session().cloned()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        lock(&self.state).session_id().cloned()
    }

    pub fn transcript(&self) -> Vec<Statement> {
        lock(&self.state).transcript().to_vec()
    }

    /// Message of the last failed action, cleared when the next one starts.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    /// Question from a failed turn, kept for resubmission.
    pub fn draft_question(&self) -> Option<String> {
        lock(&self.draft_question).clone()
    }

    fn require_session(&self) -> Result<SessionId, DebateError> {
        self.session_id().ok_or(DebateError::NoSession)
    }

    /// Run `action` to completion. With `discard`, the loaded session is
    /// dropped once the pipeline has been claimed.
    async fn run(
        &self,
        action: TurnAction,
        target: Option<SessionId>,
        discard: bool,
    ) -> Result<TurnReport, DebateError> {
        let epoch = self.acquire(&action, discard)?;
        if let TurnAction::Question { question } = &action {
            *lock(&self.draft_question) = Some(question.clone());
        }
        let result = self.execute(&action, target, epoch).await;
        if let Err(e) = &result {
            self.fail(&action, epoch, e);
        }
        self.release(epoch);
        result
    }

    /// Mark the pipeline busy, or refuse if another action is running.
    fn acquire(&self, action: &TurnAction, discard: bool) -> Result<u64, DebateError> {
        let epoch = {
            let mut activity = lock(&self.activity);
            if activity.state != PipelineState::Idle {
                debug!(action = action.name(), "Rejecting action while busy");
                return Err(DebateError::Busy);
            }
            let epoch = if discard {
                self.discard_session()
            } else {
                self.epoch.current()
            };
            *activity = Activity {
                state: PipelineState::Dispatching,
                epoch,
            };
            epoch
        };

        if discard {
            self.emit_event(PipelineEvent::PhaseChanged {
                phase: Phase::NotStarted,
            });
        }
        *lock(&self.last_error) = None;
        lock(&self.state).suppress_question();
        info!(action = action.name(), epoch, "Dispatching debate action");
        self.emit_event(PipelineEvent::StateChanged {
            state: PipelineState::Dispatching,
        });
        Ok(epoch)
    }

    fn release(&self, epoch: u64) {
        let released = {
            let mut activity = lock(&self.activity);
            if activity.epoch == epoch && activity.state != PipelineState::Idle {
                activity.state = PipelineState::Idle;
                true
            } else {
                false
            }
        };
        if released {
            self.emit_event(PipelineEvent::StateChanged {
                state: PipelineState::Idle,
            });
        }
    }

    fn fail(&self, action: &TurnAction, epoch: u64, error: &DebateError) {
        if error.is_stale() || !self.epoch.is_current(epoch) {
            debug!(action = action.name(), "Discarding result of abandoned action");
            return;
        }
        warn!(action = action.name(), error = %error, "Debate action failed");
        *lock(&self.last_error) = Some(error.to_string());
        lock(&self.state).restore_question();
        self.emit_event(PipelineEvent::Error {
            message: error.to_string(),
        });
    }

    async fn execute(
        &self,
        action: &TurnAction,
        target: Option<SessionId>,
        epoch: u64,
    ) -> Result<TurnReport, DebateError> {
        let snapshot = self.dispatch(action, target.as_ref(), epoch).await?;
        if !self.epoch.is_current(epoch) {
            return Err(self.stale(epoch));
        }

        let id = match (&target, &snapshot.session_id) {
            (Some(target), Some(reported)) if target != reported => {
                return Err(DebateError::Remote {
                    category: StatusCategory::Decode,
                    message: format!("Response for session {} while {} is active", reported, target),
                });
            }
            (Some(target), _) => target.clone(),
            (None, Some(reported)) => reported.clone(),
            (None, None) => {
                return Err(DebateError::Remote {
                    category: StatusCategory::Decode,
                    message: "Response did not include a debate id".to_string(),
                });
            }
        };

        let (revealed, lines) = self.apply(action, &id, &snapshot, epoch)?;
        info!(
            action = action.name(),
            session = %id,
            revealed = revealed.len(),
            lines = lines.len(),
            "Applied debate snapshot"
        );
        for statement in &revealed {
            self.emit_event(PipelineEvent::StatementRevealed {
                statement: statement.clone(),
            });
        }
        if let Some(phase) = action.narrating_phase() {
            self.emit_event(PipelineEvent::PhaseChanged { phase });
        }

        let mut report = TurnReport::new(Some(id.clone()), revealed.len());
        self.narrate(&lines, epoch, &mut report).await;

        let phase = {
            let mut state = lock(&self.state);
            if !self.epoch.is_current(epoch) {
                // Reset while narrating; the session this turn belonged to is gone.
                report.phase = Phase::NotStarted;
                return Ok(report);
            }
            if let Some(phase) = action.completed_phase() {
                state.advance_phase(phase);
            }
            state.restore_question();
            state.current_phase()
        };
        lock(&self.viewed).insert(id);
        report.phase = phase;
        self.emit_event(PipelineEvent::PhaseChanged { phase });
        info!(
            action = action.name(),
            phase = ?phase,
            narrated = report.narrated,
            failed = report.failed,
            "Debate action complete"
        );
        Ok(report)
    }

    /// Call the service for `action`. Resolves early with a stale error if
    /// the session is reset while waiting.
    async fn dispatch(
        &self,
        action: &TurnAction,
        target: Option<&SessionId>,
        epoch: u64,
    ) -> Result<SessionSnapshot, DebateError> {
        let client = &self.client;
        match (action, target) {
            (TurnAction::Start { topic }, _) => self.guarded(epoch, client.start_session(topic)).await,
            (_, None) => Err(DebateError::NoSession),
            (TurnAction::Question { question }, Some(id)) => {
                self.guarded(epoch, client.submit_question(id, question)).await
            }
            (TurnAction::Closing, Some(id)) => self.guarded(epoch, client.request_closing(id)).await,
            (TurnAction::Judgment, Some(id)) => self.guarded(epoch, client.request_judgment(id)).await,
            (TurnAction::Replay | TurnAction::Refresh, Some(id)) => {
                self.guarded(epoch, client.fetch_session(id)).await
            }
        }
    }

    async fn guarded<T>(
        &self,
        epoch: u64,
        call: impl Future<Output = Result<T, DebateError>>,
    ) -> Result<T, DebateError> {
        tokio::select! {
            result = call => result,
            _ = self.epoch.superseded(epoch) => Err(self.stale(epoch)),
        }
    }

    fn stale(&self, epoch: u64) -> DebateError {
        DebateError::StaleResponse {
            expected: self.epoch.current(),
            actual: epoch,
        }
    }

    /// Merge the snapshot into the state and work out what to say.
    fn apply(
        &self,
        action: &TurnAction,
        id: &SessionId,
        snapshot: &SessionSnapshot,
        epoch: u64,
    ) -> Result<(Vec<Statement>, Vec<Statement>), DebateError> {
        let mut state = lock(&self.state);
        if !self.epoch.is_current(epoch) {
            return Err(self.stale(epoch));
        }
        let revealed = match action {
            TurnAction::Start { .. } => {
                state.begin(id.clone());
                state.apply_snapshot(id, snapshot)
            }
            TurnAction::Replay | TurnAction::Refresh => {
                state.replace(id.clone(), snapshot);
                state.suppress_question();
                state.transcript().to_vec()
            }
            _ => state.apply_snapshot(id, snapshot),
        };
        if let Some(phase) = action.narrating_phase() {
            state.advance_phase(phase);
        }

        let winner = state.session().and_then(|s| s.winner.clone());
        let lines = narration_lines(action, &revealed, winner.as_deref(), &self.announcements);
        Ok((revealed, lines))
    }

    /// Speak `lines` one after another. Stops early if the session is reset.
    async fn narrate(&self, lines: &[Statement], epoch: u64, report: &mut TurnReport) {
        if lines.is_empty() {
            return;
        }
        {
            let mut activity = lock(&self.activity);
            if activity.epoch != epoch {
                return;
            }
            activity.state = PipelineState::Narrating;
        }
        self.emit_event(PipelineEvent::StateChanged {
            state: PipelineState::Narrating,
        });

        for (i, line) in lines.iter().enumerate() {
            if !self.epoch.is_current(epoch) {
                report.cancelled += lines.len() - i;
                break;
            }
            self.emit_event(PipelineEvent::NarrationStarted {
                speaker: line.speaker.clone(),
                text: line.text.clone(),
            });
            let outcome = self.queue.narrate_in(epoch, line).await;
            if let NarrationOutcome::Failed(reason) = &outcome {
                warn!(speaker = %line.speaker, reason = %reason, "Narration failed; continuing");
            }
            report.record(&outcome);
            self.emit_event(PipelineEvent::NarrationFinished {
                speaker: line.speaker.clone(),
                outcome,
            });
        }
    }

    /// Emit an event if a callback is registered.
    fn emit_event(&self, event: PipelineEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}

impl Drop for DebatePipeline {
    fn drop(&mut self) {
        self.queue.cancel_all();
    }
}
