//! Speech queue.
//!
//! Serializes narration so that at most one utterance is ever active. Jobs
//! are served in arrival order. Each job records the session epoch it was
//! submitted under and is dropped without speaking if that epoch has been
//! superseded by the time it reaches the front.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{Mutex, Notify, RwLock, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SpeechConfig;
use crate::epoch::Epoch;
use crate::speech::engine::SpeechEngine;
use crate::speech::text::clean_for_speech;
use crate::statement::Statement;
use crate::voice::{Voice, VoicePolicy};

/// How a narration job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrationOutcome {
    /// The engine finished speaking.
    Completed,
    /// Nothing to say; the engine was not invoked.
    Skipped,
    /// The engine reported a playback error.
    Failed(String),
    /// Stopped while speaking, or dropped before it started.
    Cancelled,
}

impl NarrationOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, NarrationOutcome::Cancelled)
    }
}

/// Holds the speaking flag for one utterance, clearing it even if the job is dropped.
struct SpeakingGuard<'a>(&'a AtomicBool);

impl<'a> SpeakingGuard<'a> {
    fn new(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for SpeakingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// FIFO narration queue in front of a single speech engine.
pub struct SpeechQueue {
    engine: Arc<dyn SpeechEngine>,
    policy: Box<dyn VoicePolicy>,
    epoch: Epoch,
    /// Held for the whole lifetime of a job; tokio's mutex is fair, so
    /// waiters are served in arrival order.
    turn: Mutex<()>,
    /// Voice catalogue cache, owned per queue.
    voices: RwLock<Vec<Voice>>,
    interrupt: Notify,
    speaking: AtomicBool,
    jobs: AtomicU64,
    settle_delay: Duration,
    voice_retry_delay: Duration,
}

impl SpeechQueue {
    pub fn new(
        engine: Arc<dyn SpeechEngine>,
        policy: Box<dyn VoicePolicy>,
        epoch: Epoch,
        config: &SpeechConfig,
    ) -> Self {
        Self {
            engine,
            policy,
            epoch,
            turn: Mutex::new(()),
            voices: RwLock::new(Vec::new()),
            interrupt: Notify::new(),
            speaking: AtomicBool::new(false),
            jobs: AtomicU64::new(0),
            settle_delay: config.settle_delay(),
            voice_retry_delay: config.voice_retry_delay(),
        }
    }

    pub fn epoch(&self) -> &Epoch {
        &self.epoch
    }

    /// Whether a job is currently in the speaking state.
    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    /// Narrate a transcript statement with its speaker's voice.
    pub async fn narrate(&self, statement: &Statement) -> NarrationOutcome {
        self.enqueue_and_await(&statement.text, &statement.speaker)
            .await
    }

    /// Narrate a statement on behalf of work started under `epoch`.
    pub async fn narrate_in(&self, epoch: u64, statement: &Statement) -> NarrationOutcome {
        self.enqueue_and_await_in(epoch, &statement.text, &statement.speaker)
            .await
    }

    /// Queue `text` behind any earlier jobs and wait until it has been spoken.
    ///
    /// `voice_hint` is the speaker label used to pick a voice.
    pub async fn enqueue_and_await(&self, text: &str, voice_hint: &str) -> NarrationOutcome {
        self.enqueue_and_await_in(self.epoch.current(), text, voice_hint)
            .await
    }

    /// Like [`Self::enqueue_and_await`], but the job belongs to `epoch` and is
    /// dropped without speaking if that epoch is no longer current.
    pub async fn enqueue_and_await_in(
        &self,
        epoch: u64,
        text: &str,
        voice_hint: &str,
    ) -> NarrationOutcome {
        if !self.epoch.is_current(epoch) {
            debug!(epoch, "Dropping narration for discarded session");
            return NarrationOutcome::Cancelled;
        }
        let text = clean_for_speech(text);
        if text.is_empty() {
            return NarrationOutcome::Skipped;
        }

        let job = self.jobs.fetch_add(1, Ordering::SeqCst);
        let _turn = tokio::select! {
            guard = self.turn.lock() => guard,
            _ = self.epoch.superseded(epoch) => {
                debug!(job, epoch, "Dropping queued narration for discarded session");
                return NarrationOutcome::Cancelled;
            }
        };

        let voice = self.resolve_voice(voice_hint).await;

        if self.engine.is_speaking() {
            warn!(
                engine = self.engine.name(),
                job, "Engine busy before job start; stopping stray utterance"
            );
            self.engine.stop();
            tokio::time::sleep(self.settle_delay).await;
        }

        if !self.epoch.is_current(epoch) {
            debug!(job, epoch, "Dropping narration for discarded session");
            return NarrationOutcome::Cancelled;
        }

        debug!(
            job,
            speaker = voice_hint,
            voice = voice.as_ref().map(|v| v.name.as_str()).unwrap_or("default"),
            "Narration started"
        );
        let _speaking = SpeakingGuard::new(&self.speaking);
        let outcome = tokio::select! {
            result = self.engine.speak(&text, voice.as_ref()) => match result {
                Ok(()) => NarrationOutcome::Completed,
                Err(e) => NarrationOutcome::Failed(e.to_string()),
            },
            _ = self.epoch.superseded(epoch) => {
                self.engine.stop();
                NarrationOutcome::Cancelled
            }
            _ = self.interrupt.notified() => {
                self.engine.stop();
                NarrationOutcome::Cancelled
            }
        };
        debug!(job, ?outcome, "Narration finished");

        outcome
    }

    /// Stop the active utterance only. Queued jobs continue.
    pub fn stop_current(&self) {
        if self.is_speaking() {
            info!("Stopping current narration");
        }
        self.interrupt.notify_waiters();
        self.engine.stop();
    }

    /// Stop the active utterance and drop every queued job.
    ///
    /// Advances the shared epoch, so nothing submitted before this call will
    /// start afterwards.
    pub fn cancel_all(&self) -> u64 {
        let epoch = self.epoch.advance();
        self.engine.stop();
        info!(epoch, "Cancelled all narration");
        epoch
    }

    /// Reload the voice catalogue from the engine.
    pub async fn refresh_voices(&self) -> usize {
        let loaded = self.engine.list_voices().await;
        let count = loaded.len();
        *self.voices.write().await = loaded;
        debug!(count, "Voice catalogue refreshed");
        count
    }

    /// Keep the voice cache in sync with engine catalogue notifications.
    pub fn watch_voices(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut changes = self.engine.voices_changed()?;
        let queue: Weak<Self> = Arc::downgrade(self);
        Some(tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        let Some(queue) = queue.upgrade() else { break };
                        queue.refresh_voices().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }

    async fn catalogue(&self) -> Vec<Voice> {
        {
            let cached = self.voices.read().await;
            if !cached.is_empty() {
                return cached.clone();
            }
        }

        let mut loaded = self.engine.list_voices().await;
        if loaded.is_empty() {
            // Engines often populate their catalogue asynchronously.
            tokio::time::sleep(self.voice_retry_delay).await;
            loaded = self.engine.list_voices().await;
        }
        if !loaded.is_empty() {
            *self.voices.write().await = loaded.clone();
        }
        loaded
    }

    async fn resolve_voice(&self, voice_hint: &str) -> Option<Voice> {
        let voices = self.catalogue().await;
        self.policy.select_voice(voice_hint, &voices)
    }
}
