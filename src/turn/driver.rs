//! Async driver for the voice-turn coordinator
//!
//! Runs the state machine on a single tokio task: events arrive on one
//! mpsc channel and are handled in arrival order, so the coordinator's
//! guard flags need no locks. Effects are performed here against the
//! trait-backed collaborators; platform speech recognition and synthesis
//! live behind those traits, not in this crate.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{Error, Result};

use super::{Effect, TtsOutcome, TurnCoordinator, TurnEvent, TurnTiming};

/// Event channel capacity; callbacks are small and drained quickly
const EVENT_CAPACITY: usize = 64;

/// Continuous speech recognition session control
#[async_trait]
pub trait SpeechRecognizer: Send + Sync + 'static {
    /// Start a recognizer session
    async fn start(&self) -> Result<()>;

    /// Stop the running recognizer session
    async fn stop(&self) -> Result<()>;
}

/// Remote chat backend taking one utterance and returning one reply
#[async_trait]
pub trait ChatBackend: Send + Sync + 'static {
    /// Send an utterance and await the reply text
    async fn send(&self, utterance: &str) -> Result<String>;
}

/// Speech synthesis playback control
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync + 'static {
    /// Play text, resolving when playback ends
    async fn speak(&self, text: &str) -> Result<TtsOutcome>;

    /// Cancel in-flight playback, causing `speak` to resolve `Stopped`
    async fn stop(&self) -> Result<()>;
}

/// Handle for feeding session control and recognizer callbacks into a
/// running [`TurnDriver`]
///
/// The driver loop exits once every handle is dropped and all in-flight
/// effect tasks have resolved.
#[derive(Debug, Clone)]
pub struct TurnHandle {
    tx: mpsc::Sender<TurnEvent>,
}

impl TurnHandle {
    /// Start the chat session
    ///
    /// # Errors
    ///
    /// Returns error if the driver has shut down
    pub async fn start_session(&self) -> Result<()> {
        self.send(TurnEvent::StartSession).await
    }

    /// Stop the chat session
    ///
    /// # Errors
    ///
    /// Returns error if the driver has shut down
    pub async fn stop_session(&self) -> Result<()> {
        self.send(TurnEvent::StopSession).await
    }

    /// Deliver a partial transcript from the platform recognizer
    ///
    /// # Errors
    ///
    /// Returns error if the driver has shut down
    pub async fn partial_transcript(&self, text: impl Into<String>) -> Result<()> {
        self.send(TurnEvent::PartialTranscript(text.into())).await
    }

    /// Deliver a recognizer error from the platform recognizer
    ///
    /// # Errors
    ///
    /// Returns error if the driver has shut down
    pub async fn recognizer_error(&self, message: impl Into<String>) -> Result<()> {
        self.send(TurnEvent::RecognizerError(message.into())).await
    }

    async fn send(&self, event: TurnEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| Error::Channel("turn driver stopped".to_string()))
    }
}

/// Drives one [`TurnCoordinator`] against a recognizer, chat backend,
/// and synthesizer
pub struct TurnDriver<R, B, S> {
    coordinator: TurnCoordinator,
    recognizer: Arc<R>,
    backend: Arc<B>,
    synthesizer: Arc<S>,
    // Weak so the loop ends when the last external handle drops
    tx: mpsc::WeakSender<TurnEvent>,
    rx: mpsc::Receiver<TurnEvent>,
    silence_timer: Option<JoinHandle<()>>,
}

impl<R, B, S> TurnDriver<R, B, S>
where
    R: SpeechRecognizer,
    B: ChatBackend,
    S: SpeechSynthesizer,
{
    /// Create a driver and its handle for a new session
    pub fn new(
        timing: TurnTiming,
        recognizer: Arc<R>,
        backend: Arc<B>,
        synthesizer: Arc<S>,
    ) -> (Self, TurnHandle) {
        let (tx, rx) = mpsc::channel(EVENT_CAPACITY);
        let driver = Self {
            coordinator: TurnCoordinator::new(timing),
            recognizer,
            backend,
            synthesizer,
            tx: tx.downgrade(),
            rx,
            silence_timer: None,
        };
        (driver, TurnHandle { tx })
    }

    /// Inspect coordinator state (primarily for tests and diagnostics)
    #[must_use]
    pub const fn coordinator(&self) -> &TurnCoordinator {
        &self.coordinator
    }

    /// Run until every [`TurnHandle`] is dropped
    pub async fn run(mut self) {
        let session = self.coordinator.session_id();
        tracing::debug!(%session, "turn driver running");

        while let Some(event) = self.rx.recv().await {
            let effects = self.coordinator.handle(event);
            for effect in effects {
                self.perform(effect).await;
            }
        }

        if let Some(timer) = self.silence_timer.take() {
            timer.abort();
        }
        tracing::debug!(%session, "turn driver stopped");
    }

    async fn perform(&mut self, effect: Effect) {
        match effect {
            Effect::StartRecognizer => match self.recognizer.start().await {
                Ok(()) => self.inject(TurnEvent::RecognizerStarted),
                Err(e) => self.inject(TurnEvent::RecognizerError(e.to_string())),
            },
            Effect::StopRecognizer => {
                if let Err(e) = self.recognizer.stop().await {
                    tracing::warn!(error = %e, "recognizer stop failed");
                }
            }
            Effect::ArmSilenceTimer(window) => {
                if let Some(timer) = self.silence_timer.take() {
                    timer.abort();
                }
                let Some(tx) = self.tx.upgrade() else { return };
                self.silence_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(window).await;
                    let _ = tx.send(TurnEvent::SilenceElapsed).await;
                }));
            }
            Effect::CancelSilenceTimer => {
                if let Some(timer) = self.silence_timer.take() {
                    timer.abort();
                }
            }
            Effect::Send(utterance) => {
                // Never aborted: a stopped session discards the result
                // instead of cancelling the request
                let Some(tx) = self.tx.upgrade() else { return };
                let backend = Arc::clone(&self.backend);
                tokio::spawn(async move {
                    let event = match backend.send(&utterance).await {
                        Ok(reply) => TurnEvent::ReplyReceived(reply),
                        Err(e) => TurnEvent::SendFailed(e.to_string()),
                    };
                    let _ = tx.send(event).await;
                });
            }
            Effect::Speak(text) => {
                let Some(tx) = self.tx.upgrade() else { return };
                let synthesizer = Arc::clone(&self.synthesizer);
                tokio::spawn(async move {
                    let outcome = match synthesizer.speak(&text).await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            tracing::warn!(error = %e, "playback failed");
                            TtsOutcome::Error
                        }
                    };
                    let _ = tx.send(TurnEvent::TtsFinished(outcome)).await;
                });
            }
            Effect::StopSpeaking => {
                if let Err(e) = self.synthesizer.stop().await {
                    tracing::warn!(error = %e, "playback stop failed");
                }
            }
            Effect::ScheduleResume(delay) => {
                let Some(tx) = self.tx.upgrade() else { return };
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(TurnEvent::ResumeElapsed).await;
                });
            }
            Effect::ScheduleRetry(delay) => {
                let Some(tx) = self.tx.upgrade() else { return };
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(TurnEvent::RetryElapsed).await;
                });
            }
        }
    }

    fn inject(&self, event: TurnEvent) {
        // The loop owns the receiver, so only try_send is safe here;
        // capacity is ample for callback bursts
        if let Some(tx) = self.tx.upgrade() {
            if let Err(e) = tx.try_send(event) {
                tracing::warn!(error = %e, "dropped internal event");
            }
        }
    }
}
