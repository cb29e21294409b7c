//! Voice-turn state machine
//!
//! Arbitrates between continuous speech recognition, a silence-triggered
//! utterance commit, the outbound chat call, and TTS playback, while
//! preventing overlapping sends and the recognizer hearing its own
//! synthesized output.

use std::time::Duration;

use uuid::Uuid;

/// Timing for the voice-turn loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnTiming {
    /// Quiet period after the last partial result before the transcript
    /// is committed as an utterance
    pub silence_window: Duration,

    /// Delay between TTS playback ending and the recognizer resuming,
    /// to let the device audio session tear down
    pub resume_delay: Duration,

    /// Delay before retrying a failed recognizer start
    pub retry_delay: Duration,
}

impl Default for TurnTiming {
    fn default() -> Self {
        Self {
            silence_window: Duration::from_secs(2),
            resume_delay: Duration::from_millis(500),
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// How a TTS playback ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsOutcome {
    /// Playback ran to completion
    Completed,
    /// Playback was cancelled (stop or barge-in)
    Stopped,
    /// Playback failed
    Error,
}

/// Inbound events, delivered to the coordinator in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// User started the chat session
    StartSession,
    /// User stopped the chat session
    StopSession,
    /// Recognizer produced a partial transcript
    PartialTranscript(String),
    /// Silence debounce window elapsed with no new partials
    SilenceElapsed,
    /// Chat backend resolved with a reply
    ReplyReceived(String),
    /// Chat backend call failed (transport or HTTP error)
    SendFailed(String),
    /// TTS playback ended
    TtsFinished(TtsOutcome),
    /// Post-TTS resume delay elapsed
    ResumeElapsed,
    /// Recognizer retry delay elapsed
    RetryElapsed,
    /// Recognizer session reported itself running
    RecognizerStarted,
    /// Recognizer reported an error
    RecognizerError(String),
}

/// Side effects for the driver to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Start a recognizer session
    StartRecognizer,
    /// Stop the running recognizer session
    StopRecognizer,
    /// (Re-)arm the silence timer, cancelling any pending one
    ArmSilenceTimer(Duration),
    /// Cancel the pending silence timer
    CancelSilenceTimer,
    /// Send an utterance to the chat backend
    Send(String),
    /// Play a reply through the synthesizer
    Speak(String),
    /// Cancel in-flight TTS playback
    StopSpeaking,
    /// Schedule a `ResumeElapsed` event
    ScheduleResume(Duration),
    /// Schedule a `RetryElapsed` event
    ScheduleRetry(Duration),
}

/// Classification of a recognizer error message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognizerFault {
    /// No speech was detected; not a real error
    NoSpeech,
    /// A recognizer session is already running; reconcile state instead
    /// of retrying
    AlreadyStarted,
    /// Anything else; retry after a fixed delay
    Other,
}

/// Classify a recognizer error by message content
#[must_use]
pub fn classify_recognizer_error(message: &str) -> RecognizerFault {
    let normalized = message.to_lowercase();
    if normalized.contains("no speech detected") {
        RecognizerFault::NoSpeech
    } else if normalized.contains("already started") {
        RecognizerFault::AlreadyStarted
    } else {
        RecognizerFault::Other
    }
}

/// State machine for one voice chat session
///
/// Every error path is non-fatal and self-healing via a fixed-delay retry
/// or a state resync; only `StopSession` ends the loop.
#[derive(Debug)]
pub struct TurnCoordinator {
    session_id: Uuid,
    timing: TurnTiming,
    active: bool,
    recognizer_running: bool,
    sending: bool,
    tts_playing: bool,
    transcript: String,
}

impl TurnCoordinator {
    /// Create a coordinator for a new session
    #[must_use]
    pub fn new(timing: TurnTiming) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            timing,
            active: false,
            recognizer_running: false,
            sending: false,
            tts_playing: false,
            transcript: String::new(),
        }
    }

    /// Session identifier for log correlation
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Whether the session is active
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Whether a chat call is in flight
    #[must_use]
    pub const fn is_sending(&self) -> bool {
        self.sending
    }

    /// Whether TTS playback is active
    #[must_use]
    pub const fn is_speaking(&self) -> bool {
        self.tts_playing
    }

    /// Whether a recognizer session is running
    #[must_use]
    pub const fn is_listening(&self) -> bool {
        self.recognizer_running
    }

    /// The live (uncommitted) transcript
    #[must_use]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Apply one event and return the effects to perform
    pub fn handle(&mut self, event: TurnEvent) -> Vec<Effect> {
        match event {
            TurnEvent::StartSession => self.on_start_session(),
            TurnEvent::StopSession => self.on_stop_session(),
            TurnEvent::PartialTranscript(text) => self.on_partial(text),
            TurnEvent::SilenceElapsed => self.on_silence_elapsed(),
            TurnEvent::ReplyReceived(text) => self.on_reply(text),
            TurnEvent::SendFailed(reason) => self.on_send_failed(&reason),
            TurnEvent::TtsFinished(outcome) => self.on_tts_finished(outcome),
            TurnEvent::ResumeElapsed => self.on_resume_elapsed(),
            TurnEvent::RetryElapsed => self.on_retry_elapsed(),
            TurnEvent::RecognizerStarted => self.on_recognizer_started(),
            TurnEvent::RecognizerError(message) => self.on_recognizer_error(&message),
        }
    }

    fn on_start_session(&mut self) -> Vec<Effect> {
        self.active = true;
        self.transcript.clear();

        if self.recognizer_running {
            // Benign: a recognizer session already reports itself running
            tracing::debug!(session = %self.session_id, "recognizer already running, skipping start");
            return Vec::new();
        }

        tracing::info!(session = %self.session_id, "session started");
        vec![Effect::StartRecognizer]
    }

    fn on_stop_session(&mut self) -> Vec<Effect> {
        let mut effects = vec![Effect::CancelSilenceTimer];

        if self.tts_playing {
            effects.push(Effect::StopSpeaking);
        }
        if self.recognizer_running {
            effects.push(Effect::StopRecognizer);
        }

        // An in-flight send is not cancelled; its result is discarded on
        // arrival because the session is no longer active.
        self.active = false;
        self.tts_playing = false;
        self.recognizer_running = false;
        self.transcript.clear();

        tracing::info!(session = %self.session_id, "session stopped");
        effects
    }

    fn on_partial(&mut self, text: String) -> Vec<Effect> {
        if !self.active {
            // State resync: the recognizer outlived the session
            self.recognizer_running = false;
            return vec![Effect::StopRecognizer];
        }

        let mut effects = Vec::new();

        if self.tts_playing {
            // Barge-in: user speech cancels playback immediately
            tracing::debug!(session = %self.session_id, "barge-in, stopping playback");
            self.tts_playing = false;
            effects.push(Effect::StopSpeaking);
            if !self.recognizer_running {
                effects.push(Effect::StartRecognizer);
            }
        }

        // A partial result implies a live recognizer session
        self.recognizer_running = true;
        self.transcript = text;

        // Trailing-edge debounce: each partial restarts the window
        effects.push(Effect::ArmSilenceTimer(self.timing.silence_window));
        effects
    }

    fn on_silence_elapsed(&mut self) -> Vec<Effect> {
        if !self.active || self.transcript.trim().is_empty() {
            return Vec::new();
        }

        let utterance = std::mem::take(&mut self.transcript);

        if self.sending {
            // A send is already in flight; the newer utterance is dropped,
            // not queued.
            tracing::warn!(session = %self.session_id, "send in flight, dropping utterance");
            return Vec::new();
        }

        self.sending = true;
        tracing::info!(session = %self.session_id, chars = utterance.len(), "committing utterance");
        vec![Effect::Send(utterance)]
    }

    fn on_reply(&mut self, text: String) -> Vec<Effect> {
        self.sending = false;

        if !self.active {
            tracing::debug!(session = %self.session_id, "session inactive, discarding reply");
            return Vec::new();
        }

        if text.trim().is_empty() {
            // Empty reply counts as a failed turn: resume listening
            tracing::warn!(session = %self.session_id, "empty reply, resuming listening");
            return self.resume_listening();
        }

        let mut effects = Vec::new();
        if self.recognizer_running {
            // Stop listening before playback so the recognizer does not
            // hear the synthesized reply
            self.recognizer_running = false;
            effects.push(Effect::StopRecognizer);
        }

        self.tts_playing = true;
        effects.push(Effect::Speak(text));
        effects
    }

    fn on_send_failed(&mut self, reason: &str) -> Vec<Effect> {
        self.sending = false;
        tracing::warn!(session = %self.session_id, reason, "send failed");

        if !self.active {
            return Vec::new();
        }
        self.resume_listening()
    }

    fn on_tts_finished(&mut self, outcome: TtsOutcome) -> Vec<Effect> {
        self.tts_playing = false;

        if !self.active {
            return Vec::new();
        }

        tracing::debug!(session = %self.session_id, ?outcome, "playback finished");
        vec![Effect::ScheduleResume(self.timing.resume_delay)]
    }

    fn on_resume_elapsed(&mut self) -> Vec<Effect> {
        if !self.active || self.recognizer_running {
            return Vec::new();
        }
        self.transcript.clear();
        vec![Effect::StartRecognizer]
    }

    fn on_retry_elapsed(&mut self) -> Vec<Effect> {
        if !self.active || self.recognizer_running {
            return Vec::new();
        }
        vec![Effect::StartRecognizer]
    }

    fn on_recognizer_started(&mut self) -> Vec<Effect> {
        if !self.active {
            // Started after stopSession: shut it back down
            self.recognizer_running = false;
            return vec![Effect::StopRecognizer];
        }

        self.recognizer_running = true;
        self.transcript.clear();
        Vec::new()
    }

    fn on_recognizer_error(&mut self, message: &str) -> Vec<Effect> {
        match classify_recognizer_error(message) {
            RecognizerFault::NoSpeech => Vec::new(),
            RecognizerFault::AlreadyStarted => {
                // Reconcile rather than retry
                if self.active {
                    self.recognizer_running = true;
                } else {
                    self.recognizer_running = false;
                }
                Vec::new()
            }
            RecognizerFault::Other => {
                tracing::warn!(session = %self.session_id, message, "recognizer error");
                self.recognizer_running = false;
                if self.active {
                    // Fixed delay, no backoff, no retry budget
                    vec![Effect::ScheduleRetry(self.timing.retry_delay)]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn resume_listening(&self) -> Vec<Effect> {
        if self.recognizer_running {
            Vec::new()
        } else {
            vec![Effect::StartRecognizer]
        }
    }
}
