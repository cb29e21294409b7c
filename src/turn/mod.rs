//! Voice-turn coordination
//!
//! Sequences "listen → detect silence → send → speak → resume listening"
//! for one chat session. The coordinator is a pure state machine over
//! `(state, event) -> effects`; the driver performs the effects against
//! trait-backed collaborators on a single tokio task.

mod coordinator;
mod driver;

pub use coordinator::{
    Effect, RecognizerFault, TtsOutcome, TurnCoordinator, TurnEvent, TurnTiming,
    classify_recognizer_error,
};
pub use driver::{ChatBackend, SpeechRecognizer, SpeechSynthesizer, TurnDriver, TurnHandle};
