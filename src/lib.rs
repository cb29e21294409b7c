//! Kotoba Gateway - voice-turn coordination and chat/TTS proxying
//!
//! This library provides two halves of a voice chat loop:
//! - Turn coordination: a state machine sequencing
//!   "listen → detect silence → send → speak → resume listening",
//!   with platform speech recognition and synthesis behind traits
//! - An HTTP proxy relaying chat text to the Gemini API and synthesis
//!   requests to the VOICEVOX API
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │            App (recognizer / TTS / camera)          │
//! └────────────────────┬────────────────────────────────┘
//!                      │ events            ┌───────────┐
//! ┌────────────────────▼──────────────┐    │  Proxy    │
//! │        Turn coordinator           │───▶│  /chat    │
//! │  debounce │ send guard │ barge-in │    │  /tts     │
//! └───────────────────────────────────┘    └─────┬─────┘
//!                                                │
//!                                   Gemini / VOICEVOX APIs
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod turn;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result};
pub use llm::GeminiClient;
pub use turn::{
    ChatBackend, Effect, SpeechRecognizer, SpeechSynthesizer, TtsOutcome, TurnCoordinator,
    TurnDriver, TurnEvent, TurnHandle, TurnTiming,
};
pub use voice::VoicevoxClient;
