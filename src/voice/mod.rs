//! Speech synthesis proxying
//!
//! Synthesis itself is owned by the upstream VOICEVOX service; this
//! module only shapes requests and classifies upstream failures.

mod voicevox;

pub use voicevox::{
    SynthesisRequest, SynthesizedAudio, VoicevoxClient, classify_upstream_error,
};
