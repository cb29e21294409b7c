//! Configuration management for the Kotoba gateway

use std::time::Duration;

use crate::turn::TurnTiming;

/// Default HTTP port for the proxy server
const DEFAULT_PORT: u16 = 8787;

/// Default Gemini model for chat completions
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Default VOICEVOX API base URL
const DEFAULT_VOICEVOX_URL: &str = "https://deprecatedapis.tts.quest/v2/voicevox";

/// Kotoba gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the HTTP proxy server
    pub port: u16,

    /// API keys
    pub api_keys: ApiKeys,

    /// Gemini model identifier for chat completions
    pub gemini_model: String,

    /// VOICEVOX API base URL
    pub voicevox_url: String,

    /// Default synthesis parameters applied when a request omits them
    pub synthesis: SynthesisDefaults,

    /// Voice-turn timing
    pub turn: TurnTiming,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// Gemini API key (for the `/chat` and `/gemini` endpoints)
    pub gemini: Option<String>,

    /// VOICEVOX API key (for the `/tts` and `/speakers` endpoints)
    pub voicevox: Option<String>,
}

/// Default VOICEVOX synthesis parameters
#[derive(Debug, Clone, Copy)]
pub struct SynthesisDefaults {
    /// Speaker ID
    pub speaker: u32,

    /// Pitch offset
    pub pitch: f32,

    /// Intonation scale
    pub intonation_scale: f32,

    /// Speed multiplier
    pub speed: f32,
}

impl Default for SynthesisDefaults {
    fn default() -> Self {
        Self {
            speaker: 0,
            pitch: 0.0,
            intonation_scale: 1.0,
            speed: 1.0,
        }
    }
}

impl Config {
    /// Load configuration from the environment
    ///
    /// Missing API keys are not a load error; endpoints that need them
    /// degrade with a configuration error at request time.
    ///
    /// # Errors
    ///
    /// Returns error if a numeric env var is present but unparseable
    pub fn load() -> crate::Result<Self> {
        let port = env_parsed("KOTOBA_PORT")?
            .or(env_parsed("PORT")?)
            .unwrap_or(DEFAULT_PORT);

        let api_keys = ApiKeys {
            gemini: std::env::var("GEMINI_API_KEY").ok(),
            voicevox: std::env::var("VOICEVOX_API_KEY").ok(),
        };

        let gemini_model = std::env::var("KOTOBA_GEMINI_MODEL")
            .unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string());

        let voicevox_url = std::env::var("KOTOBA_VOICEVOX_URL")
            .unwrap_or_else(|_| DEFAULT_VOICEVOX_URL.to_string());

        let synthesis = SynthesisDefaults {
            speaker: env_parsed("KOTOBA_SPEAKER")?.unwrap_or(0),
            pitch: env_parsed("KOTOBA_PITCH")?.unwrap_or(0.0),
            intonation_scale: env_parsed("KOTOBA_INTONATION")?.unwrap_or(1.0),
            speed: env_parsed("KOTOBA_SPEED")?.unwrap_or(1.0),
        };

        let defaults = TurnTiming::default();
        let turn = TurnTiming {
            silence_window: env_parsed("KOTOBA_SILENCE_WINDOW_MS")?
                .map_or(defaults.silence_window, Duration::from_millis),
            resume_delay: env_parsed("KOTOBA_RESUME_DELAY_MS")?
                .map_or(defaults.resume_delay, Duration::from_millis),
            retry_delay: env_parsed("KOTOBA_RETRY_DELAY_MS")?
                .map_or(defaults.retry_delay, Duration::from_millis),
        };

        Ok(Self {
            port,
            api_keys,
            gemini_model,
            voicevox_url,
            synthesis,
            turn,
        })
    }
}

/// Parse an optional env var, erroring only when present but invalid
fn env_parsed<T: std::str::FromStr>(name: &str) -> crate::Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| crate::Error::Config(format!("invalid value for {name}: {raw}"))),
        Err(_) => Ok(None),
    }
}
