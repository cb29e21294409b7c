//! VOICEVOX synthesis API client

use crate::{Error, Result};

/// Fallback content type when upstream omits one
const DEFAULT_AUDIO_CONTENT_TYPE: &str = "audio/wav";

/// Parameters for one synthesis call
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: String,
    pub speaker: u32,
    pub pitch: f32,
    pub intonation_scale: f32,
    pub speed: f32,
}

/// Raw synthesized audio plus the upstream content type
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Map a VOICEVOX error body to a user-facing message
///
/// Upstream reports failures as substrings in the body rather than
/// structured errors.
#[must_use]
pub fn classify_upstream_error(body: &str) -> &'static str {
    if body.contains("invalidApiKey") {
        "Invalid API key"
    } else if body.contains("notEnoughPoints") {
        "Not enough points"
    } else if body.contains("failed") {
        "Audio synthesis failed"
    } else {
        "Failed to generate audio"
    }
}

/// Client for the VOICEVOX synthesis API
pub struct VoicevoxClient {
    client: reqwest::Client,
    base_url: String,
}

impl VoicevoxClient {
    /// Create a new VOICEVOX client
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Synthesize text to audio
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`] mirroring the upstream status, with
    /// the body classified into a fixed message
    pub async fn synthesize(&self, api_key: &str, request: &SynthesisRequest) -> Result<SynthesizedAudio> {
        tracing::debug!(
            chars = request.text.len(),
            speaker = request.speaker,
            "starting synthesis"
        );

        let url = format!(
            "{}/audio/?key={}&text={}&speaker={}&pitch={}&intonationScale={}&speed={}",
            self.base_url,
            urlencoding::encode(api_key),
            urlencoding::encode(&request.text),
            request.speaker,
            request.pitch,
            request.intonation_scale,
            request.speed,
        );

        let response = self.client.get(&url).send().await.map_err(|e| {
            tracing::error!(error = %e, "VOICEVOX request failed");
            e
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = classify_upstream_error(&body);
            tracing::error!(status = %status, body = %body, "VOICEVOX API error");
            return Err(Error::upstream(status.as_u16(), message));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_AUDIO_CONTENT_TYPE)
            .to_string();

        let bytes = response.bytes().await?.to_vec();
        tracing::info!(bytes = bytes.len(), content_type = %content_type, "synthesis complete");

        Ok(SynthesizedAudio {
            content_type,
            bytes,
        })
    }

    /// Fetch the available speaker list
    ///
    /// The key is optional; upstream serves a public subset without one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`] mirroring the upstream status
    pub async fn speakers(&self, api_key: Option<&str>) -> Result<serde_json::Value> {
        let url = api_key.map_or_else(
            || format!("{}/speakers/", self.base_url),
            |key| format!("{}/speakers/?key={}", self.base_url, urlencoding::encode(key)),
        );

        let response = self.client.get(&url).send().await.map_err(|e| {
            tracing::error!(error = %e, "VOICEVOX speakers request failed");
            e
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = %status, "VOICEVOX speakers error");
            return Err(Error::upstream(status.as_u16(), "Failed to fetch speakers"));
        }

        let speakers = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse speakers response");
            e
        })?;
        Ok(speakers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_classification() {
        assert_eq!(
            classify_upstream_error("{\"error\":\"invalidApiKey\"}"),
            "Invalid API key"
        );
        assert_eq!(
            classify_upstream_error("notEnoughPoints: 0 remaining"),
            "Not enough points"
        );
        assert_eq!(classify_upstream_error("synthesis failed"), "Audio synthesis failed");
        assert_eq!(classify_upstream_error("service unavailable"), "Failed to generate audio");
    }

    #[test]
    fn test_invalid_key_wins_over_status_text() {
        // Classification depends only on the body, not the status line
        assert_eq!(
            classify_upstream_error("500 Internal Server Error: invalidApiKey"),
            "Invalid API key"
        );
    }
}
