//! Synthesis proxy endpoints

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::{ApiError, ApiState};
use crate::voice::SynthesisRequest;

/// Synthesis request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TtsRequest {
    #[serde(default)]
    pub text: Option<String>,
    pub speaker: Option<u32>,
    pub pitch: Option<f32>,
    pub intonation_scale: Option<f32>,
    pub speed: Option<f32>,
    pub api_key: Option<String>,
}

/// Synthesize text, streaming back raw audio with the upstream
/// content type
pub async fn synthesize(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<TtsRequest>,
) -> Result<Response, ApiError> {
    let text = request.text.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(ApiError::BadRequest("text is required"));
    }

    // Key comes from the request or the environment
    let api_key = request
        .api_key
        .filter(|key| !key.is_empty())
        .or_else(|| state.voicevox_key.clone())
        .ok_or(ApiError::BadRequest(
            "apiKey is required (set VOICEVOX_API_KEY env or include in request)",
        ))?;

    let synthesis = SynthesisRequest {
        text,
        speaker: request.speaker.unwrap_or(state.synthesis.speaker),
        pitch: request.pitch.unwrap_or(state.synthesis.pitch),
        intonation_scale: request
            .intonation_scale
            .unwrap_or(state.synthesis.intonation_scale),
        speed: request.speed.unwrap_or(state.synthesis.speed),
    };

    let audio = state.voicevox.synthesize(&api_key, &synthesis).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, audio.content_type),
            (
                header::CONTENT_DISPOSITION,
                "inline; filename=\"voice.wav\"".to_string(),
            ),
        ],
        audio.bytes,
    )
        .into_response())
}

/// Speaker list query
#[derive(Debug, Deserialize)]
pub struct SpeakersQuery {
    pub key: Option<String>,
}

/// Proxy the upstream speaker list
pub async fn speakers(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<SpeakersQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let key = query.key.or_else(|| state.voicevox_key.clone());
    let speakers = state.voicevox.speakers(key.as_deref()).await?;
    Ok(Json(speakers))
}
