//! Chat proxy endpoints

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState};
use crate::llm::DIAGNOSTIC_PROMPT;

/// Chat request body
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

/// Chat response body
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub text: String,
}

/// Forward one message to the chat backend
pub async fn chat(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = request.message.as_deref().map(str::trim).unwrap_or("");
    if message.is_empty() {
        return Err(ApiError::BadRequest("message is required"));
    }

    let gemini = state
        .gemini
        .as_ref()
        .ok_or(ApiError::NotConfigured("GEMINI_API_KEY is not set"))?;

    let text = gemini.generate(message).await?;
    Ok(Json(ChatResponse { text }))
}

/// Fire the fixed diagnostic prompt, returning the raw reply text
pub async fn diagnostic(State(state): State<Arc<ApiState>>) -> Result<String, ApiError> {
    let gemini = state
        .gemini
        .as_ref()
        .ok_or(ApiError::NotConfigured("GEMINI_API_KEY is not set"))?;

    Ok(gemini.generate(DIAGNOSTIC_PROMPT).await?)
}
