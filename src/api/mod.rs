//! HTTP proxy server
//!
//! Stateless pass-through surface: one request maps to one upstream
//! call, with no session state, rate limiting, caching, or server-side
//! retries.

pub mod chat;
pub mod health;
pub mod tts;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{any, get, post},
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{Config, SynthesisDefaults};
use crate::llm::GeminiClient;
use crate::voice::VoicevoxClient;
use crate::Result;

/// Shared state for API handlers
pub struct ApiState {
    /// Chat client; absent when no Gemini key is configured
    pub gemini: Option<Arc<GeminiClient>>,

    /// Synthesis client (per-request keys allowed)
    pub voicevox: Arc<VoicevoxClient>,

    /// Environment VOICEVOX key, overridable per request
    pub voicevox_key: Option<String>,

    /// Synthesis parameters applied when a request omits them
    pub synthesis: SynthesisDefaults,
}

/// Service banner for the root route
#[derive(Serialize)]
struct IndexResponse {
    message: &'static str,
    endpoints: IndexEndpoints,
}

#[derive(Serialize)]
struct IndexEndpoints {
    chat: &'static str,
    gemini: &'static str,
    tts: &'static str,
    speakers: &'static str,
}

async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        message: "Kotoba gateway",
        endpoints: IndexEndpoints {
            chat: "POST /chat - send a message to the chat backend",
            gemini: "ALL /gemini - fixed diagnostic prompt",
            tts: "POST /tts - synthesize text to audio",
            speakers: "GET /speakers - list available speakers",
        },
    })
}

/// Build the router with all routes
pub fn router(state: Arc<ApiState>) -> Router {
    // CORS layer for cross-origin requests from the app frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/chat", post(chat::chat))
        .route("/gemini", any(chat::diagnostic))
        .route("/tts", post(tts::synthesize))
        .route("/speakers", get(tts::speakers))
        .with_state(state)
        .merge(health::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Build a server from configuration
    ///
    /// A missing Gemini key is not fatal; the chat endpoints degrade
    /// with a configuration error at request time.
    ///
    /// # Errors
    ///
    /// Returns error if client construction fails
    pub fn from_config(config: &Config) -> Result<Self> {
        let gemini = match &config.api_keys.gemini {
            Some(key) => Some(Arc::new(GeminiClient::new(
                key.clone(),
                config.gemini_model.clone(),
            )?)),
            None => {
                tracing::warn!("GEMINI_API_KEY not set - chat endpoints unavailable");
                None
            }
        };

        let state = Arc::new(ApiState {
            gemini,
            voicevox: Arc::new(VoicevoxClient::new(config.voicevox_url.clone())),
            voicevox_key: config.api_keys.voicevox.clone(),
            synthesis: config.synthesis,
        });

        Ok(Self {
            state,
            port: config.port,
        })
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if the server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, router(self.state))
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

/// API errors, rendered as `{error, detail?}` JSON
#[derive(Debug)]
pub enum ApiError {
    /// Invalid or missing request field (400)
    BadRequest(&'static str),
    /// Missing server-side configuration (500)
    NotConfigured(&'static str),
    /// Upstream failure mirrored at the upstream status
    Upstream {
        status: u16,
        message: String,
        detail: Option<String>,
    },
    /// Anything else (500)
    Internal(String),
}

impl From<crate::Error> for ApiError {
    fn from(err: crate::Error) -> Self {
        match err {
            crate::Error::Upstream {
                status,
                message,
                detail,
            } => Self::Upstream {
                status,
                message,
                detail,
            },
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorBody {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            detail: Option<String>,
        }

        let (status, error, detail) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.to_string(), None),
            Self::NotConfigured(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.to_string(), None)
            }
            Self::Upstream {
                status,
                message,
                detail,
            } => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                message,
                detail,
            ),
            Self::Internal(detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                Some(detail),
            ),
        };

        tracing::warn!(status = %status, error = %error, "request failed");
        (status, Json(ErrorBody { error, detail })).into_response()
    }
}
