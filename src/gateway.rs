use crate::cache::{self, FortuneCache};
use crate::error::{ApiResult, AppError};
use crate::model::{FortuneBody, FortuneRequest, FortuneResponse};
use crate::prompt;
use crate::router::FallbackRouter;
use axum::{
    body::Bytes,
    extract::{Json, State},
    response::IntoResponse,
    routing::{get, post},
    Router as AxumRouter,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, Instrument};

/// Where the upstream API key comes from.
#[derive(Debug, Clone)]
pub enum ApiKeySource {
    /// Read the named environment variable on every request.
    Env(String),
    Fixed(Option<String>),
}

impl ApiKeySource {
    pub fn resolve(&self) -> Option<String> {
        let key = match self {
            ApiKeySource::Env(var) => std::env::var(var).ok(),
            ApiKeySource::Fixed(key) => key.clone(),
        };
        key.filter(|k| !k.is_empty())
    }

    fn name(&self) -> &str {
        match self {
            ApiKeySource::Env(var) => var,
            ApiKeySource::Fixed(_) => "GEMINI_API_KEY",
        }
    }
}

pub struct AppState {
    pub router: Arc<FallbackRouter>,
    pub cache: Arc<FortuneCache>,
    pub api_key: ApiKeySource,
    pub persona: String,
    pub retry_after_secs: u64,
}

pub fn app(state: Arc<AppState>) -> AxumRouter {
    AxumRouter::new()
        .route("/api/saju", post(handle_fortune))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn handle_fortune(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<FortuneResponse>> {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = info_span!("fortune", request_id = %request_id);

    tell_fortune(&state, &request_id, &body)
        .instrument(span)
        .await
        .map(Json)
        .map_err(|e| e.with_request_id(request_id))
}

async fn tell_fortune(
    state: &AppState,
    request_id: &str,
    body: &[u8],
) -> Result<FortuneResponse, AppError> {
    let start = Instant::now();

    // Checked before the body is even parsed.
    let api_key = state
        .api_key
        .resolve()
        .ok_or_else(|| AppError::Configuration(state.api_key.name().to_string()))?;

    let body: FortuneBody =
        serde_json::from_slice(body).map_err(|e| AppError::Unknown(e.to_string()))?;
    let req = FortuneRequest::from_body(body)?;

    let key = req.cache_key();
    if let Some(text) = state.cache.get(&key) {
        info!(key = %cache::fingerprint(&key), "cache hit");
        return Ok(FortuneResponse {
            result: text,
            request_id: request_id.to_string(),
            cached: Some(true),
        });
    }

    let user_prompt = prompt::user_prompt(&req);
    let text = state
        .router
        .generate(&api_key, &state.persona, &user_prompt)
        .await
        .map_err(|e| AppError::from_generation(e, state.retry_after_secs))?;

    state.cache.insert(key.clone(), text.clone());
    info!(
        key = %cache::fingerprint(&key),
        elapsed = ?start.elapsed(),
        "fortune generated"
    );

    Ok(FortuneResponse {
        result: text,
        request_id: request_id.to_string(),
        cached: None,
    })
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "cacheEntries": state.cache.len(),
    }))
}
