//! Local stand-in for the Gemini `generateContent` endpoint.
//!
//! Usage: `mock_gemini [port] [latency_ms] [error_rate] [error_kind]`
//! where `error_kind` is `quota`, `not_found` or `server`. Point the gateway
//! at it with `SAJU__GEMINI__BASE_URL=http://127.0.0.1:<port>`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use rand::Rng;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Clone)]
struct ServerConfig {
    latency_ms: u64,
    error_rate: f64,
    error_kind: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    let port: u16 = args.get(1).map(String::as_str).unwrap_or("3100").parse()?;
    let latency_ms: u64 = args.get(2).map(String::as_str).unwrap_or("300").parse()?;
    let error_rate: f64 = args.get(3).map(String::as_str).unwrap_or("0.0").parse()?;
    let error_kind = args.get(4).cloned().unwrap_or_else(|| "server".to_string());

    let config = ServerConfig {
        latency_ms,
        error_rate,
        error_kind,
    };

    let app = Router::new()
        .route("/v1beta/models/:call", post(handler))
        .with_state(config.clone());

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!(
        %addr,
        latency_ms = config.latency_ms,
        error_rate = config.error_rate,
        error_kind = %config.error_kind,
        "mock gemini listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn handler(
    State(config): State<ServerConfig>,
    Path(call): Path<String>,
    Json(req): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let jitter = rand::thread_rng().gen_range(0..=20);
    sleep(Duration::from_millis(config.latency_ms + jitter)).await;

    let model = call.split(':').next().unwrap_or_default().to_string();

    if config.error_rate > 0.0 && rand::thread_rng().gen_bool(config.error_rate.min(1.0)) {
        let (status, grpc, message) = match config.error_kind.as_str() {
            "quota" => (
                StatusCode::TOO_MANY_REQUESTS,
                "RESOURCE_EXHAUSTED",
                "Resource has been exhausted (e.g. check quota).".to_string(),
            ),
            "not_found" => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("models/{model} is not found for API version v1beta"),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "An internal error has occurred.".to_string(),
            ),
        };
        return (
            status,
            Json(json!({
                "error": { "code": status.as_u16(), "message": message, "status": grpc }
            })),
        );
    }

    let style = if req.get("systemInstruction").is_some() {
        "system instruction"
    } else {
        "inline prompt"
    };

    (
        StatusCode::OK,
        Json(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "text": format!("[{model} / {style}] 그대의 사주에는 물과 불이 함께 흐르니, 올해는 서두르지 말고 때를 기다려라.") }]
                },
                "finishReason": "STOP"
            }]
        })),
    )
}
