use super::{GenerationCall, TextGenerator, UpstreamError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<serde_json::Value>,
    message: Option<String>,
    status: Option<String>,
}

/// REST client for the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    /// `timeout` of `None` leaves upstream calls unbounded.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Self {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            client: builder.build().unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, call: GenerationCall<'_>) -> Result<String, UpstreamError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: call.prompt }],
            }],
            system_instruction: call.system_instruction.map(|text| Content {
                role: None,
                parts: vec![Part { text }],
            }),
        };

        let resp = self
            .client
            .post(self.endpoint(call.model))
            .header("x-goog-api-key", call.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(status_error(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown"),
                &bytes,
            ));
        }

        let parsed: GenerateContentResponse = serde_json::from_slice(&bytes).map_err(|e| {
            UpstreamError::new(format!("unreadable upstream response: {e}"))
                .with_status(status.as_u16())
        })?;
        extract_text(parsed)
    }
}

fn extract_text(resp: GenerateContentResponse) -> Result<String, UpstreamError> {
    let Some(candidate) = resp.candidates.into_iter().next() else {
        let reason = resp
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(UpstreamError::new(format!(
            "Text not available. Response was blocked due to {reason}"
        )));
    };

    Ok(candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<String>())
        .unwrap_or_default())
}

fn status_error(status: u16, reason: &str, body: &[u8]) -> UpstreamError {
    let mut err = UpstreamError::new(format!("[{status} {reason}]")).with_status(status);

    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { error }) => {
            if let Some(message) = error.message {
                err.message = format!("{} {}", err.message, message);
            }
            if let Some(grpc) = error.status {
                // RESOURCE_EXHAUSTED -> "resource exhausted"
                err.message = format!(
                    "{} ({})",
                    err.message,
                    grpc.to_lowercase().replace('_', " ")
                );
            }
            err.error_code = error.code.map(|c| match c {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            });
        }
        Err(_) => {
            let text = String::from_utf8_lossy(body);
            let text = text.trim();
            if !text.is_empty() {
                err.message = format!("{} {}", err.message, text);
            }
        }
    }
    err
}

// The URL is dropped: ":generateContent" would read as a rate-limit marker.
fn transport_error(e: reqwest::Error) -> UpstreamError {
    let e = e.without_url();
    if e.is_timeout() {
        UpstreamError::new(format!("fetch failed (timeout): {e}"))
    } else {
        UpstreamError::new(format!("fetch failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: "hello" }],
            }],
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part { text: "persona" }],
            }),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "contents": [{"role": "user", "parts": [{"text": "hello"}]}],
                "systemInstruction": {"parts": [{"text": "persona"}]}
            })
        );
    }

    #[test]
    fn test_status_error_from_google_body() {
        let body = br#"{"error":{"code":429,"message":"Resource has been exhausted (e.g. check quota).","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = status_error(429, "Too Many Requests", body);
        assert_eq!(err.http_status, Some(429));
        assert_eq!(err.error_code.as_deref(), Some("429"));
        assert_eq!(
            err.message,
            "[429 Too Many Requests] Resource has been exhausted (e.g. check quota). (resource exhausted)"
        );
    }

    #[test]
    fn test_status_error_from_plain_body() {
        let err = status_error(502, "Bad Gateway", b"upstream down");
        assert_eq!(err.message, "[502 Bad Gateway] upstream down");
        assert_eq!(err.error_code, None);
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let resp: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "첫째 "}, {"text": "둘째"}]}}]
        }))
        .unwrap();
        assert_eq!(extract_text(resp).unwrap(), "첫째 둘째");
    }

    #[test]
    fn test_extract_text_blocked() {
        let resp: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        let err = extract_text(resp).unwrap_err();
        assert!(err.message.contains("SAFETY"));
    }
}
