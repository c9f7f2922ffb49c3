pub mod gemini;

use async_trait::async_trait;

pub use gemini::GeminiClient;

/// One upstream call: which model, with or without a bound system
/// instruction, and the prompt text to send as the user turn.
#[derive(Debug, Clone, Copy)]
pub struct GenerationCall<'a> {
    pub api_key: &'a str,
    pub model: &'a str,
    pub system_instruction: Option<&'a str>,
    pub prompt: &'a str,
}

/// Failure reported by the text-generation service or the transport to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct UpstreamError {
    /// HTTP status of the upstream response, if one arrived.
    pub http_status: Option<u16>,
    /// `error.code` from the upstream error body, kept verbatim.
    pub error_code: Option<String>,
    pub message: String,
}

impl UpstreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, call: GenerationCall<'_>) -> Result<String, UpstreamError>;
}
