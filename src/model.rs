use serde::{Deserialize, Serialize};
use std::fmt;

/// Incoming body of `POST /api/saju`. Every field is optional on the wire;
/// a missing field behaves like an empty string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FortuneBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>, // YYYY-MM-DD, or a localized variant
    #[serde(default)]
    pub birth_time: Option<String>, // HH:MM, or a localized variant
}

/// A request that passed normalization and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FortuneRequest {
    pub name: String,
    pub birth_date: String,
    pub birth_time: String,
}

impl FortuneRequest {
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.name.to_lowercase(),
            self.birth_date,
            self.birth_time
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FortuneResponse {
    pub result: String,
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
}

/// Prompt-construction strategy used for one upstream attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Persona bound as the model's system instruction.
    SystemInstruction,
    /// Persona concatenated in front of the user prompt.
    InlinePrompt,
}

impl Phase {
    pub const ORDER: [Phase; 2] = [Phase::SystemInstruction, Phase::InlinePrompt];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::SystemInstruction => "systemInstruction",
            Phase::InlinePrompt => "inlinePrompt",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed, non-fatal upstream attempt. Only kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAttempt {
    pub model: String,
    pub phase: Phase,
    pub message: String,
}
