use crate::classify;
use crate::model::{ModelAttempt, Phase};
use crate::prompt;
use crate::provider::{GenerationCall, TextGenerator, UpstreamError};
use std::sync::Arc;
use tracing::{debug, warn};

/// Candidate models, most commonly available first.
pub const DEFAULT_MODELS: &[&str] = &[
    "gemini-1.5-flash",
    "gemini-1.5-flash-latest",
    "gemini-1.5-pro",
    "gemini-1.5-pro-latest",
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
];

/// How many attempts the exhaustion error lists.
const MAX_REPORTED_ATTEMPTS: usize = 6;

/// Result of a single model × phase attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(String),
    Retryable(ModelAttempt),
    /// Rate-limit/quota failure; nothing else may be tried.
    Fatal(UpstreamError),
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("{0}")]
    RateLimited(UpstreamError),

    #[error("All Gemini model attempts failed. last={last} attempts={}", attempt_summary(.attempts))]
    Exhausted {
        last: String,
        attempts: Vec<ModelAttempt>,
    },
}

fn attempt_summary(attempts: &[ModelAttempt]) -> String {
    attempts
        .iter()
        .take(MAX_REPORTED_ATTEMPTS)
        .map(|a| format!("{}:{}", a.model, a.phase))
        .collect::<Vec<_>>()
        .join(",")
}

/// Walks the candidate models once per phase, strictly in order, and stops
/// at the first text or at the first rate-limit failure.
pub struct FallbackRouter {
    generator: Arc<dyn TextGenerator>,
    models: Vec<String>,
}

impl FallbackRouter {
    pub fn new(generator: Arc<dyn TextGenerator>, models: Vec<String>) -> Self {
        Self { generator, models }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub async fn attempt(
        &self,
        api_key: &str,
        model: &str,
        phase: Phase,
        persona: &str,
        user_prompt: &str,
    ) -> AttemptOutcome {
        let (system_instruction, prompt) = prompt::for_phase(persona, user_prompt, phase);
        let call = GenerationCall {
            api_key,
            model,
            system_instruction,
            prompt: &prompt,
        };

        match self.generator.generate(call).await {
            Ok(text) if !text.is_empty() => AttemptOutcome::Success(text),
            Ok(_) => AttemptOutcome::Retryable(ModelAttempt {
                model: model.to_string(),
                phase,
                message: "empty response".to_string(),
            }),
            Err(e) if classify::is_rate_limit_error(&e) => AttemptOutcome::Fatal(e),
            Err(e) => AttemptOutcome::Retryable(ModelAttempt {
                model: model.to_string(),
                phase,
                message: e.message,
            }),
        }
    }

    pub async fn generate(
        &self,
        api_key: &str,
        persona: &str,
        user_prompt: &str,
    ) -> Result<String, GenerationError> {
        let mut failures: Vec<ModelAttempt> = Vec::new();

        for phase in Phase::ORDER {
            for model in &self.models {
                match self.attempt(api_key, model, phase, persona, user_prompt).await {
                    AttemptOutcome::Success(text) => {
                        debug!(model = %model, phase = %phase, "generation succeeded");
                        return Ok(text);
                    }
                    AttemptOutcome::Fatal(e) => {
                        warn!(model = %model, phase = %phase, error = %e, "rate limited, aborting fallback");
                        return Err(GenerationError::RateLimited(e));
                    }
                    AttemptOutcome::Retryable(failure) => {
                        warn!(model = %model, phase = %phase, error = %failure.message, "generateContent failed");
                        failures.push(failure);
                    }
                }
            }
        }

        let last = failures
            .last()
            .map(|f| f.message.clone())
            .unwrap_or_else(|| "Unknown error".to_string());
        Err(GenerationError::Exhausted {
            last,
            attempts: failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Replies per model name; records every call as (model, had system instruction).
    #[derive(Default)]
    struct Scripted {
        replies: HashMap<(String, bool), Result<String, UpstreamError>>,
        calls: Mutex<Vec<(String, bool)>>,
    }

    impl Scripted {
        fn reply(mut self, model: &str, system: bool, r: Result<&str, UpstreamError>) -> Self {
            self.replies
                .insert((model.to_string(), system), r.map(str::to_string));
            self
        }

        fn calls(&self) -> Vec<(String, bool)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(&self, call: GenerationCall<'_>) -> Result<String, UpstreamError> {
            let key = (call.model.to_string(), call.system_instruction.is_some());
            self.calls.lock().unwrap().push(key.clone());
            self.replies
                .get(&key)
                .cloned()
                .unwrap_or_else(|| Err(UpstreamError::new("model not found")))
        }
    }

    fn router(gen: Arc<Scripted>, models: &[&str]) -> FallbackRouter {
        FallbackRouter::new(gen, models.iter().map(|m| m.to_string()).collect())
    }

    #[tokio::test]
    async fn test_first_success_stops_iteration() {
        let gen = Arc::new(Scripted::default().reply("b", true, Ok("운세")));
        let r = router(gen.clone(), &["a", "b", "c"]);

        let text = r.generate("key", "persona", "prompt").await.unwrap();
        assert_eq!(text, "운세");
        assert_eq!(
            gen.calls(),
            vec![("a".to_string(), true), ("b".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn test_inline_phase_after_system_phase_exhausted() {
        let gen = Arc::new(Scripted::default().reply("b", false, Ok("inline")));
        let r = router(gen.clone(), &["a", "b"]);

        assert_eq!(r.generate("key", "p", "u").await.unwrap(), "inline");
        assert_eq!(
            gen.calls(),
            vec![
                ("a".to_string(), true),
                ("b".to_string(), true),
                ("a".to_string(), false),
                ("b".to_string(), false),
            ]
        );
    }

    #[tokio::test]
    async fn test_quota_aborts_everything() {
        let gen = Arc::new(
            Scripted::default()
                .reply("a", true, Err(UpstreamError::new("boom")))
                .reply("b", true, Err(UpstreamError::new("Quota exceeded for project"))),
        );
        let r = router(gen.clone(), &["a", "b", "c"]);

        let err = r.generate("key", "p", "u").await.unwrap_err();
        assert!(matches!(err, GenerationError::RateLimited(_)));
        assert_eq!(err.to_string(), "Quota exceeded for project");
        assert_eq!(gen.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_status_429_aborts() {
        let gen = Arc::new(Scripted::default().reply(
            "a",
            true,
            Err(UpstreamError::new("slow down").with_status(429)),
        ));
        let r = router(gen.clone(), &["a", "b"]);

        let err = r.generate("key", "p", "u").await.unwrap_err();
        assert!(matches!(err, GenerationError::RateLimited(_)));
        assert_eq!(gen.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_and_capped_attempts() {
        let gen = Arc::new(Scripted::default());
        let r = router(gen.clone(), &["m1", "m2", "m3", "m4"]);

        let err = r.generate("key", "p", "u").await.unwrap_err();
        assert_eq!(gen.calls().len(), 8);
        match &err {
            GenerationError::Exhausted { last, attempts } => {
                assert_eq!(last, "model not found");
                assert_eq!(attempts.len(), 8);
                assert_eq!(attempts[7].phase, Phase::InlinePrompt);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "All Gemini model attempts failed. last=model not found attempts=\
             m1:systemInstruction,m2:systemInstruction,m3:systemInstruction,m4:systemInstruction,\
             m1:inlinePrompt,m2:inlinePrompt"
        );
    }

    #[tokio::test]
    async fn test_empty_text_is_retryable() {
        let gen = Arc::new(
            Scripted::default()
                .reply("a", true, Ok(""))
                .reply("b", true, Ok("text")),
        );
        let r = router(gen.clone(), &["a", "b"]);
        assert_eq!(r.generate("key", "p", "u").await.unwrap(), "text");
    }

    #[tokio::test]
    async fn test_no_models_is_unknown_error() {
        let r = router(Arc::new(Scripted::default()), &[]);
        let err = r.generate("key", "p", "u").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "All Gemini model attempts failed. last=Unknown error attempts="
        );
    }
}
