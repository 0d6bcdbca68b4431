use crate::json_repair::parse_model_json;
use crate::llm_provider::{GenerationConfig, LLMProvider, Message};
use devpulse_core::{PulseError, Result};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// System instruction sent with every analysis prompt.
pub const JSON_ONLY_INSTRUCTION: &str = "You are an expert software engineering analyst. \
Respond ONLY with a single valid JSON object that matches the requested schema. \
Do not include markdown, code fences, commentary or any text outside the JSON object.";

enum CallOutcome<T> {
    Finished(T),
    DeadlineElapsed,
    Cancelled,
}

/// Bounded-time completion client returning parsed JSON objects.
#[derive(Clone)]
pub struct ModelClient {
    provider: Arc<dyn LLMProvider>,
    generation: GenerationConfig,
    timeout: Duration,
}

impl ModelClient {
    pub fn new(provider: Arc<dyn LLMProvider>, timeout: Duration) -> Self {
        Self {
            provider,
            generation: GenerationConfig::default(),
            timeout,
        }
    }

    pub fn with_generation_config(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    /// One bounded call; see [`ModelClient::complete_with_cancel`].
    pub async fn complete(&self, system: &str, prompt: &str) -> Result<Map<String, Value>> {
        self.complete_with_cancel(system, prompt, CancellationToken::new())
            .await
    }

    /// Issue one completion call and parse the reply as a JSON object.
    ///
    /// When the deadline elapses the token is cancelled and the in-flight
    /// request future is dropped, which aborts the HTTP request. Cancelling
    /// the token from outside aborts the call the same way.
    pub async fn complete_with_cancel(
        &self,
        system: &str,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<Map<String, Value>> {
        let messages = [Message::system(system), Message::user(prompt)];
        let started = Instant::now();

        let outcome = {
            let call = self.provider.generate_chat(&messages, &self.generation);
            tokio::select! {
                result = call => CallOutcome::Finished(result),
                _ = tokio::time::sleep(self.timeout) => {
                    cancel.cancel();
                    CallOutcome::DeadlineElapsed
                }
                _ = cancel.cancelled() => CallOutcome::Cancelled,
            }
        };

        let response = match outcome {
            CallOutcome::Finished(result) => result.map_err(PulseError::from)?,
            CallOutcome::DeadlineElapsed => {
                warn!(
                    provider = self.provider.provider_name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Model call exceeded deadline, request aborted"
                );
                return Err(PulseError::ModelTimeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                });
            }
            CallOutcome::Cancelled => return Err(PulseError::Cancelled),
        };

        debug!(
            provider = self.provider.provider_name(),
            model = %response.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            total_tokens = ?response.total_tokens,
            "Model call completed"
        );

        parse_model_json(&response.content).inspect_err(|e| {
            warn!(
                provider = self.provider.provider_name(),
                error = %e,
                "Model output could not be parsed"
            );
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_provider::{LLMError, LLMResponse, LLMResult};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct ScriptedProvider {
        reply: LLMResult<String>,
        delay: Duration,
        finished: Arc<AtomicBool>,
    }

    impl ScriptedProvider {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                delay: Duration::ZERO,
                finished: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn generate_chat(
            &self,
            _messages: &[Message],
            _config: &GenerationConfig,
        ) -> LLMResult<LLMResponse> {
            tokio::time::sleep(self.delay).await;
            self.finished.store(true, Ordering::SeqCst);
            match &self.reply {
                Ok(text) => Ok(LLMResponse {
                    content: text.clone(),
                    total_tokens: None,
                    finish_reason: Some("stop".into()),
                    model: "scripted".into(),
                }),
                Err(LLMError::Http { status, body, .. }) => Err(LLMError::Http {
                    provider: "scripted".into(),
                    status: *status,
                    body: body.clone(),
                }),
                Err(_) => Err(LLMError::EmptyResponse("scripted".into())),
            }
        }

        fn provider_name(&self) -> &str {
            "scripted"
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn fenced_reply_is_parsed() {
        let client = ModelClient::new(
            Arc::new(ScriptedProvider::replying("```json\n{\"security_score\":0.9}\n```")),
            Duration::from_secs(25),
        );
        let parsed = client.complete(JSON_ONLY_INSTRUCTION, "prompt").await.unwrap();
        assert_eq!(Value::Object(parsed), json!({"security_score": 0.9}));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_aborts_the_call() {
        let finished = Arc::new(AtomicBool::new(false));
        let provider = ScriptedProvider {
            reply: Ok("{}".into()),
            delay: Duration::from_secs(60),
            finished: finished.clone(),
        };
        let client = ModelClient::new(Arc::new(provider), Duration::from_secs(25));
        let token = CancellationToken::new();

        let started = tokio::time::Instant::now();
        let err = client
            .complete_with_cancel("sys", "prompt", token.clone())
            .await
            .unwrap_err();

        assert!(matches!(err, PulseError::ModelTimeout { timeout_ms: 25_000 }));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(25) && elapsed < Duration::from_secs(26));
        assert!(token.is_cancelled());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!finished.load(Ordering::SeqCst), "aborted call must not complete");
    }

    #[tokio::test(start_paused = true)]
    async fn external_cancellation_stops_the_call() {
        let provider = ScriptedProvider {
            reply: Ok("{}".into()),
            delay: Duration::from_secs(10),
            finished: Arc::new(AtomicBool::new(false)),
        };
        let client = ModelClient::new(Arc::new(provider), Duration::from_secs(25));
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let err = client
            .complete_with_cancel("sys", "prompt", token)
            .await
            .unwrap_err();
        assert!(matches!(err, PulseError::Cancelled));
    }

    #[tokio::test]
    async fn http_failure_is_distinct_from_timeout() {
        let provider = ScriptedProvider {
            reply: Err(LLMError::Http {
                provider: "scripted".into(),
                status: 500,
                body: "boom".into(),
            }),
            delay: Duration::ZERO,
            finished: Arc::new(AtomicBool::new(false)),
        };
        let client = ModelClient::new(Arc::new(provider), Duration::from_secs(25));
        let err = client.complete("sys", "prompt").await.unwrap_err();
        assert!(matches!(err, PulseError::ModelHttp { status: 500, .. }));
        assert!(!err.is_timeout());
    }

    #[tokio::test]
    async fn unparseable_reply_keeps_raw_text() {
        let client = ModelClient::new(
            Arc::new(ScriptedProvider::replying("Sorry, no JSON today")),
            Duration::from_secs(25),
        );
        match client.complete("sys", "prompt").await {
            Err(PulseError::ResponseParse { raw, .. }) => assert_eq!(raw, "Sorry, no JSON today"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
