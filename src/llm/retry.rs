use crate::memory::AgentMemory;
use crate::tools::ToolRegistry;
use crate::types::LlmResponse;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Wraps any `AsyncLlmCaller` and retries transient failures
/// with exponential back-off.
pub struct RetryingLlmCaller {
    inner:       Arc<dyn super::AsyncLlmCaller>,
    max_retries: u32,
    base_delay:  Duration,
}

impl RetryingLlmCaller {
    pub fn new(inner: Arc<dyn super::AsyncLlmCaller>, max_retries: u32) -> Self {
        Self { inner, max_retries, base_delay: Duration::from_secs(1) }
    }

    /// Override the first back-off delay (doubled on every attempt, capped at 60s).
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    fn is_auth_error(err: &str) -> bool {
        let lower = err.to_lowercase();
        lower.contains("401")
            || lower.contains("403")
            || lower.contains("authentication")
            || lower.contains("unauthorized")
            || lower.contains("forbidden")
            || lower.contains("invalid api key")
    }

    fn is_rate_limit_error(err: &str) -> bool {
        let lower = err.to_lowercase();
        lower.contains("429")
            || lower.contains("rate limit")
            || lower.contains("too many requests")
    }

    fn delay_for(&self, attempt: u32, rate_limited: bool) -> Duration {
        let base = if rate_limited { self.base_delay * 5 } else { self.base_delay };
        let cap = Duration::from_secs(60);
        base.checked_mul(2u32.saturating_pow(attempt)).map_or(cap, |d| d.min(cap))
    }
}

#[async_trait]
impl super::AsyncLlmCaller for RetryingLlmCaller {
    async fn call_async(
        &self,
        memory: &AgentMemory,
        tools:  &ToolRegistry,
        model:  &str,
    ) -> Result<LlmResponse, String> {
        let mut last_err = String::new();
        let mut rate_limited = false;

        for attempt in 0..=self.max_retries {
            match self.inner.call_async(memory, tools, model).await {
                Ok(resp) => return Ok(resp),
                Err(e) if Self::is_auth_error(&e) => {
                    tracing::error!(error = %e, "LLM auth error, not retrying");
                    return Err(e);
                }
                Err(e) => {
                    let limited = Self::is_rate_limit_error(&e);
                    rate_limited |= limited;
                    last_err = e;

                    if attempt < self.max_retries {
                        let wait = self.delay_for(attempt, limited);
                        tracing::warn!(
                            attempt = attempt + 1,
                            max     = self.max_retries,
                            wait_ms = wait.as_millis() as u64,
                            error   = %last_err,
                            "LLM transient error, retrying"
                        );
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        let prefix = if rate_limited { "LLM RATE LIMIT EXCEEDED" } else { "LLM failed" };
        Err(format!("{} after {} retries, last error: {}", prefix, self.max_retries, last_err))
    }
}
