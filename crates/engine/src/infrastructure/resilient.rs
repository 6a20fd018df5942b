//! Retry wrapper for LLM ports.
//!
//! Transient failures (rate limits, outages, mangled responses) are retried
//! with exponentially growing, jittered delays. Errors the caller must react
//! to surface immediately: auth and invalid requests cannot succeed on
//! retry, and `ContextTooLong` has to reach the generator so its one-shot
//! context shrink can fire.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::infrastructure::ports::{LlmError, LlmPort, LlmRequest, LlmResponse, ToolDefinition};

/// Retry tuning.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the initial attempt (0 = single attempt).
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Ceiling on the exponential growth, in milliseconds.
    pub max_delay_ms: u64,
    /// Relative jitter (0.0-1.0) spread around each delay.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            jitter_factor: 0.2,
        }
    }
}

/// Wraps any `LlmPort` with the retry policy above.
pub struct ResilientLlmClient {
    inner: Arc<dyn LlmPort>,
    config: RetryConfig,
}

impl ResilientLlmClient {
    pub fn new(inner: Arc<dyn LlmPort>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Delay before retry number `retry` (0-based): base * 2^retry, capped,
    /// then spread by the jitter factor.
    fn delay_before(&self, retry: u32) -> Duration {
        let exponential = self
            .config
            .base_delay_ms
            .saturating_mul(1u64 << retry.min(16));
        let capped = exponential.min(self.config.max_delay_ms) as f64;

        let spread = if self.config.jitter_factor > 0.0 {
            let unit: f64 = rand::thread_rng().gen_range(-1.0..=1.0);
            1.0 + self.config.jitter_factor * unit
        } else {
            1.0
        };
        Duration::from_millis((capped * spread).max(0.0) as u64)
    }

    async fn with_retries<F, Fut>(
        &self,
        operation: &str,
        call: F,
    ) -> Result<LlmResponse, LlmError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<LlmResponse, LlmError>>,
    {
        let mut retry = 0u32;
        loop {
            let error = match call().await {
                Ok(response) => {
                    if retry > 0 {
                        tracing::info!(operation, retry, "LLM request recovered");
                    }
                    return Ok(response);
                }
                Err(error) => error,
            };

            if !error.is_retryable() {
                tracing::error!(operation, error = %error, "LLM request failed, not retryable");
                return Err(error);
            }
            if retry >= self.config.max_retries {
                tracing::error!(
                    operation,
                    attempts = retry + 1,
                    error = %error,
                    "LLM request failed, retries exhausted"
                );
                return Err(error);
            }

            let delay = self.delay_before(retry);
            tracing::warn!(
                operation,
                retry = retry + 1,
                max_retries = self.config.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "LLM request failed, backing off"
            );
            tokio::time::sleep(delay).await;
            retry += 1;
        }
    }
}

#[async_trait]
impl LlmPort for ResilientLlmClient {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let inner = Arc::clone(&self.inner);
        self.with_retries("generate", || {
            let inner = Arc::clone(&inner);
            let request = request.clone();
            async move { inner.generate(request).await }
        })
        .await
    }

    async fn generate_with_tools(
        &self,
        request: LlmRequest,
        tools: Vec<ToolDefinition>,
    ) -> Result<LlmResponse, LlmError> {
        let inner = Arc::clone(&self.inner);
        self.with_retries("generate_with_tools", || {
            let inner = Arc::clone(&inner);
            let request = request.clone();
            let tools = tools.clone();
            async move { inner.generate_with_tools(request, tools).await }
        })
        .await
    }
}
