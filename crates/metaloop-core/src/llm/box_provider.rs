//! Type-erased LLM provider shared by the generator, the quality judge and
//! the learner.
//!
//! `LlmProviderDyn` boxes the RPITIT future so a provider can sit behind a
//! trait object; `BoxLlmProvider` also logs token usage per call.

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use metaloop_types::llm::{CompletionRequest, CompletionResponse, LlmError, StopReason};

use super::provider::LlmProvider;

/// Object-safe version of [`LlmProvider`] with boxed futures.
pub trait LlmProviderDyn: Send + Sync {
    fn name(&self) -> &str;

    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + 'a>>;
}

impl<T: LlmProvider> LlmProviderDyn for T {
    fn name(&self) -> &str {
        LlmProvider::name(self)
    }

    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + 'a>> {
        Box::pin(self.complete(request))
    }
}

/// The generator, the quality validator, and the learner all hold one of
/// these behind an `Arc`, so a run shares a single HTTP client.
pub struct BoxLlmProvider {
    inner: Box<dyn LlmProviderDyn>,
}

impl BoxLlmProvider {
    pub fn new<T: LlmProvider + 'static>(provider: T) -> Self {
        Self {
            inner: Box::new(provider),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Send one request. Truncated replies are returned as-is; structured
    /// callers reject them when the JSON fails to parse.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        let started = Instant::now();
        let result = self.inner.complete_boxed(request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(response) => {
                tracing::debug!(
                    provider = self.name(),
                    model = %request.model,
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    elapsed_ms,
                    "llm call complete"
                );
                if response.stop_reason == StopReason::MaxTokens {
                    tracing::warn!(
                        model = %request.model,
                        max_tokens = request.max_tokens,
                        "llm reply truncated at max_tokens"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(provider = self.name(), model = %request.model, error = %e, elapsed_ms, "llm call failed");
            }
        }
        result
    }
}
