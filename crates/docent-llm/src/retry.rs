//! Budget-checked completion calls with transient-error retry.

use std::time::Duration;

use docent_types::{StatusEvent, StatusSink, emit};

use crate::backend::SharedBackend;
use crate::budget::BudgetSnapshot;
use crate::error::{LlmError, Result};
use crate::types::{AssistantMessage, CompletionRequest};

/// Default context limit (tokens).
pub const DEFAULT_CONTEXT_LIMIT: usize = 128_000;

/// Default number of retries after a transient failure.
pub const DEFAULT_MAX_RETRIES: u32 = 1;

/// Retry and budget policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum request size in estimated tokens.
    pub context_limit: usize,
    /// Retries after the first attempt for transient server errors.
    pub max_retries: u32,
    /// First backoff delay; doubled after every retry.
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            context_limit: DEFAULT_CONTEXT_LIMIT,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// Wraps a [`CompletionBackend`](crate::backend::CompletionBackend) with a
/// context-budget precheck and bounded retries on 5xx responses.
///
/// The precheck runs before any network call, so an oversized request never
/// uses up retries. Only transient status codes are retried; every other
/// error is returned as is.
#[derive(Clone)]
pub struct RetryingCompletionClient {
    backend: SharedBackend,
    policy: RetryPolicy,
}

impl RetryingCompletionClient {
    pub fn new(backend: SharedBackend, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn backend(&self) -> &SharedBackend {
        &self.backend
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Check a request against the context budget.
    pub fn precheck(&self, request: &CompletionRequest) -> Result<BudgetSnapshot> {
        let snapshot = BudgetSnapshot::of_messages(&request.messages, self.policy.context_limit);
        if snapshot.fits() {
            Ok(snapshot)
        } else {
            Err(LlmError::ContextTooLarge {
                tokens: snapshot.tokens,
                limit: snapshot.limit,
            })
        }
    }

    /// Complete a request.
    ///
    /// `status` is told about every scheduled retry before the backoff sleep.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
        status: &dyn StatusSink,
    ) -> Result<AssistantMessage> {
        let snapshot = self.precheck(request)?;

        tracing::debug!(
            backend = self.backend.name(),
            model = %request.model,
            tokens = snapshot.tokens,
            limit = snapshot.limit,
            tools = request.tools.len(),
            "Requesting completion"
        );

        let max_retries = self.policy.max_retries;
        let mut backoff = self.policy.backoff_base;
        let mut attempt: u32 = 0;

        loop {
            let err = match self.backend.complete(request).await {
                Ok(message) => return Ok(message),
                Err(e) => e,
            };

            let Some(code) = err.transient_status() else {
                return Err(err);
            };

            if attempt >= max_retries {
                return Err(LlmError::TransientCompletion {
                    status: code,
                    attempts: attempt + 1,
                    message: err.to_string(),
                });
            }

            attempt += 1;
            tracing::warn!(
                backend = self.backend.name(),
                status = code,
                attempt,
                max_retries,
                backoff_ms = backoff.as_millis() as u64,
                "Completion failed with transient error, retrying"
            );
            emit(
                status,
                StatusEvent::RetryScheduled {
                    attempt,
                    max_retries,
                    status: code,
                    delay_ms: backoff.as_millis() as u64,
                },
            );
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
    }
}

impl std::fmt::Debug for RetryingCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingCompletionClient")
            .field("backend", &self.backend.name())
            .field("policy", &self.policy)
            .finish()
    }
}
