//! Bounded-retry fetch of one well-formed structured document from the LLM

use crate::clients::{ChatMessage, LlmClient, ModelParams};
use crate::error::{Result, WeaverError};
use crate::outline::{StructuredDocument, parse_structured};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// A decoded document together with the exact text it was decoded from
#[derive(Debug, Clone)]
pub struct Structured<T> {
    pub document: T,
    pub raw_payload: String,
}

#[derive(Clone)]
pub struct StructuredFetcher {
    client: Arc<dyn LlmClient>,
    policy: RetryPolicy,
}

impl StructuredFetcher {
    pub fn new(client: Arc<dyn LlmClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Each attempt is a full round-trip; transport and parse failures are retried alike.
    pub async fn fetch_structured<T: StructuredDocument>(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        params: &ModelParams,
    ) -> Result<Structured<T>> {
        let messages = [ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)];
        let mut last_error: Option<WeaverError> = None;

        for attempt in 1..=self.policy.max_attempts {
            debug!(
                "Requesting <{}> document (attempt {}/{})",
                T::ROOT_TAG,
                attempt,
                self.policy.max_attempts
            );

            let outcome = match self.client.complete(&messages, params).await {
                Ok(text) => {
                    debug!("Raw <{}> response:\n{}", T::ROOT_TAG, text);
                    parse_structured::<T>(&text)
                }
                Err(e) => Err(WeaverError::from(e)),
            };

            match outcome {
                Ok((document, raw_payload)) => {
                    return Ok(Structured {
                        document,
                        raw_payload,
                    });
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        "Structured fetch attempt {}/{} failed: {}",
                        attempt, self.policy.max_attempts, e
                    );
                    last_error = Some(e);
                    if attempt < self.policy.max_attempts && !self.policy.delay.is_zero() {
                        tokio::time::sleep(self.policy.delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        let attempts = self.policy.max_attempts;
        let last_error = last_error.unwrap_or_else(|| WeaverError::Internal {
            message: "no fetch attempt was made".to_string(),
        });
        error!("Giving up after {} attempts: {}", attempts, last_error);
        Err(WeaverError::GenerationExhausted {
            attempts,
            last_error: Box::new(last_error),
        })
    }
}
