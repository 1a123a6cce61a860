//! Language-Model Gateway: bounded, error-class-gated retry around a model.
//!
//! Only [`ModelError::Transient`] (HTTP 5xx) is retried. Each transient
//! failure is followed by a backoff sleep of `backoff_ms * 2^n`, so the
//! default policy waits 2s, 4s and 8s across its three attempts before
//! giving up with [`GatewayError::Unavailable`].

use crate::retry::{compute_delay, should_retry, Sleeper, TokioSleeper};
use async_trait::async_trait;
use sg_core::retry::RetryPolicy;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model server error (HTTP {status}): {message}")]
    Transient { status: u16, message: String },
    #[error("model request failed: {0}")]
    Permanent(String),
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no response from the language model after {attempts} attempts")]
    Unavailable { attempts: u32 },
    #[error("language model rejected the request: {0}")]
    Rejected(String),
}

/// A generative text model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}

pub struct ModelGateway {
    model: Arc<dyn LanguageModel>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl ModelGateway {
    pub fn new(model: Arc<dyn LanguageModel>, policy: RetryPolicy) -> Self {
        Self {
            model,
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        let mut attempt = 0u32;
        loop {
            match self.model.generate(prompt).await {
                Ok(text) => {
                    tracing::debug!(attempt, chars = text.len(), "model responded");
                    return Ok(text);
                }
                Err(ModelError::Permanent(message)) => {
                    tracing::error!(error = %message, "model request failed");
                    return Err(GatewayError::Rejected(message));
                }
                Err(e @ ModelError::Transient { .. }) => {
                    let delay = compute_delay(&self.policy, attempt);
                    tracing::warn!(attempt, ?delay, error = %e, "transient model error, backing off");
                    self.sleeper.sleep(delay).await;
                    if !should_retry(&self.policy, attempt) {
                        let attempts = attempt + 1;
                        tracing::error!(attempts, "exceeded maximum retries for model request");
                        return Err(GatewayError::Unavailable { attempts });
                    }
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays queued replies; once drained, repeats the last one.
    pub struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, ModelError>>>,
        last: Mutex<Option<Result<String, ModelError>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    fn clone_reply(reply: &Result<String, ModelError>) -> Result<String, ModelError> {
        match reply {
            Ok(text) => Ok(text.clone()),
            Err(ModelError::Transient { status, message }) => Err(ModelError::Transient {
                status: *status,
                message: message.clone(),
            }),
            Err(ModelError::Permanent(m)) => Err(ModelError::Permanent(m.clone())),
        }
    }

    impl ScriptedModel {
        pub fn new(replies: Vec<Result<String, ModelError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                last: Mutex::new(None),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let next = self.replies.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            if let Some(reply) = next {
                *last = Some(clone_reply(&reply));
                return reply;
            }
            last.as_ref()
                .map(clone_reply)
                .unwrap_or_else(|| Err(ModelError::Permanent("no scripted reply".into())))
        }
    }

    #[derive(Default)]
    pub struct RecordingSleeper {
        pub delays: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, delay: Duration) {
            self.delays.lock().unwrap().push(delay);
        }
    }

    pub fn server_error() -> Result<String, ModelError> {
        Err(ModelError::Transient {
            status: 500,
            message: "internal error".into(),
        })
    }
}
