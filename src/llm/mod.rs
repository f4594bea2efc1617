//! Remote chat-completion collaborator
//!
//! The orchestrator only sees the `ChatModel` trait: an ordered list of
//! role/content turns plus generation parameters in, one reply out.

use crate::error::ChatError;
use crate::models::{ChatTurn, GenerationParams};
use crate::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub mod openai;
pub use openai::OpenAiCompatibleClient;

/// One completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatTurn>,
    pub params: GenerationParams,
}

/// Trait for the remote model. Implementations must not retry.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Model identifier reported in configuration views
    fn model_name(&self) -> &str;
}

/// Scripted model for development & testing.
/// Replays queued replies (or echoes the last user turn) after an optional delay.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String>>>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.push(Ok(reply.into()));
        self
    }

    pub fn with_failure(self, error: ChatError) -> Self {
        self.push(Err(error));
        self
    }

    fn push(&self, reply: Result<String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Highest number of concurrent `complete` calls observed
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Every request received, in call order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scripted = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match scripted {
            Some(reply) => reply,
            None => {
                let last_user = request
                    .messages
                    .iter()
                    .rev()
                    .find(|t| t.role == crate::models::Role::User)
                    .map(|t| t.content.as_str())
                    .unwrap_or_default();
                Ok(format!("echo: {}", last_user))
            }
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use tokio_test::{assert_err, assert_ok};

    fn request(text: &str) -> CompletionRequest {
        CompletionRequest {
            messages: vec![ChatTurn {
                role: Role::User,
                content: text.to_string(),
            }],
            params: GenerationParams {
                temperature: 0.7,
                max_tokens: 64,
                stop: None,
            },
        }
    }

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let model = ScriptedModel::new()
            .with_reply("first")
            .with_failure(ChatError::Upstream("down".into()));

        assert_eq!(assert_ok!(model.complete(request("a")).await), "first");
        assert_err!(model.complete(request("b")).await);
        assert_eq!(assert_ok!(model.complete(request("c")).await), "echo: c");
        assert_eq!(model.requests().len(), 3);
    }
}
