//! Turn orchestrator - runs one user turn end to end
//!
//! RESOLVE → APPEND USER → ASSEMBLE → CALL MODEL → APPEND REPLY → RESULT
//!
//! Turns on the same session are serialized by the session's turn lock,
//! which is held from the user append until the reply is stored. Turns on
//! different sessions run concurrently.

use crate::config::AppConfig;
use crate::error::ChatError;
use crate::llm::{ChatModel, CompletionRequest};
use crate::memory::{ContextManager, Epoch, SessionStore};
use crate::models::{CallOptions, Role, TurnResult};
use crate::prompts::{self, PromptProfile};
use crate::sessions::seed_profile;
use serde_json::{json, Map};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, warn};

pub struct TurnOrchestrator {
    store: Arc<SessionStore>,
    model: Arc<dyn ChatModel>,
    context: ContextManager,
    config: Arc<AppConfig>,
    /// System prompt seeded into sessions allocated on the fly
    provision_profile: Option<&'static PromptProfile>,
}

impl TurnOrchestrator {
    pub fn new(store: Arc<SessionStore>, model: Arc<dyn ChatModel>, config: Arc<AppConfig>) -> Self {
        Self {
            store,
            model,
            context: ContextManager::new(),
            config,
            provision_profile: Some(prompts::resolve(prompts::DEFAULT_PROFILE)),
        }
    }

    /// Change (or disable) the profile used for auto-provisioned sessions
    pub fn with_provision_profile(mut self, profile: Option<&'static PromptProfile>) -> Self {
        self.provision_profile = profile;
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Submit one user turn.
    ///
    /// Never returns an error: failures come back as `success = false` with
    /// the user message already stored and no assistant message added. A
    /// reply that arrives after its session was deleted, overwritten or
    /// cleared is dropped and the turn fails.
    pub async fn submit_turn(
        &self,
        session_id: Option<&str>,
        user_text: &str,
        options: CallOptions,
    ) -> TurnResult {
        let (session_id, provisioned, epoch, _turn) = self.begin_turn(session_id).await;

        info!(
            session_id = %session_id,
            "Received message: {}...",
            preview(user_text, 50)
        );

        if self
            .store
            .append_at(&session_id, epoch, Role::User, user_text, Map::new())
            .await
            .is_none()
        {
            let error = ChatError::SessionReset(session_id.clone());
            return self.fail(session_id, error, provisioned);
        }

        let messages = self.context.assemble(&self.store, &session_id).await;
        let params = self.config.generation_params(&options);

        let started = Instant::now();
        let outcome = self
            .model
            .complete(CompletionRequest {
                messages,
                params: params.clone(),
            })
            .await;
        let response_time = started.elapsed().as_secs_f64();

        let reply = match outcome {
            Ok(reply) => reply,
            Err(e) => return self.fail(session_id, e, provisioned),
        };

        let mut metadata = Map::new();
        metadata.insert("response_time".to_string(), json!(response_time));
        metadata.insert("model".to_string(), json!(self.model.model_name()));
        metadata.insert(
            "model_params".to_string(),
            serde_json::to_value(&params).unwrap_or_default(),
        );

        let Some(message_count) = self
            .store
            .append_at(&session_id, epoch, Role::Assistant, reply.clone(), metadata)
            .await
        else {
            warn!(session_id = %session_id, "Session changed during the turn; dropping reply");
            let error = ChatError::SessionReset(session_id.clone());
            return self.fail(session_id, error, provisioned);
        };

        info!(
            session_id = %session_id,
            model = self.model.model_name(),
            message_count,
            "Turn completed in {:.2}s",
            response_time
        );

        TurnResult::success(session_id, reply, message_count, response_time, provisioned)
    }

    /// Resolve the session and take its turn lock.
    ///
    /// The session is checked again once the lock is held: if it was deleted
    /// or replaced while this turn waited, resolution starts over, which
    /// provisions a fresh session for a deleted id.
    async fn begin_turn(
        &self,
        requested: Option<&str>,
    ) -> (String, bool, Epoch, OwnedMutexGuard<()>) {
        let mut candidate = requested.map(str::to_string);
        let mut provisioned = false;

        loop {
            let resolution = self.store.resolve_or_create(candidate.as_deref()).await;
            let fresh = resolution.is_provisioned();
            let session_id = resolution.into_session_id();

            if fresh {
                provisioned = true;
                info!(session_id = %session_id, requested = ?requested, "Provisioned new session for turn");
            }

            if let Some(lock) = self.store.turn_lock(&session_id).await {
                let guard = lock.clone().lock_owned().await;

                if let Some(epoch) = self.store.epoch_under(&session_id, &lock).await {
                    if fresh {
                        if let Some(profile) = self.provision_profile {
                            seed_profile(&self.store, &session_id, profile).await;
                        }
                    }
                    return (session_id, provisioned, epoch, guard);
                }
            }

            debug!(session_id = %session_id, "Session changed before the turn started; resolving again");
            candidate = Some(session_id);
        }
    }

    fn fail(&self, session_id: String, error: ChatError, provisioned: bool) -> TurnResult {
        error!(
            session_id = %session_id,
            upstream = error.is_upstream(),
            "Turn failed: {}",
            error
        );
        TurnResult::failure(session_id, error.to_string(), provisioned)
    }
}

/// First `max_chars` characters, on a char boundary
fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
