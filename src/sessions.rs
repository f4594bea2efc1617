//! Session lifecycle API
//!
//! Create-with-profile, clear, delete, summarize, export and listing,
//! layered on the session store. Summaries and exports are read-only.

use crate::audit::compute_transcript_checksum;
use crate::config::AppConfig;
use crate::error::ChatError;
use crate::memory::{EvictionMode, SessionStore};
use crate::models::{HistoryEntry, Role, SessionExport, SessionListing, SessionSummary};
use crate::prompts::{self, PromptProfile};
use crate::Result;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map};
use std::sync::Arc;
use tracing::info;

/// Append `profile`'s system message to an existing session and record the
/// profile name. Returns false, leaving the store untouched, for unknown ids.
pub async fn seed_profile(store: &SessionStore, session_id: &str, profile: &PromptProfile) -> bool {
    let mut metadata = Map::new();
    metadata.insert("prompt_type".to_string(), json!(profile.name));

    let seeded = store
        .append_existing(session_id, Role::System, profile.system_prompt, metadata)
        .await
        .is_some();
    if seeded {
        store
            .set_prompt_type(session_id, Some(profile.name.to_string()))
            .await;
    }
    seeded
}

/// Conversation view without the system prompt
#[derive(Debug, Clone, Serialize)]
pub struct SessionHistory {
    pub summary: SessionSummary,
    pub history: Vec<HistoryEntry>,
}

/// Public configuration (never includes the credential)
#[derive(Debug, Clone, Serialize)]
pub struct ConfigView {
    pub max_history: usize,
    pub eviction: EvictionMode,
    pub available_prompts: Vec<&'static str>,
    pub model: String,
    pub api_url: String,
}

pub struct SessionService {
    store: Arc<SessionStore>,
    config: Arc<AppConfig>,
}

impl SessionService {
    pub fn new(store: Arc<SessionStore>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Create a session seeded with the named profile's system message.
    /// Unknown profile names fall back to `default`.
    pub async fn create_session(&self, prompt_type: &str) -> String {
        let profile = prompts::resolve(prompt_type);
        let session_id = self.store.create(None).await;
        seed_profile(&self.store, &session_id, profile).await;

        info!(session_id = %session_id, prompt_type = profile.name, "Created session");
        session_id
    }

    /// Clear a session's history. No-op for unknown ids.
    pub async fn clear(&self, session_id: &str) {
        let prompt_type = self.store.info(session_id).await.and_then(|i| i.prompt_type);
        self.store.clear(session_id).await;

        if self.config.keep_system_prompt_on_clear {
            if let Some(name) = prompt_type {
                seed_profile(&self.store, session_id, prompts::resolve(&name)).await;
            }
        }

        info!(session_id = %session_id, "Cleared session");
    }

    /// Remove a session. Returns whether it existed.
    pub async fn delete(&self, session_id: &str) -> bool {
        let removed = self.store.delete(session_id).await;
        if removed {
            info!(session_id = %session_id, "Deleted session");
        }
        removed
    }

    pub async fn summarize(&self, session_id: &str) -> Result<SessionSummary> {
        let info = self
            .store
            .info(session_id)
            .await
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))?;
        let messages = self.store.read(session_id).await;

        let count = |role: Role| messages.iter().filter(|m| m.role == role).count();
        let preview_start = messages.len().saturating_sub(2);

        Ok(SessionSummary {
            session_id: info.session_id,
            created_at: info.created_at,
            last_activity: info.last_activity,
            total_messages: messages.len(),
            user_messages: count(Role::User),
            ai_messages: count(Role::Assistant),
            conversation_preview: messages[preview_start..].to_vec(),
        })
    }

    /// User and assistant messages only, with the session summary
    pub async fn history(&self, session_id: &str) -> Result<SessionHistory> {
        let summary = self.summarize(session_id).await?;
        let history = self
            .store
            .read(session_id)
            .await
            .into_iter()
            .filter(|m| m.role != Role::System)
            .map(HistoryEntry::from)
            .collect();

        Ok(SessionHistory { summary, history })
    }

    /// Full history plus lifecycle metadata, for archival
    pub async fn export(&self, session_id: &str) -> Result<SessionExport> {
        let session_info = self
            .store
            .info(session_id)
            .await
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))?;
        let conversation = self.store.read(session_id).await;
        let checksum = compute_transcript_checksum(&conversation);

        Ok(SessionExport {
            session_info,
            conversation,
            export_time: Utc::now(),
            checksum,
        })
    }

    pub async fn list_sessions(&self) -> Vec<SessionListing> {
        self.store
            .list()
            .await
            .into_iter()
            .map(|(info, retained)| SessionListing {
                session_id: info.session_id,
                created_at: info.created_at,
                last_activity: info.last_activity,
                prompt_type: info.prompt_type,
                total_messages: retained,
                message_count: info.message_count,
            })
            .collect()
    }

    pub fn config_view(&self) -> ConfigView {
        ConfigView {
            max_history: self.store.policy().max_turns,
            eviction: self.store.policy().mode,
            available_prompts: prompts::names(),
            model: self.config.model.clone(),
            api_url: self.config.api_url.clone(),
        }
    }
}
