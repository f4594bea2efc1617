//! Session registry
//!
//! Owns every session's ordered message history and lifecycle metadata.
//! Constructed once and shared by handle; nothing else mutates the registry.

use crate::memory::policy::RetentionPolicy;
use crate::models::{Message, Resolution, Role, SessionInfo};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Identity of one incarnation of a session's history.
///
/// Every create, overwrite and clear starts a new epoch, so a write tagged
/// with an older epoch can be told apart from one meant for the current history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Epoch(u64);

/// One session: metadata, retained messages and the turn lock
#[derive(Debug)]
struct SessionRecord {
    info: SessionInfo,
    messages: VecDeque<Message>,
    epoch: Epoch,
    /// Held by the orchestrator for the whole of a turn
    turn_lock: Arc<Mutex<()>>,
}

impl SessionRecord {
    fn new(session_id: String, epoch: Epoch) -> Self {
        Self {
            info: SessionInfo::new(session_id),
            messages: VecDeque::new(),
            epoch,
            turn_lock: Arc::new(Mutex::new(())),
        }
    }

    fn push(
        &mut self,
        policy: &RetentionPolicy,
        role: Role,
        content: String,
        metadata: Map<String, Value>,
    ) -> usize {
        self.messages.push_back(Message::new(role, content, metadata));

        let evicted = policy.apply(&mut self.messages);
        if evicted > 0 {
            debug!(session_id = %self.info.session_id, evicted, "Retention window applied");
        }

        self.info.last_activity = Utc::now();
        self.info.message_count += 1;
        self.info.message_count
    }
}

/// In-memory session store.
///
/// The registry lock is only held for short synchronous sections and never
/// across an `.await` on anything else, so operations on different sessions
/// do not block each other in any meaningful way.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
    policy: RetentionPolicy,
    next_epoch: AtomicU64,
}

impl SessionStore {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            policy,
            next_epoch: AtomicU64::new(0),
        }
    }

    fn fresh_epoch(&self) -> Epoch {
        Epoch(self.next_epoch.fetch_add(1, Ordering::Relaxed))
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Create a session, using `session_id` verbatim when given.
    ///
    /// Re-creating an existing id resets its history and metadata and starts
    /// a new epoch. The turn lock is carried over so an in-flight turn stays
    /// serialized.
    pub async fn create(&self, session_id: Option<String>) -> String {
        let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut record = SessionRecord::new(session_id.clone(), self.fresh_epoch());
        let mut sessions = self.sessions.write().await;

        if let Some(previous) = sessions.remove(&session_id) {
            debug!(session_id = %session_id, "Overwriting existing session");
            record.turn_lock = previous.turn_lock;
        }
        sessions.insert(session_id.clone(), record);

        debug!(session_id = %session_id, "Session created");
        session_id
    }

    /// Look up `session_id`; allocate a fresh session when it is absent or unknown.
    pub async fn resolve_or_create(&self, session_id: Option<&str>) -> Resolution {
        if let Some(id) = session_id {
            if self.contains(id).await {
                return Resolution::Existing(id.to_string());
            }
        }

        Resolution::Provisioned(self.create(None).await)
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// Append a message and apply the retention policy.
    ///
    /// Unknown ids are provisioned silently. Returns the session's message
    /// count after the append.
    pub async fn append(
        &self,
        session_id: &str,
        role: Role,
        content: impl Into<String>,
        metadata: Map<String, Value>,
    ) -> usize {
        let epoch = self.fresh_epoch();
        let mut sessions = self.sessions.write().await;
        let record = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                debug!(session_id = %session_id, "Auto-provisioning session on append");
                SessionRecord::new(session_id.to_string(), epoch)
            });

        record.push(&self.policy, role, content.into(), metadata)
    }

    /// Append to an existing session only. Returns `None` for unknown ids.
    pub async fn append_existing(
        &self,
        session_id: &str,
        role: Role,
        content: impl Into<String>,
        metadata: Map<String, Value>,
    ) -> Option<usize> {
        let mut sessions = self.sessions.write().await;
        let record = sessions.get_mut(session_id)?;
        Some(record.push(&self.policy, role, content.into(), metadata))
    }

    /// Append only while the session still holds the history of `epoch`.
    ///
    /// Returns `None` when the session was deleted, overwritten or cleared
    /// since the epoch was taken. Never provisions.
    pub async fn append_at(
        &self,
        session_id: &str,
        epoch: Epoch,
        role: Role,
        content: impl Into<String>,
        metadata: Map<String, Value>,
    ) -> Option<usize> {
        let mut sessions = self.sessions.write().await;
        let record = sessions.get_mut(session_id).filter(|r| r.epoch == epoch)?;
        Some(record.push(&self.policy, role, content.into(), metadata))
    }

    /// Retained messages in insertion order; empty for unknown ids
    pub async fn read(&self, session_id: &str) -> Vec<Message> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|record| record.messages.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Empty the history, reset the message count and start a new epoch.
    /// No-op for unknown ids.
    pub async fn clear(&self, session_id: &str) {
        let epoch = self.fresh_epoch();
        if let Some(record) = self.sessions.write().await.get_mut(session_id) {
            record.messages.clear();
            record.info.message_count = 0;
            record.epoch = epoch;
            debug!(session_id = %session_id, "Session cleared");
        }
    }

    /// Remove a session entirely. Returns whether it existed.
    pub async fn delete(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            debug!(session_id = %session_id, "Session deleted");
        }
        removed
    }

    pub async fn info(&self, session_id: &str) -> Option<SessionInfo> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|record| record.info.clone())
    }

    /// Record which prompt profile seeded the session. No-op for unknown ids.
    pub async fn set_prompt_type(&self, session_id: &str, prompt_type: Option<String>) {
        if let Some(record) = self.sessions.write().await.get_mut(session_id) {
            record.info.prompt_type = prompt_type;
        }
    }

    /// All sessions with their retained message counts, oldest first
    pub async fn list(&self) -> Vec<(SessionInfo, usize)> {
        let sessions = self.sessions.read().await;
        let mut entries: Vec<(SessionInfo, usize)> = sessions
            .values()
            .map(|r| (r.info.clone(), r.messages.len()))
            .collect();
        entries.sort_by_key(|(info, _)| info.created_at);
        entries
    }

    /// Per-session turn lock; `None` for unknown ids
    pub async fn turn_lock(&self, session_id: &str) -> Option<Arc<Mutex<()>>> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|record| record.turn_lock.clone())
    }

    /// Current epoch of the session, provided `lock` is still its turn lock.
    ///
    /// `None` means the session is gone or was replaced by a record with a
    /// different lock after `lock` was taken.
    pub async fn epoch_under(&self, session_id: &str, lock: &Arc<Mutex<()>>) -> Option<Epoch> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .filter(|record| Arc::ptr_eq(&record.turn_lock, lock))
            .map(|record| record.epoch)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(RetentionPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::policy::EvictionMode;

    fn store_with_limit(max_turns: usize) -> SessionStore {
        SessionStore::new(RetentionPolicy::new(max_turns, EvictionMode::Messages))
    }

    #[tokio::test]
    async fn test_create_uses_explicit_id() {
        let store = SessionStore::default();
        let id = store.create(Some("fixed-id".to_string())).await;
        assert_eq!(id, "fixed-id");

        let info = store.info("fixed-id").await.unwrap();
        assert_eq!(info.message_count, 0);
        assert_eq!(info.created_at, info.last_activity);
    }

    #[tokio::test]
    async fn test_create_generates_unique_ids() {
        let store = SessionStore::default();
        let a = store.create(None).await;
        let b = store.create(None).await;
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[tokio::test]
    async fn test_recreate_overwrites_history() {
        let store = SessionStore::default();
        let id = store.create(None).await;
        store.append(&id, Role::User, "hello", Map::new()).await;

        store.create(Some(id.clone())).await;
        assert!(store.read(&id).await.is_empty());
        assert_eq!(store.info(&id).await.unwrap().message_count, 0);
    }

    #[tokio::test]
    async fn test_append_auto_provisions_unknown_session() {
        let store = SessionStore::default();
        let count = store.append("ghost", Role::User, "hi", Map::new()).await;

        assert_eq!(count, 1);
        assert!(store.contains("ghost").await);
        assert_eq!(store.read("ghost").await[0].content, "hi");
    }

    #[tokio::test]
    async fn test_read_and_info_for_unknown_session() {
        let store = SessionStore::default();
        assert!(store.read("missing").await.is_empty());
        assert!(store.info("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_alternating_appends_are_windowed() {
        let store = store_with_limit(3);
        let id = store.create(None).await;

        for n in 1..=15usize {
            let role = if n % 2 == 1 { Role::User } else { Role::Assistant };
            store.append(&id, role, format!("m{}", n), Map::new()).await;

            let history = store.read(&id).await;
            assert_eq!(history.len(), n.min(6));
            assert_eq!(history.last().unwrap().content, format!("m{}", n));
            assert_eq!(store.info(&id).await.unwrap().message_count, n);
        }
    }

    #[tokio::test]
    async fn test_retention_scenario_with_system_message() {
        let store = store_with_limit(2);
        let id = store.create(None).await;
        store.append(&id, Role::System, "sys", Map::new()).await;

        let mut appended = Vec::new();
        for turn in 0..3 {
            for role in [Role::User, Role::Assistant] {
                let content = format!("{}-{}", role, turn);
                store.append(&id, role, content.clone(), Map::new()).await;
                appended.push(content);

                let history = store.read(&id).await;
                let conversational: Vec<&str> = history[1..]
                    .iter()
                    .map(|m| m.content.as_str())
                    .collect();

                assert_eq!(history[0].role, Role::System);
                assert!(conversational.len() <= 4);

                let start = appended.len().saturating_sub(4);
                let expected: Vec<&str> = appended[start..].iter().map(String::as_str).collect();
                assert_eq!(conversational, expected);
            }
        }
    }

    #[tokio::test]
    async fn test_clear_keeps_identity() {
        let store = SessionStore::default();
        let id = store.create(None).await;
        let created_at = store.info(&id).await.unwrap().created_at;

        for i in 0..5 {
            store.append(&id, Role::User, format!("q{}", i), Map::new()).await;
        }
        store.clear(&id).await;

        assert!(store.read(&id).await.is_empty());
        let info = store.info(&id).await.unwrap();
        assert_eq!(info.message_count, 0);
        assert_eq!(info.created_at, created_at);

        store.clear("missing").await;
        assert!(!store.contains("missing").await);
    }

    #[tokio::test]
    async fn test_delete_removes_session() {
        let store = SessionStore::default();
        let id = store.create(None).await;
        store.append(&id, Role::User, "hi", Map::new()).await;

        assert!(store.delete(&id).await);
        assert!(!store.delete(&id).await);
        assert!(store.info(&id).await.is_none());
        assert!(store.read(&id).await.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_or_create() {
        let store = SessionStore::default();
        let id = store.create(None).await;

        assert_eq!(
            store.resolve_or_create(Some(&id)).await,
            Resolution::Existing(id.clone())
        );

        let provisioned = store.resolve_or_create(Some("unknown")).await;
        assert!(provisioned.is_provisioned());
        assert_ne!(provisioned.session_id(), "unknown");
        assert!(!store.contains("unknown").await);

        assert!(store.resolve_or_create(None).await.is_provisioned());
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_creation() {
        let store = SessionStore::default();
        let first = store.create(Some("first".into())).await;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = store.create(Some("second".into())).await;

        store.append(&second, Role::User, "hi", Map::new()).await;

        let listed = store.list().await;
        let ids: Vec<&str> = listed.iter().map(|(i, _)| i.session_id.as_str()).collect();
        assert_eq!(ids, vec![first.as_str(), second.as_str()]);
        assert_eq!(listed[1].1, 1);
    }

    #[tokio::test]
    async fn test_turn_lock_is_shared_per_session() {
        let store = SessionStore::default();
        let id = store.create(None).await;

        let a = store.turn_lock(&id).await.unwrap();
        let b = store.turn_lock(&id).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        // Overwriting keeps the lock
        store.create(Some(id.clone())).await;
        assert!(Arc::ptr_eq(&a, &store.turn_lock(&id).await.unwrap()));

        assert!(store.turn_lock("other").await.is_none());
        assert!(!store.contains("other").await);
    }

    #[tokio::test]
    async fn test_append_existing_never_provisions() {
        let store = SessionStore::default();
        assert!(store.append_existing("ghost", Role::User, "hi", Map::new()).await.is_none());
        assert!(!store.contains("ghost").await);

        let id = store.create(None).await;
        assert_eq!(store.append_existing(&id, Role::User, "hi", Map::new()).await, Some(1));
    }

    #[tokio::test]
    async fn test_append_at_rejects_stale_epoch() {
        let store = SessionStore::default();
        let id = store.create(None).await;
        let lock = store.turn_lock(&id).await.unwrap();
        let epoch = store.epoch_under(&id, &lock).await.unwrap();

        assert_eq!(store.append_at(&id, epoch, Role::User, "q1", Map::new()).await, Some(1));

        store.clear(&id).await;
        assert!(store.append_at(&id, epoch, Role::Assistant, "a1", Map::new()).await.is_none());
        assert!(store.read(&id).await.is_empty());

        let cleared = store.epoch_under(&id, &lock).await.unwrap();
        assert_ne!(cleared, epoch);

        store.create(Some(id.clone())).await;
        assert!(store.append_at(&id, cleared, Role::User, "q2", Map::new()).await.is_none());

        store.delete(&id).await;
        assert!(store.append_at(&id, cleared, Role::User, "q3", Map::new()).await.is_none());
        assert!(!store.contains(&id).await);
    }

    #[tokio::test]
    async fn test_epoch_under_detects_replaced_lock() {
        let store = SessionStore::default();
        let id = store.create(None).await;
        let lock = store.turn_lock(&id).await.unwrap();

        store.delete(&id).await;
        assert!(store.epoch_under(&id, &lock).await.is_none());

        // Same id again, but a different record and lock
        store.create(Some(id.clone())).await;
        assert!(store.epoch_under(&id, &lock).await.is_none());
        let current = store.turn_lock(&id).await.unwrap();
        assert!(store.epoch_under(&id, &current).await.is_some());
    }
}
