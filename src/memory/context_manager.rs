//! Context assembly
//!
//! Linearizes a session's stored history into the exact ordered turn
//! sequence handed to the remote model.

use crate::memory::store::SessionStore;
use crate::models::{ChatTurn, Message};

/// Builds model input from stored history.
///
/// Every role is forwarded verbatim and insertion order is preserved; the
/// model relies on that ordering for conversational context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextManager;

impl ContextManager {
    pub fn new() -> Self {
        Self
    }

    /// Context for `session_id`; empty for unknown sessions
    pub async fn assemble(&self, store: &SessionStore, session_id: &str) -> Vec<ChatTurn> {
        Self::linearize(&store.read(session_id).await)
    }

    pub fn linearize(messages: &[Message]) -> Vec<ChatTurn> {
        messages
            .iter()
            .map(|msg| ChatTurn {
                role: msg.role,
                content: msg.content.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use serde_json::{json, Map};

    #[tokio::test]
    async fn test_assemble_preserves_order_and_roles() {
        let store = SessionStore::default();
        let id = store.create(None).await;

        let mut metadata = Map::new();
        metadata.insert("response_time".into(), json!(0.4));

        store.append(&id, Role::System, "be brief", Map::new()).await;
        store.append(&id, Role::User, "hi", Map::new()).await;
        store.append(&id, Role::Assistant, "hello", metadata).await;
        store.append(&id, Role::User, "how are you?", Map::new()).await;

        let context = ContextManager::new().assemble(&store, &id).await;
        let roles: Vec<Role> = context.iter().map(|t| t.role).collect();
        let contents: Vec<&str> = context.iter().map(|t| t.content.as_str()).collect();

        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(contents, vec!["be brief", "hi", "hello", "how are you?"]);
    }

    #[tokio::test]
    async fn test_assemble_unknown_session_is_empty() {
        let store = SessionStore::default();
        assert!(ContextManager::new().assemble(&store, "nope").await.is_empty());
    }

    #[test]
    fn test_turns_serialize_as_chat_messages() {
        let turns = ContextManager::linearize(&[Message::new(Role::User, "ping", Map::new())]);
        let json = serde_json::to_value(&turns).unwrap();
        assert_eq!(json, json!([{ "role": "user", "content": "ping" }]));
    }
}
