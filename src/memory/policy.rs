//! History retention policy
//!
//! Decides which messages survive after an append. Stateless: the same
//! message list and limit always produce the same retained suffix.

use crate::models::{Message, Role};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;

/// How the retention window treats turn boundaries
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EvictionMode {
    /// Keep the newest `2 * max_turns` conversational messages, counted raw.
    #[default]
    Messages,
    /// Like `Messages`, but also evict an assistant reply left at the head
    /// of the window so history never starts mid-turn.
    Turns,
}

impl FromStr for EvictionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "messages" | "message" => Ok(EvictionMode::Messages),
            "turns" | "turn" | "pairs" => Ok(EvictionMode::Turns),
            other => Err(format!("unknown eviction mode: {}", other)),
        }
    }
}

/// Sliding-window retention over a session's messages.
///
/// A `system` message at index 0 is pinned and never evicted; the window
/// covers the conversational messages after it. `max_turns == 0` disables
/// eviction entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_turns: usize,
    pub mode: EvictionMode,
}

pub const DEFAULT_MAX_TURNS: usize = 10;

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            mode: EvictionMode::Messages,
        }
    }
}

impl RetentionPolicy {
    pub fn new(max_turns: usize, mode: EvictionMode) -> Self {
        Self { max_turns, mode }
    }

    /// Upper bound on retained conversational messages
    pub fn window(&self) -> usize {
        self.max_turns.saturating_mul(2)
    }

    /// Number of conversational messages (after any pinned system message)
    /// that must be dropped from the front.
    fn eviction_count(&self, roles: &[Role]) -> (usize, usize) {
        let pinned = usize::from(roles.first() == Some(&Role::System));
        let conversational = &roles[pinned..];

        if self.max_turns == 0 {
            return (pinned, 0);
        }

        let mut drop = conversational.len().saturating_sub(self.window());

        if self.mode == EvictionMode::Turns && drop > 0 {
            while drop < conversational.len() && conversational[drop] == Role::Assistant {
                drop += 1;
            }
        }

        (pinned, drop)
    }

    /// Pure form: the messages that survive, in insertion order
    pub fn retained(&self, messages: &[Message]) -> Vec<Message> {
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        let (pinned, drop) = self.eviction_count(&roles);

        messages[..pinned]
            .iter()
            .chain(messages[pinned + drop..].iter())
            .cloned()
            .collect()
    }

    /// In-place form used by the store. Returns how many messages were evicted.
    pub fn apply(&self, messages: &mut VecDeque<Message>) -> usize {
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        let (pinned, drop) = self.eviction_count(&roles);

        if drop > 0 {
            messages.drain(pinned..pinned + drop);
        }

        drop
    }
}
