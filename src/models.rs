//! Core data models for sessions, messages and turns

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

//
// ================= Messages =================
//

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single stored message in a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata,
        }
    }
}

/// Role/content pair handed to the remote model, in conversation order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

//
// ================= Sessions =================
//

/// Lifecycle metadata of a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionInfo {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Messages appended since creation or the last clear. Eviction does not lower it.
    pub message_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_type: Option<String>,
}

impl SessionInfo {
    pub fn new(session_id: String) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            created_at: now,
            last_activity: now,
            message_count: 0,
            prompt_type: None,
        }
    }
}

/// Outcome of resolving a caller-supplied session id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Existing(String),
    Provisioned(String),
}

impl Resolution {
    pub fn session_id(&self) -> &str {
        match self {
            Resolution::Existing(id) | Resolution::Provisioned(id) => id,
        }
    }

    pub fn into_session_id(self) -> String {
        match self {
            Resolution::Existing(id) | Resolution::Provisioned(id) => id,
        }
    }

    pub fn is_provisioned(&self) -> bool {
        matches!(self, Resolution::Provisioned(_))
    }
}

//
// ================= Turns =================
//

/// Per-call generation parameters; unset fields use configured defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CallOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

/// Generation parameters after defaults have been applied
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

/// Result of one submitted user turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnResult {
    pub success: bool,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_count: Option<usize>,
    /// Seconds spent in the model call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The caller's session id was absent or unknown and a new session was allocated
    pub provisioned: bool,
}

impl TurnResult {
    pub fn success(
        session_id: String,
        response: String,
        message_count: usize,
        response_time: f64,
        provisioned: bool,
    ) -> Self {
        Self {
            success: true,
            session_id,
            response: Some(response),
            message_count: Some(message_count),
            response_time: Some(response_time),
            error: None,
            provisioned,
        }
    }

    pub fn failure(session_id: String, error: String, provisioned: bool) -> Self {
        Self {
            success: false,
            session_id,
            response: None,
            message_count: None,
            response_time: None,
            error: Some(error),
            provisioned,
        }
    }
}

//
// ================= Lifecycle Views =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Retained messages, system prompt included
    pub total_messages: usize,
    pub user_messages: usize,
    pub ai_messages: usize,
    /// Last two retained messages
    pub conversation_preview: Vec<Message>,
}

/// A message as shown in history views, without metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl From<Message> for HistoryEntry {
    fn from(message: Message) -> Self {
        Self {
            role: message.role,
            content: message.content,
            timestamp: message.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionExport {
    pub session_info: SessionInfo,
    pub conversation: Vec<Message>,
    pub export_time: DateTime<Utc>,
    /// Hex SHA-256 of the serialized conversation
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionListing {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_type: Option<String>,
    /// Retained messages, system prompt included
    pub total_messages: usize,
    /// Messages appended since creation or the last clear
    pub message_count: usize,
}
