//! Chat Session Orchestrator
//!
//! Conversational front end to a remote chat-completion model:
//! - Keeps per-session, ordered dialogue history in memory
//! - Bounds retained history with a sliding turn window
//! - Forwards the accumulated context to the model on every turn
//! - Returns the reply with timing and message-count bookkeeping
//!
//! TURN LOOP:
//! RESOLVE SESSION → APPEND USER → ASSEMBLE CONTEXT → CALL MODEL → APPEND REPLY

pub mod agent;
pub mod api;
pub mod audit;
pub mod config;
pub mod error;
pub mod llm;
pub mod memory;
pub mod models;
pub mod prompts;
pub mod sessions;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use agent::TurnOrchestrator;
pub use config::AppConfig;
pub use sessions::SessionService;
