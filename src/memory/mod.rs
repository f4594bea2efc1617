//! Session memory
//!
//! Session registry, retention policy, and assembly of stored history into
//! model input.

pub mod context_manager;
pub mod policy;
pub mod store;

pub use context_manager::ContextManager;
pub use policy::{EvictionMode, RetentionPolicy};
pub use store::{Epoch, SessionStore};
