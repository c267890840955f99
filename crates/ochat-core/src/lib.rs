//! Chat session lifecycle and streaming-response reconciliation for a local
//! Ollama chat client.
//!
//! The crate is split the same way the app is wired:
//! - [`models`] holds the data model, the per-session state machine and the
//!   fragment reconciler.
//! - [`repositories`] persists conversations and preferences behind a
//!   key/value [`repositories::StorageBackend`].
//! - [`services`] adapts model backends into lazy fragment streams.
//! - [`controllers`] drives a submission end to end in [`ChatSession`].

pub mod controllers;
pub mod factories;
pub mod models;
pub mod repositories;
pub mod services;
pub mod settings;

#[cfg(test)]
mod test_helpers;

pub use controllers::{ChatSession, GenerationOutcome, SessionError};
pub use models::{Attachment, Message, Role};
pub use repositories::{ConversationStore, PreferencesStore};
pub use settings::{BackendMode, ChatSettings};
