use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::error::RepositoryResult;
use super::storage_backend::StorageBackend;
use crate::models::{ChangeNotifier, Message, StorageChanged};

/// Every conversation lives under `chat_<conversation id>`.
pub const CHAT_KEY_PREFIX: &str = "chat_";

pub fn conversation_key(conversation_id: &str) -> String {
    format!("{}{}", CHAT_KEY_PREFIX, conversation_id)
}

/// Persists whole conversations as JSON arrays of messages.
///
/// Each save replaces the stored list. Every successful write or delete
/// fires the change notifier so other sessions re-read.
#[derive(Clone)]
pub struct ConversationStore {
    storage: Arc<dyn StorageBackend>,
    notifier: Arc<dyn ChangeNotifier>,
}

impl ConversationStore {
    pub fn new(storage: Arc<dyn StorageBackend>, notifier: Arc<dyn ChangeNotifier>) -> Self {
        Self { storage, notifier }
    }

    pub async fn save(&self, conversation_id: &str, messages: &[Message]) -> RepositoryResult<()> {
        let json = serde_json::to_string(messages)?;
        self.storage
            .set(&conversation_key(conversation_id), json)
            .await?;

        debug!(conversation_id, count = messages.len(), "Saved conversation");
        self.notifier.notify();
        Ok(())
    }

    /// Load a conversation. Absent, unreadable or corrupt data yields an
    /// empty list; the caller then starts fresh.
    pub async fn load(&self, conversation_id: &str) -> Vec<Message> {
        let raw = match self.storage.get(&conversation_key(conversation_id)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(conversation_id, error = ?e, "Failed to read conversation");
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(messages) => messages,
            Err(e) => {
                warn!(conversation_id, error = ?e, "Stored conversation is corrupt, treating as empty");
                Vec::new()
            }
        }
    }

    pub async fn delete(&self, conversation_id: &str) -> RepositoryResult<()> {
        self.storage
            .remove(&conversation_key(conversation_id))
            .await?;
        self.notifier.notify();
        Ok(())
    }

    /// Ids of every stored conversation, sorted.
    pub async fn list_ids(&self) -> RepositoryResult<Vec<String>> {
        let mut ids: Vec<String> = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter_map(|key| key.strip_prefix(CHAT_KEY_PREFIX).map(str::to_string))
            .collect();
        ids.sort();
        Ok(ids)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StorageChanged> {
        self.notifier.subscribe()
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    pub fn notifier(&self) -> &Arc<dyn ChangeNotifier> {
        &self.notifier
    }
}
