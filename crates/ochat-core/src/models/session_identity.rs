use uuid::Uuid;

use super::message::Message;

/// Holds the identifier of the conversation currently being composed.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    active_id: String,
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self {
            active_id: Self::generate(),
        }
    }

    /// Adopt an existing conversation identifier (e.g. one loaded from storage).
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            active_id: id.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.active_id
    }

    /// Generate a fresh identifier when `messages` is empty.
    ///
    /// Returns `true` when the active identifier was replaced. Storage is
    /// never touched.
    pub fn ensure_session_id(&mut self, messages: &[Message]) -> bool {
        if !messages.is_empty() {
            return false;
        }
        self.active_id = Self::generate();
        true
    }

    fn generate() -> String {
        Uuid::new_v4().to_string()
    }
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::new()
    }
}
