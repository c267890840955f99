use thiserror::Error;

use crate::models::ContextError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("A generation is already in flight for conversation {conversation_id}")]
    GenerationInFlight { conversation_id: String },

    #[error("No generation is streaming for conversation {conversation_id}")]
    NotStreaming { conversation_id: String },

    #[error("Not connected to a model backend")]
    NotConnected,

    #[error("Message is empty")]
    EmptyInput,

    #[error("Connection failed: {0}")]
    Connection(String),
}

impl From<ContextError> for SessionError {
    fn from(error: ContextError) -> Self {
        match error {
            ContextError::GenerationInFlight { conversation_id } => {
                SessionError::GenerationInFlight { conversation_id }
            }
            ContextError::NotStreaming { conversation_id } => {
                SessionError::NotStreaming { conversation_id }
            }
        }
    }
}
