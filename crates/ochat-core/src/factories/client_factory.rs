use std::sync::Arc;

use tracing::info;

use crate::controllers::SessionError;
use crate::services::{GenerationClient, OllamaClient, RouteHandlerClient};
use crate::settings::{BackendMode, ChatSettings};

/// Builds the generation client for the configured backend mode.
pub struct ClientFactory;

impl ClientFactory {
    /// The client a new session starts with.
    ///
    /// Route-handler mode is usable right away. Direct mode starts
    /// disconnected and waits for an explicit `connect`.
    pub fn default_client(settings: &ChatSettings) -> Option<Arc<dyn GenerationClient>> {
        match settings.backend_mode {
            BackendMode::RouteHandler => {
                info!(endpoint = %settings.handler_url, "Using chat route backend");
                Some(Arc::new(RouteHandlerClient::new(&settings.handler_url)))
            }
            BackendMode::Direct => None,
        }
    }

    /// Build a direct Ollama client. Only available in direct mode.
    pub fn connect_direct(settings: &ChatSettings) -> Result<Arc<dyn GenerationClient>, SessionError> {
        match settings.backend_mode {
            BackendMode::Direct => Ok(Arc::new(OllamaClient::new(&settings.ollama_url))),
            BackendMode::RouteHandler => Err(SessionError::Connection(
                "explicit connect is only available in direct mode".into(),
            )),
        }
    }
}
