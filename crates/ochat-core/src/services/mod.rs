pub mod fragment_channel;
pub mod generation_client;
pub mod ollama_client;
pub mod route_handler_client;

pub use fragment_channel::{FRAGMENT_CHANNEL_CAPACITY, spawn_fragment_producer};
pub use generation_client::{
    ChatTurn, Fragment, FragmentStream, GenerationClient, GenerationError, GenerationRequest,
};
pub use ollama_client::{DEFAULT_OLLAMA_URL, OllamaClient};
pub use route_handler_client::{DEFAULT_HANDLER_URL, RouteHandlerClient};
