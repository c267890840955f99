pub mod chat_session;
pub mod session_error;

pub use chat_session::{ChatSession, GenerationOutcome};
pub use session_error::SessionError;
