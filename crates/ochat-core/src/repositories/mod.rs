pub mod conversation_store;
pub mod error;
pub mod in_memory_storage;
pub mod json_file_storage;
pub mod marker_file_notifier;
pub mod preferences_store;
pub mod sqlite_storage;
pub mod storage_backend;

pub use conversation_store::{CHAT_KEY_PREFIX, ConversationStore, conversation_key};
pub use error::{RepositoryError, RepositoryResult};
pub use in_memory_storage::InMemoryStorage;
pub use json_file_storage::JsonFileStorage;
pub use marker_file_notifier::MarkerFileNotifier;
pub use preferences_store::{DEFAULT_USERNAME, PreferencesStore, USERNAME_KEY};
pub use sqlite_storage::SqliteStorage;
pub use storage_backend::{BoxFuture, StorageBackend};
