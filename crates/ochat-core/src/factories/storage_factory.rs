use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::models::{ChangeNotifier, LocalChangeNotifier};
use crate::repositories::{
    ConversationStore, InMemoryStorage, JsonFileStorage, MarkerFileNotifier, PreferencesStore,
    RepositoryError, RepositoryResult, SqliteStorage, StorageBackend,
};
use crate::settings::{ChatSettings, StorageKind};

/// Stores sharing one backend and one change notifier.
pub struct Stores {
    pub conversations: Arc<ConversationStore>,
    pub preferences: PreferencesStore,
    /// Marker watcher for persistent backends; stops when the stores drop.
    pub watcher: Option<JoinHandle<()>>,
}

pub struct StorageFactory;

impl StorageFactory {
    /// Open the configured backend. Persistent backends get a marker-file
    /// notifier so other processes on the same profile see the writes.
    pub async fn open(settings: &ChatSettings) -> RepositoryResult<Stores> {
        match settings.storage {
            StorageKind::Memory => {
                let storage: Arc<dyn StorageBackend> = Arc::new(InMemoryStorage::new());
                let notifier: Arc<dyn ChangeNotifier> = Arc::new(LocalChangeNotifier::new());
                Ok(Self::assemble(storage, notifier, None))
            }
            StorageKind::JsonFiles => {
                let storage = match &settings.storage_dir {
                    Some(dir) => JsonFileStorage::with_dir(dir),
                    None => JsonFileStorage::new()?,
                };
                let dir = storage.storage_dir().to_path_buf();
                Ok(Self::with_marker(Arc::new(storage), dir, settings))
            }
            StorageKind::Sqlite => {
                let dir = Self::data_dir(settings)?;
                let storage = SqliteStorage::open(&dir.join("storage.db")).await?;
                Ok(Self::with_marker(Arc::new(storage), dir, settings))
            }
        }
    }

    fn data_dir(settings: &ChatSettings) -> RepositoryResult<PathBuf> {
        match &settings.storage_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_dir()
                .map(|p| p.join("ochat"))
                .ok_or_else(|| RepositoryError::InitializationError {
                    message: "Cannot find data directory".into(),
                }),
        }
    }

    fn with_marker(
        storage: Arc<dyn StorageBackend>,
        dir: PathBuf,
        settings: &ChatSettings,
    ) -> Stores {
        let notifier = Arc::new(MarkerFileNotifier::new(&dir));
        let watcher = notifier.spawn_watcher(settings.watch_interval());
        info!(dir = %dir.display(), storage = ?settings.storage, "Opened persistent storage");
        Self::assemble(storage, notifier, Some(watcher))
    }

    fn assemble(
        storage: Arc<dyn StorageBackend>,
        notifier: Arc<dyn ChangeNotifier>,
        watcher: Option<JoinHandle<()>>,
    ) -> Stores {
        Stores {
            conversations: Arc::new(ConversationStore::new(storage.clone(), notifier.clone())),
            preferences: PreferencesStore::new(storage, notifier),
            watcher,
        }
    }
}
