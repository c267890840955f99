use std::sync::Arc;

use tracing::info;

use super::error::RepositoryResult;
use super::storage_backend::StorageBackend;
use crate::models::ChangeNotifier;

pub const USERNAME_KEY: &str = "ollama_user";
pub const DEFAULT_USERNAME: &str = "Anonymous";

/// Profile-level preferences stored next to the conversations.
#[derive(Clone)]
pub struct PreferencesStore {
    storage: Arc<dyn StorageBackend>,
    notifier: Arc<dyn ChangeNotifier>,
}

impl PreferencesStore {
    pub fn new(storage: Arc<dyn StorageBackend>, notifier: Arc<dyn ChangeNotifier>) -> Self {
        Self { storage, notifier }
    }

    pub async fn username(&self) -> RepositoryResult<Option<String>> {
        self.storage.get(USERNAME_KEY).await
    }

    pub async fn set_username(&self, username: &str) -> RepositoryResult<()> {
        self.storage
            .set(USERNAME_KEY, username.to_string())
            .await?;
        self.notifier.notify();
        Ok(())
    }

    /// Return the stored username, writing the default on first run.
    pub async fn ensure_username(&self) -> RepositoryResult<String> {
        if let Some(existing) = self.username().await? {
            return Ok(existing);
        }

        info!(username = DEFAULT_USERNAME, "No username stored, using default");
        self.set_username(DEFAULT_USERNAME).await?;
        Ok(DEFAULT_USERNAME.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LocalChangeNotifier;
    use crate::repositories::InMemoryStorage;

    fn prefs() -> (PreferencesStore, LocalChangeNotifier) {
        let notifier = LocalChangeNotifier::new();
        let store = PreferencesStore::new(Arc::new(InMemoryStorage::new()), Arc::new(notifier.clone()));
        (store, notifier)
    }

    #[tokio::test]
    async fn test_first_run_writes_default() {
        let (store, notifier) = prefs();
        let mut rx = notifier.subscribe();

        assert_eq!(store.ensure_username().await.unwrap(), "Anonymous");
        assert_eq!(store.username().await.unwrap().as_deref(), Some("Anonymous"));
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_existing_username_is_kept_without_write() {
        let (store, notifier) = prefs();
        store.set_username("Ada").await.unwrap();
        let mut rx = notifier.subscribe();

        assert_eq!(store.ensure_username().await.unwrap(), "Ada");
        assert!(rx.try_recv().is_err());
    }
}
