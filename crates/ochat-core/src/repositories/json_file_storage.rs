use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::error::{RepositoryError, RepositoryResult};
use super::storage_backend::{BoxFuture, StorageBackend};

const VALUE_EXTENSION: &str = "value";

/// File-backed key/value storage.
/// Stores each key as a separate file in ~/.local/share/ochat/storage/
pub struct JsonFileStorage {
    storage_dir: PathBuf,
}

impl JsonFileStorage {
    pub fn new() -> RepositoryResult<Self> {
        let storage_dir = dirs::data_dir()
            .ok_or_else(|| RepositoryError::InitializationError {
                message: "Could not determine data directory".to_string(),
            })?
            .join("ochat")
            .join("storage");

        Ok(Self { storage_dir })
    }

    /// Create storage rooted at a custom directory (for testing)
    pub fn with_dir(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    fn value_path(&self, key: &str) -> RepositoryResult<PathBuf> {
        validate_key(key)?;
        Ok(self
            .storage_dir
            .join(format!("{}.{}", key, VALUE_EXTENSION)))
    }
}

/// Keys become file names, so only a conservative character set is accepted.
fn validate_key(key: &str) -> RepositoryResult<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if valid {
        Ok(())
    } else {
        Err(RepositoryError::InvalidKey {
            key: key.to_string(),
        })
    }
}

impl StorageBackend for JsonFileStorage {
    fn get(&self, key: &str) -> BoxFuture<'static, RepositoryResult<Option<String>>> {
        let path = self.value_path(key);

        Box::pin(async move {
            let path = path?;
            match tokio::fs::read_to_string(&path).await {
                Ok(contents) => Ok(Some(contents)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(RepositoryError::from_io(e)),
            }
        })
    }

    fn set(&self, key: &str, value: String) -> BoxFuture<'static, RepositoryResult<()>> {
        let path = self.value_path(key);
        let storage_dir = self.storage_dir.clone();

        Box::pin(async move {
            let path = path?;

            // Ensure directory exists
            tokio::fs::create_dir_all(&storage_dir)
                .await
                .map_err(RepositoryError::from_io)?;

            // Write atomically (temp file, then rename). The temp name is unique
            // so two processes writing the same key never share a temp file.
            let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
            if let Err(e) = tokio::fs::write(&temp_path, value).await {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(RepositoryError::from_io(e));
            }
            tokio::fs::rename(&temp_path, &path)
                .await
                .map_err(RepositoryError::from_io)?;

            Ok(())
        })
    }

    fn remove(&self, key: &str) -> BoxFuture<'static, RepositoryResult<()>> {
        let path = self.value_path(key);

        Box::pin(async move {
            let path = path?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(RepositoryError::from_io(e)),
            }
        })
    }

    fn keys(&self) -> BoxFuture<'static, RepositoryResult<Vec<String>>> {
        let storage_dir = self.storage_dir.clone();

        Box::pin(async move {
            let mut entries = match tokio::fs::read_dir(&storage_dir).await {
                Ok(entries) => entries,
                // Nothing written yet
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(RepositoryError::from_io(e)),
            };

            let mut keys = Vec::new();
            while let Some(entry) = entries.next_entry().await.map_err(RepositoryError::from_io)? {
                let path = entry.path();
                if path.extension().and_then(|s| s.to_str()) == Some(VALUE_EXTENSION)
                    && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                {
                    keys.push(stem.to_string());
                }
            }

            Ok(keys)
        })
    }
}
