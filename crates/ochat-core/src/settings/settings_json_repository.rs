use std::path::{Path, PathBuf};

use super::chat_settings::ChatSettings;
use super::settings_repository::SettingsRepository;
use crate::repositories::{BoxFuture, RepositoryError, RepositoryResult};

pub struct SettingsJsonRepository {
    file_path: PathBuf,
}

impl SettingsJsonRepository {
    /// Create repository with XDG-compliant path
    pub fn new() -> RepositoryResult<Self> {
        let config_dir = dirs::config_dir().ok_or_else(|| RepositoryError::InitializationError {
            message: "Cannot determine config directory".into(),
        })?;

        Ok(Self {
            file_path: config_dir.join("ochat").join("settings.json"),
        })
    }

    pub fn with_path(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

impl SettingsRepository for SettingsJsonRepository {
    fn load(&self) -> BoxFuture<'static, RepositoryResult<ChatSettings>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            let contents = match tokio::fs::read_to_string(&path).await {
                Ok(contents) => contents,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Ok(ChatSettings::default());
                }
                Err(e) => return Err(RepositoryError::from_io(e)),
            };

            let settings: ChatSettings = serde_json::from_str(&contents)?;
            Ok(settings)
        })
    }

    fn save(&self, settings: ChatSettings) -> BoxFuture<'static, RepositoryResult<()>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            let json = serde_json::to_string_pretty(&settings)?;

            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(RepositoryError::from_io)?;
            }

            // Write atomically using temp file + rename
            let temp_path = path.with_extension("json.tmp");
            tokio::fs::write(&temp_path, &json)
                .await
                .map_err(RepositoryError::from_io)?;
            tokio::fs::rename(&temp_path, &path)
                .await
                .map_err(RepositoryError::from_io)?;

            Ok(())
        })
    }
}
