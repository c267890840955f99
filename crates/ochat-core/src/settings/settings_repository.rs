use super::chat_settings::ChatSettings;
use crate::repositories::{BoxFuture, RepositoryResult};

pub trait SettingsRepository: Send + Sync + 'static {
    /// Load settings from storage
    fn load(&self) -> BoxFuture<'static, RepositoryResult<ChatSettings>>;

    /// Save settings to storage
    fn save(&self, settings: ChatSettings) -> BoxFuture<'static, RepositoryResult<()>>;
}
