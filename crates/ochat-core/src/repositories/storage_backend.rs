use std::future::Future;
use std::pin::Pin;

use super::error::RepositoryResult;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// String key/value storage shared by every session of one profile.
///
/// Writes are whole-value replacements: the last `set` for a key wins and
/// nothing is merged.
pub trait StorageBackend: Send + Sync + 'static {
    /// Read the value stored under `key`, `None` if absent
    fn get(&self, key: &str) -> BoxFuture<'static, RepositoryResult<Option<String>>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: String) -> BoxFuture<'static, RepositoryResult<()>>;

    /// Remove `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> BoxFuture<'static, RepositoryResult<()>>;

    /// All stored keys, in no particular order
    fn keys(&self) -> BoxFuture<'static, RepositoryResult<Vec<String>>>;
}
