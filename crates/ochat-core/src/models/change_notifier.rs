use tokio::sync::broadcast;

/// Default broadcast channel capacity.
const DEFAULT_CAPACITY: usize = 64;

/// "Storage changed, re-read what you display." Carries no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageChanged;

/// Cross-tab change signal fired after every successful storage write.
///
/// Subscribers treat `RecvError::Lagged` like a regular signal: missing a
/// few hints still means "something changed".
pub trait ChangeNotifier: Send + Sync + 'static {
    /// Fire the signal. Never blocks, never fails.
    fn notify(&self);

    /// Receive every signal fired after this call.
    fn subscribe(&self) -> broadcast::Receiver<StorageChanged>;
}

/// In-process notifier shared by every session holding the same store.
#[derive(Clone)]
pub struct LocalChangeNotifier {
    tx: broadcast::Sender<StorageChanged>,
}

impl LocalChangeNotifier {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LocalChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier for LocalChangeNotifier {
    fn notify(&self) {
        // No subscribers is fine
        let _ = self.tx.send(StorageChanged);
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChanged> {
        self.tx.subscribe()
    }
}
