use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Stops the generation in flight from another task.
///
/// Every generation gets its own [`CancellationToken`]. Clones of the handle
/// share the slot holding the current one, so a cancel issued while idle
/// has nothing to stop and cannot leak into the next submission.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the running generation. Returns false when none is running.
    pub fn cancel(&self) -> bool {
        match self.current.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Install a fresh token for the generation about to start.
    pub(crate) fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.current.lock() = Some(token.clone());
        token
    }

    pub(crate) fn finish(&self) {
        self.current.lock().take();
    }
}
