use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{ChangeNotifier, LocalChangeNotifier, StorageChanged};

const MARKER_FILE_NAME: &str = ".changed";

/// Change notifier shared between processes through a marker file.
///
/// Every write rewrites the marker with `<origin>:<counter>`. A watcher task
/// polls it and re-broadcasts any stamp written by another origin to the
/// local subscribers. Local writes are broadcast directly.
pub struct MarkerFileNotifier {
    marker_path: PathBuf,
    local: LocalChangeNotifier,
    origin: String,
    counter: AtomicU64,
}

impl MarkerFileNotifier {
    /// Creates `storage_dir` if needed so `notify` only has the marker
    /// itself to write.
    pub fn new(storage_dir: &Path) -> Self {
        if let Err(e) = std::fs::create_dir_all(storage_dir) {
            warn!(error = ?e, dir = %storage_dir.display(), "Failed to create marker directory");
        }
        Self {
            marker_path: storage_dir.join(MARKER_FILE_NAME),
            local: LocalChangeNotifier::new(),
            origin: Uuid::new_v4().simple().to_string(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker_path
    }

    fn read_stamp(&self) -> Option<String> {
        std::fs::read_to_string(&self.marker_path).ok()
    }

    fn is_foreign(&self, stamp: &str) -> bool {
        stamp
            .split_once(':')
            .is_some_and(|(origin, _)| origin != self.origin)
    }

    /// Poll the marker every `interval` until the notifier is dropped.
    pub fn spawn_watcher(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut last_seen = weak.upgrade().and_then(|n| n.read_stamp());
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let Some(notifier) = weak.upgrade() else {
                    debug!("Change notifier dropped, stopping marker watcher");
                    break;
                };

                let stamp = notifier.read_stamp();
                if stamp == last_seen {
                    continue;
                }

                if let Some(current) = &stamp
                    && notifier.is_foreign(current)
                {
                    debug!(stamp = %current, "Storage changed in another process");
                    notifier.local.notify();
                }
                last_seen = stamp;
            }
        })
    }
}

impl ChangeNotifier for MarkerFileNotifier {
    fn notify(&self) {
        let count = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let stamp = format!("{}:{}", self.origin, count);

        if let Err(e) = std::fs::write(&self.marker_path, stamp) {
            // Other processes miss this one; local subscribers still hear it
            warn!(error = ?e, path = %self.marker_path.display(), "Failed to write change marker");
        }

        self.local.notify();
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChanged> {
        self.local.subscribe()
    }
}
