use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Snapshot, SnapshotStore};
use crate::error::{RidedeskError, RidedeskResult};

/// Keeps the latest snapshot in process memory.
///
/// Used for embedding and tests; `fail_saves` simulates a broken backend.
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshot: RwLock<Option<Snapshot>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: RwLock::new(Some(snapshot)),
            ..Self::default()
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub async fn latest(&self) -> Option<Snapshot> {
        self.snapshot.read().await.clone()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    fn location(&self) -> String {
        "memory".to_string()
    }

    async fn load_snapshot(&self) -> RidedeskResult<Option<Snapshot>> {
        Ok(self.snapshot.read().await.clone())
    }

    async fn save_snapshot(&self, snapshot: &Snapshot) -> RidedeskResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(RidedeskError::SnapshotSaveFailed {
                location: self.location(),
                message: "store is configured to reject writes".to_string(),
            });
        }

        *self.snapshot.write().await = Some(snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
