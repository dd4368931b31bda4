use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::snapshot::SnapshotStore;

#[derive(Clone)]
pub struct AppState {
    pub snapshots: Arc<SnapshotStore>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            snapshots: Arc::new(SnapshotStore::new()),
            started_at: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
