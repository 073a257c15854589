//! Snapshot store
//!
//! Holds exactly one published [`Snapshot`]. The refresher is the only writer;
//! the query service and the broadcast hub read it on every request and tick.
//! Publication is a pointer swap, so readers never wait on the writer and can
//! never observe records from one refresh paired with the timestamp of another.

use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::model::Snapshot;

pub struct SnapshotStore {
    current: ArcSwap<Snapshot>,
}

impl SnapshotStore {
    /// Create a store holding the empty, never-updated snapshot
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::empty()),
        }
    }

    /// Publish a new snapshot, replacing the previous one wholesale
    pub fn replace(&self, snapshot: Snapshot) {
        self.current.store(Arc::new(snapshot));
    }

    /// The snapshot visible at call time
    pub fn current(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe store handle shared between components
pub type SharedStore = Arc<SnapshotStore>;
