//! Background refresh loop
//!
//! Owns the single timer that keeps the snapshot fresh. Each tick fetches the
//! feed once, bounded by a timeout, and publishes a new snapshot on success.
//! A failed fetch leaves the previous snapshot in place; staleness stays
//! visible through `updated_at` and the [`RefreshMonitor`].

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::feed::{normalize, FeedSource};
use crate::model::Snapshot;
use crate::store::SharedStore;

/// Outcome history of the refresh loop, as reported by `/api/health`
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshStatus {
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

/// Refresh status published with the same swap discipline as the snapshot
#[derive(Default)]
pub struct RefreshMonitor {
    status: ArcSwap<RefreshStatus>,
}

impl RefreshMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Arc<RefreshStatus> {
        self.status.load_full()
    }

    fn record_success(&self, at: DateTime<Utc>) {
        self.status.store(Arc::new(RefreshStatus {
            last_attempt: Some(at),
            last_success: Some(at),
            consecutive_failures: 0,
            last_error: None,
        }));
    }

    fn record_failure(&self, at: DateTime<Utc>, error: &FeedError) {
        let previous = self.status.load();
        self.status.store(Arc::new(RefreshStatus {
            last_attempt: Some(at),
            last_success: previous.last_success,
            consecutive_failures: previous.consecutive_failures.saturating_add(1),
            last_error: Some(error.to_string()),
        }));
    }
}

pub struct Refresher {
    store: SharedStore,
    source: Arc<dyn FeedSource>,
    monitor: Arc<RefreshMonitor>,
    interval: Duration,
    timeout: Duration,
}

impl Refresher {
    pub fn new(store: SharedStore, source: Arc<dyn FeedSource>, config: &FeedConfig) -> Self {
        Self::with_timing(store, source, config.refresh_interval(), config.timeout())
    }

    pub fn with_timing(
        store: SharedStore,
        source: Arc<dyn FeedSource>,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            source,
            monitor: Arc::new(RefreshMonitor::new()),
            interval,
            timeout,
        }
    }

    pub fn monitor(&self) -> Arc<RefreshMonitor> {
        self.monitor.clone()
    }

    /// Fetch once and publish the result. Returns the number of records in
    /// the new snapshot; on error the store is left untouched.
    pub async fn refresh_once(&self) -> Result<usize, FeedError> {
        let started = Utc::now();

        let fetched = match tokio::time::timeout(self.timeout, self.source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(FeedError::Timeout(self.timeout)),
        };

        match fetched {
            Ok(events) => {
                let quakes = normalize(events);
                let count = quakes.len();
                let now = Utc::now();
                self.store.replace(Snapshot::new(quakes, now));
                self.monitor.record_success(now);
                info!("Updated: {} earthquakes fetched", count);
                Ok(count)
            }
            Err(e) => {
                self.monitor.record_failure(started, &e);
                warn!(
                    failures = self.monitor.status().consecutive_failures,
                    "Feed refresh failed, keeping previous snapshot: {}", e
                );
                Err(e)
            }
        }
    }

    /// Spawn the periodic loop. The first tick fires one interval from now;
    /// callers run [`Refresher::refresh_once`] beforehand for the initial fill.
    pub fn start(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Periodic loop until `shutdown` fires. The fetch is awaited inline, so
    /// at most one is ever outstanding; ticks missed meanwhile are skipped.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Refresher started (interval={:?}, timeout={:?})", self.interval, self.timeout);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        // Failures are logged and recorded inside refresh_once
                        _ = self.refresh_once() => {}
                    }
                }
            }
        }

        info!("Refresher shutting down");
    }
}
