//! Broadcast hub for pushing snapshots to stream subscribers
//!
//! Every subscriber owns a small bounded channel. On each tick the hub reads
//! the store once, serializes once, and offers the same payload to every
//! channel with `try_send`. A subscriber whose channel is closed or still full
//! from earlier ticks is dropped on the spot, so a slow client can never hold
//! up the others or the next tick.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::Stream;
use serde::Serialize;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::BroadcastConfig;
use crate::model::{Earthquake, Snapshot};
use crate::store::SharedStore;

/// Serialized stream event body, shared by all subscribers of one tick
pub type Payload = Arc<str>;

#[derive(Serialize)]
struct StreamPayload<'a> {
    earthquakes: &'a [Earthquake],
    count: usize,
    timestamp: DateTime<Utc>,
}

/// Encode a snapshot as a stream event body stamped with the emission time
pub fn encode_payload(snapshot: &Snapshot, timestamp: DateTime<Utc>) -> serde_json::Result<Payload> {
    let body = serde_json::to_string(&StreamPayload {
        earthquakes: snapshot.earthquakes(),
        count: snapshot.len(),
        timestamp,
    })?;
    Ok(body.into())
}

pub struct BroadcastHub {
    store: SharedStore,
    subscribers: DashMap<Uuid, mpsc::Sender<Payload>>,
    buffer: usize,
    interval: Duration,
}

/// Thread-safe hub handle
pub type SharedHub = Arc<BroadcastHub>;

impl BroadcastHub {
    pub fn new(store: SharedStore, config: &BroadcastConfig) -> Self {
        Self::with_timing(store, config.interval(), config.subscriber_buffer)
    }

    pub fn with_timing(store: SharedStore, interval: Duration, buffer: usize) -> Self {
        Self {
            store,
            subscribers: DashMap::new(),
            buffer: buffer.max(1),
            interval,
        }
    }

    /// Register a new subscriber. Dropping the returned handle unsubscribes it.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.buffer);
        self.subscribers.insert(id, tx);
        debug!("Subscriber {} connected ({} total)", id, self.subscribers.len());

        Subscription {
            id,
            rx,
            hub: Arc::downgrade(self),
        }
    }

    /// Remove a subscriber. Returns whether it was still registered.
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            debug!("Subscriber {} disconnected ({} remaining)", id, self.subscribers.len());
        }
        removed
    }

    pub fn is_subscribed(&self, id: Uuid) -> bool {
        self.subscribers.contains_key(&id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver the current snapshot to every subscriber once. Returns the
    /// number of subscribers the payload was queued for.
    pub fn tick(&self) -> usize {
        if self.subscribers.is_empty() {
            return 0;
        }

        let snapshot = self.store.current();
        let payload = match encode_payload(&snapshot, Utc::now()) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode stream payload: {}", e);
                return 0;
            }
        };

        let mut delivered = 0;
        let mut dropped = Vec::new();
        for entry in self.subscribers.iter() {
            match entry.value().try_send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    debug!("Subscriber {} is not keeping up, dropping it", entry.key());
                    dropped.push(*entry.key());
                }
                Err(TrySendError::Closed(_)) => dropped.push(*entry.key()),
            }
        }

        // Removal happens after iteration; DashMap shards are still locked inside iter()
        for id in dropped {
            self.unsubscribe(id);
        }

        delivered
    }

    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Tick on the broadcast interval until `shutdown` fires
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Broadcast hub started (interval={:?}, buffer={})", self.interval, self.buffer);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let delivered = self.tick();
                    if delivered > 0 {
                        debug!("Broadcast snapshot to {} subscribers", delivered);
                    }
                }
            }
        }

        // Closing every sender ends the open streams
        self.subscribers.clear();
        info!("Broadcast hub shutting down");
    }
}

/// One connected stream client.
///
/// Yields payloads as a [`Stream`]; ends when the hub drops the subscriber or
/// shuts down.
pub struct Subscription {
    id: Uuid,
    rx: mpsc::Receiver<Payload>,
    hub: Weak<BroadcastHub>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn recv(&mut self) -> Option<Payload> {
        self.rx.recv().await
    }
}

impl Stream for Subscription {
    type Item = Payload;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Payload>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}
