//! Quakewatch - live earthquake monitor
//!
//! Periodically pulls the USGS GeoJSON feed into an in-memory snapshot and
//! serves it to many clients at once:
//! - `GET /api/earthquakes` returns the current snapshot
//! - `GET /api/stream` pushes the snapshot as server-sent events
//!
//! The [`refresher::Refresher`] is the only writer of the
//! [`store::SnapshotStore`]; the [`query::QueryService`] and the
//! [`hub::BroadcastHub`] only read it.

pub mod config;
pub mod error;
pub mod feed;
pub mod hub;
pub mod model;
pub mod query;
pub mod refresher;
pub mod store;
pub mod web;
