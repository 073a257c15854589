//! Earthquake records and the snapshot that groups them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One seismic event as served to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Earthquake {
    pub id: String,
    pub magnitude: f64,
    pub place: String,
    /// Event origin time, whole seconds
    #[serde(rename = "time")]
    pub occurred_at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Depth in kilometers
    #[serde(rename = "depth")]
    pub depth_km: f64,
    /// Upstream event page, may be empty
    #[serde(rename = "url")]
    pub detail_url: String,
    /// PAGER alert level; empty when no alert was issued
    #[serde(rename = "alert")]
    pub alert_level: String,
}

/// The complete record set as of one successful refresh.
///
/// Records are held behind an `Arc<[_]>` so views and broadcast payloads can
/// share them without copying.
#[derive(Debug, Clone)]
pub struct Snapshot {
    earthquakes: Arc<[Earthquake]>,
    updated_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn new(earthquakes: Vec<Earthquake>, updated_at: DateTime<Utc>) -> Self {
        Self {
            earthquakes: earthquakes.into(),
            updated_at: Some(updated_at),
        }
    }

    /// The state before the first successful fetch
    pub fn empty() -> Self {
        Self {
            earthquakes: Arc::from(Vec::new()),
            updated_at: None,
        }
    }

    pub fn earthquakes(&self) -> &Arc<[Earthquake]> {
        &self.earthquakes
    }

    pub fn len(&self) -> usize {
        self.earthquakes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.earthquakes.is_empty()
    }

    /// `None` until the first successful refresh
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
pub(crate) fn sample_quake(id: &str, magnitude: f64) -> Earthquake {
    Earthquake {
        id: id.to_string(),
        magnitude,
        place: "10 km N of Somewhere".to_string(),
        occurred_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default(),
        latitude: 20.0,
        longitude: 10.0,
        depth_km: 30.0,
        detail_url: String::new(),
        alert_level: String::new(),
    }
}
