//! Upstream seismic feed client
//!
//! Fetches the USGS GeoJSON summary feed and turns each feature into a
//! [`RawEvent`]. Normalization into [`Earthquake`] records happens in
//! [`normalize`], which drops individual malformed events without failing the
//! whole fetch.

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::model::Earthquake;

/// One event as delivered by the upstream feed, before validation
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub id: String,
    pub magnitude: Option<f64>,
    pub place: String,
    /// Epoch milliseconds
    pub time_ms: Option<i64>,
    pub url: String,
    pub alert: Option<String>,
    /// `[longitude, latitude, depth]`
    pub coordinates: Vec<f64>,
}

/// Source of feed snapshots. The refresher only ever sees this trait, so tests
/// can swap in scripted sources.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RawEvent>, FeedError>;
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    // Kept untyped so one malformed feature cannot fail the whole collection
    features: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    properties: Option<Properties>,
    #[serde(default)]
    geometry: Option<Geometry>,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    #[serde(default)]
    mag: Option<f64>,
    #[serde(default)]
    place: Option<String>,
    #[serde(default)]
    time: Option<i64>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    alert: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(default)]
    coordinates: Option<Vec<Option<f64>>>,
}

impl From<Feature> for RawEvent {
    fn from(feature: Feature) -> Self {
        let props = feature.properties.unwrap_or_default();
        // A null coordinate leaves the list empty, which fails the triple check later
        let coordinates = feature
            .geometry
            .and_then(|g| g.coordinates)
            .and_then(|c| c.into_iter().collect::<Option<Vec<f64>>>())
            .unwrap_or_default();

        Self {
            id: feature.id.unwrap_or_default(),
            magnitude: props.mag,
            place: props.place.unwrap_or_default(),
            time_ms: props.time,
            url: props.url.unwrap_or_default(),
            alert: props.alert,
            coordinates,
        }
    }
}

/// Decode a GeoJSON feature collection body. Only a body that is not a
/// feature collection is an error; a feature whose fields have the wrong
/// JSON types is skipped on its own.
pub fn decode_feed(body: &[u8]) -> Result<Vec<RawEvent>, FeedError> {
    let collection: FeatureCollection =
        serde_json::from_slice(body).map_err(|e| FeedError::Decode(e.to_string()))?;

    let events = collection
        .features
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Feature>(value) {
            Ok(feature) => Some(RawEvent::from(feature)),
            Err(e) => {
                debug!("Skipping undecodable feed feature: {}", e);
                None
            }
        })
        .collect();

    Ok(events)
}

impl RawEvent {
    /// Validate and convert into a record. Returns `None` for events with a
    /// missing or non-positive magnitude, a missing or out-of-range time, or
    /// coordinates that are not exactly a longitude/latitude/depth triple.
    pub fn into_earthquake(self) -> Option<Earthquake> {
        let magnitude = self.magnitude.filter(|m| *m > 0.0)?;
        let [longitude, latitude, depth_km] = <[f64; 3]>::try_from(self.coordinates).ok()?;
        // Integer division truncates to whole seconds
        let occurred_at = DateTime::from_timestamp(self.time_ms? / 1000, 0)?;

        Some(Earthquake {
            id: self.id,
            magnitude,
            place: self.place,
            occurred_at,
            latitude,
            longitude,
            depth_km,
            detail_url: self.url,
            alert_level: self.alert.unwrap_or_default(),
        })
    }
}

/// Normalize raw events into records, keeping upstream order
pub fn normalize(events: Vec<RawEvent>) -> Vec<Earthquake> {
    let total = events.len();
    let quakes: Vec<Earthquake> = events
        .into_iter()
        .filter_map(|event| {
            let id = event.id.clone();
            let quake = event.into_earthquake();
            if quake.is_none() {
                debug!("Skipping feed event {}: missing or invalid fields", id);
            }
            quake
        })
        .collect();

    if quakes.len() < total {
        debug!("Normalized {} of {} feed events", quakes.len(), total);
    }
    quakes
}

/// HTTP client for the USGS summary feed
pub struct UsgsFeed {
    http: Client,
    url: String,
}

impl UsgsFeed {
    pub fn new(config: &FeedConfig) -> Result<Self, FeedError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| FeedError::Request(e.to_string()))?;

        info!("Feed client configured for {}", config.url);
        Ok(Self {
            http,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl FeedSource for UsgsFeed {
    async fn fetch(&self) -> Result<Vec<RawEvent>, FeedError> {
        debug!("Fetching feed from {}", self.url);

        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FeedError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FeedError::Status(response.status().as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FeedError::Request(e.to_string()))?;

        decode_feed(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, magnitude: Option<f64>, coordinates: Vec<f64>) -> RawEvent {
        RawEvent {
            id: id.to_string(),
            magnitude,
            place: "Somewhere".to_string(),
            time_ms: Some(1_700_000_000_999),
            url: format!("https://example.test/{id}"),
            alert: None,
            coordinates,
        }
    }

    #[test]
    fn drops_non_positive_magnitude() {
        let events = vec![
            raw("zero", Some(0.0), vec![1.0, 2.0, 3.0]),
            raw("real", Some(4.2), vec![1.0, 2.0, 3.0]),
        ];

        let quakes = normalize(events);
        assert_eq!(quakes.len(), 1);
        assert_eq!(quakes[0].id, "real");
        assert_eq!(quakes[0].magnitude, 4.2);
    }

    #[test]
    fn drops_missing_or_nan_magnitude() {
        let events = vec![
            raw("missing", None, vec![1.0, 2.0, 3.0]),
            raw("nan", Some(f64::NAN), vec![1.0, 2.0, 3.0]),
            raw("negative", Some(-1.2), vec![1.0, 2.0, 3.0]),
        ];
        assert!(normalize(events).is_empty());
    }

    #[test]
    fn drops_only_records_with_bad_coordinates() {
        let events = vec![
            raw("short", Some(3.0), vec![1.0, 2.0]),
            raw("long", Some(3.0), vec![1.0, 2.0, 3.0, 4.0]),
            raw("ok", Some(3.0), vec![10.0, 20.0, 30.0]),
        ];

        let quakes = normalize(events);
        assert_eq!(quakes.len(), 1);
        assert_eq!(quakes[0].longitude, 10.0);
        assert_eq!(quakes[0].latitude, 20.0);
        assert_eq!(quakes[0].depth_km, 30.0);
    }

    #[test]
    fn truncates_time_to_seconds_and_defaults_alert() {
        let quake = raw("t", Some(2.5), vec![0.0, 0.0, 5.0])
            .into_earthquake()
            .unwrap();
        assert_eq!(quake.occurred_at.timestamp(), 1_700_000_000);
        assert_eq!(quake.occurred_at.timestamp_subsec_nanos(), 0);
        assert_eq!(quake.alert_level, "");
    }

    #[test]
    fn keeps_alert_level() {
        let mut event = raw("a", Some(6.1), vec![0.0, 0.0, 5.0]);
        event.alert = Some("yellow".to_string());
        assert_eq!(event.into_earthquake().unwrap().alert_level, "yellow");
    }

    #[test]
    fn decodes_geojson_with_nulls() {
        let body = br#"{
            "type": "FeatureCollection",
            "metadata": {"count": 2},
            "features": [
                {
                    "type": "Feature",
                    "id": "ak0001",
                    "properties": {"mag": 1.7, "place": "5 km E of Town", "time": 1700000000123,
                                   "url": "https://earthquake.usgs.gov/ak0001", "alert": null},
                    "geometry": {"type": "Point", "coordinates": [-150.1, 61.2, 35.4]}
                },
                {
                    "type": "Feature",
                    "id": "ci0002",
                    "properties": {"mag": null, "place": null, "time": 1700000000456, "url": null},
                    "geometry": null
                }
            ]
        }"#;

        let events = decode_feed(body).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].magnitude, Some(1.7));
        assert_eq!(events[0].coordinates, vec![-150.1, 61.2, 35.4]);
        assert_eq!(events[1].magnitude, None);
        assert!(events[1].coordinates.is_empty());

        let quakes = normalize(events);
        assert_eq!(quakes.len(), 1);
        assert_eq!(quakes[0].place, "5 km E of Town");
    }

    #[test]
    fn malformed_feature_does_not_fail_the_fetch() {
        let good = r#"{"type": "Feature", "id": "good",
            "properties": {"mag": 4.2, "place": "Here", "time": 1700000000000},
            "geometry": {"type": "Point", "coordinates": [10, 20, 30]}}"#;
        let malformed = [
            r#"{"id": "nullcoord", "properties": {"mag": 3.1, "time": 1700000000000},
                "geometry": {"coordinates": [10, 20, null]}}"#,
            r#"{"id": "noprops", "geometry": {"coordinates": [10, 20, 30]}}"#,
            r#"{"id": null, "properties": {"mag": 3.1, "time": 1700000000000},
                "geometry": {"coordinates": [1, 2, 3]}}"#,
            r#"{"id": "badmag", "properties": {"mag": "strong", "time": 1700000000000},
                "geometry": {"coordinates": [1, 2, 3]}}"#,
            r#"{"id": "nullprops", "properties": null, "geometry": null}"#,
        ];

        for bad in malformed {
            let body = format!(r#"{{"type": "FeatureCollection", "features": [{good}, {bad}]}}"#);
            let events = decode_feed(body.as_bytes())
                .unwrap_or_else(|e| panic!("fetch failed for {bad}: {e}"));

            let quakes = normalize(events);
            assert!(
                quakes.iter().any(|q| q.id == "good" && q.magnitude == 4.2),
                "good record lost next to {bad}"
            );
        }
    }

    #[test]
    fn null_coordinate_and_missing_properties_drop_the_record() {
        let body = br#"{"type": "FeatureCollection", "features": [
            {"id": "nullcoord", "properties": {"mag": 3.1, "time": 1700000000000},
             "geometry": {"coordinates": [10, 20, null]}},
            {"id": "noprops", "geometry": {"coordinates": [10, 20, 30]}}
        ]}"#;

        let events = decode_feed(body).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].coordinates.is_empty());
        assert_eq!(events[1].magnitude, None);
        assert!(normalize(events).is_empty());
    }

    #[test]
    fn null_id_keeps_the_record() {
        let body = br#"{"type": "FeatureCollection", "features": [
            {"id": null, "properties": {"mag": 3.1, "time": 1700000000000},
             "geometry": {"coordinates": [1, 2, 3]}}
        ]}"#;

        let quakes = normalize(decode_feed(body).unwrap());
        assert_eq!(quakes.len(), 1);
        assert_eq!(quakes[0].id, "");
    }

    #[test]
    fn rejects_malformed_payload() {
        let err = decode_feed(b"<html>maintenance</html>").unwrap_err();
        assert!(matches!(err, FeedError::Decode(_)));

        let err = decode_feed(br#"{"type": "FeatureCollection"}"#).unwrap_err();
        assert!(matches!(err, FeedError::Decode(_)));
    }
}
