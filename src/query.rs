//! Read-only façade over the snapshot store for request/response clients

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::sync::Arc;

use crate::model::Earthquake;
use crate::store::SharedStore;

/// Body of `GET /api/earthquakes`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotView {
    pub earthquakes: Arc<[Earthquake]>,
    pub count: usize,
    /// Zero time until the first successful refresh
    #[serde(serialize_with = "serialize_last_update")]
    pub last_update: Option<DateTime<Utc>>,
}

/// Wire value of `lastUpdate` before any refresh has succeeded
pub const NEVER_UPDATED: &str = "0001-01-01T00:00:00Z";

/// Serialize a snapshot timestamp, using [`NEVER_UPDATED`] for the initial
/// state so clients always receive a timestamp string
pub fn serialize_last_update<S: Serializer>(
    value: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(at) => at.serialize(serializer),
        None => serializer.serialize_str(NEVER_UPDATED),
    }
}

#[derive(Clone)]
pub struct QueryService {
    store: SharedStore,
}

impl QueryService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// The full current record set, never paginated
    pub fn snapshot_view(&self) -> SnapshotView {
        let snapshot = self.store.current();
        SnapshotView {
            earthquakes: snapshot.earthquakes().clone(),
            count: snapshot.len(),
            last_update: snapshot.updated_at(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{sample_quake, Snapshot};
    use crate::store::SnapshotStore;

    #[test]
    fn view_of_empty_store() {
        let query = QueryService::new(Arc::new(SnapshotStore::new()));
        let view = query.snapshot_view();

        assert_eq!(view.count, 0);
        assert!(view.earthquakes.is_empty());

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["earthquakes"], serde_json::json!([]));
        assert_eq!(json["lastUpdate"], NEVER_UPDATED);
    }

    #[test]
    fn view_matches_store_contents() {
        let store = Arc::new(SnapshotStore::new());
        let updated_at = Utc::now();
        store.replace(Snapshot::new(
            vec![sample_quake("a", 1.5), sample_quake("b", 3.5)],
            updated_at,
        ));

        let view = QueryService::new(store).snapshot_view();
        assert_eq!(view.count, 2);
        assert_eq!(view.earthquakes.len(), 2);
        assert_eq!(view.last_update, Some(updated_at));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["count"], 2);
        assert_eq!(json["lastUpdate"], serde_json::to_value(updated_at).unwrap());
        assert_ne!(json["lastUpdate"], NEVER_UPDATED);
    }
}
