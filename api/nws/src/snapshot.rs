use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;

use crate::{AlertRecord, FeatureParseError, FetchError};

/// The complete set of active alerts from one poll, in feed order.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    records: Vec<AlertRecord>,
    fetched_at: DateTime<Utc>,
}

/// Result of parsing a collection: the usable snapshot plus what was dropped
#[derive(Debug)]
pub struct ParsedSnapshot {
    pub snapshot: Snapshot,
    pub skipped: Vec<FeatureParseError>,
}

impl Snapshot {
    /// Build a snapshot, keeping the first record seen for each id.
    ///
    /// Later duplicates are returned as `DuplicateId` errors.
    pub fn from_records(records: Vec<AlertRecord>, fetched_at: DateTime<Utc>) -> (Self, Vec<FeatureParseError>) {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(records.len());
        let mut duplicates = Vec::new();

        for record in records {
            if seen.insert(record.id.clone()) {
                kept.push(record);
            } else {
                duplicates.push(FeatureParseError::DuplicateId(record.id));
            }
        }

        (Self { records: kept, fetched_at }, duplicates)
    }

    /// An empty snapshot, as returned when no alerts are active
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            fetched_at: Utc::now(),
        }
    }

    pub fn records(&self) -> &[AlertRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<AlertRecord> {
        self.records
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&AlertRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|record| record.id.as_str())
    }

    /// Alerts that can be drawn on the map
    pub fn with_geometry(&self) -> impl Iterator<Item = &AlertRecord> {
        self.records.iter().filter(|record| record.has_geometry())
    }

    /// Text-only advisories
    pub fn without_geometry(&self) -> impl Iterator<Item = &AlertRecord> {
        self.records.iter().filter(|record| !record.has_geometry())
    }
}

/// Parse an active-alerts feature collection.
///
/// Only a body that is not a collection at all fails the whole parse; bad
/// individual features are dropped and reported in `skipped`.
pub fn parse_snapshot(body: &[u8]) -> Result<ParsedSnapshot, FetchError> {
    let document: Value = serde_json::from_slice(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    let features = match document {
        Value::Object(mut map) => match map.remove("features") {
            Some(Value::Array(features)) => features,
            Some(_) => return Err(FetchError::Parse("'features' is not an array".to_string())),
            None => return Err(FetchError::Parse("missing 'features'".to_string())),
        },
        _ => return Err(FetchError::Parse("document is not an object".to_string())),
    };

    let mut records = Vec::with_capacity(features.len());
    let mut skipped = Vec::new();

    for feature in features {
        match AlertRecord::from_feature(feature) {
            Ok(record) => records.push(record),
            Err(e) => skipped.push(e),
        }
    }

    let (snapshot, duplicates) = Snapshot::from_records(records, Utc::now());
    skipped.extend(duplicates);

    Ok(ParsedSnapshot { snapshot, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature(id: &str, event: &str) -> Value {
        json!({
            "id": id,
            "type": "Feature",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[-90.0, 30.0], [-90.5, 30.5], [-91.0, 30.0], [-90.0, 30.0]]]
            },
            "properties": { "event": event, "headline": format!("{} headline", event) }
        })
    }

    fn body(features: Vec<Value>) -> Vec<u8> {
        serde_json::to_vec(&json!({ "type": "FeatureCollection", "features": features })).unwrap()
    }

    #[test]
    fn test_parse_collection() {
        let parsed = parse_snapshot(&body(vec![
            feature("a", "Tornado Warning"),
            feature("b", "Flood Watch"),
        ]))
        .unwrap();

        assert!(parsed.skipped.is_empty());
        assert_eq!(parsed.snapshot.len(), 2);
        assert_eq!(parsed.snapshot.ids().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_bad_feature_does_not_abort() {
        let parsed = parse_snapshot(&body(vec![
            feature("a", "Tornado Warning"),
            json!({ "id": "broken", "properties": {} }),
            json!("not even an object"),
            feature("c", "Flood Watch"),
        ]))
        .unwrap();

        assert_eq!(parsed.snapshot.ids().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(parsed.skipped.len(), 2);
        assert_eq!(parsed.skipped[0].id(), Some("broken"));
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let mut second = feature("a", "Flood Watch");
        second["properties"]["headline"] = json!("second copy");
        let parsed = parse_snapshot(&body(vec![feature("a", "Tornado Warning"), second])).unwrap();

        assert_eq!(parsed.snapshot.len(), 1);
        assert_eq!(parsed.snapshot.get("a").unwrap().headline, "Tornado Warning headline");
        assert_eq!(parsed.skipped, vec![FeatureParseError::DuplicateId("a".to_string())]);
    }

    #[test]
    fn test_empty_collection_is_valid() {
        let parsed = parse_snapshot(&body(vec![])).unwrap();
        assert!(parsed.snapshot.is_empty());
        assert!(parsed.skipped.is_empty());
    }

    #[test]
    fn test_not_a_collection_is_fetch_error() {
        assert!(matches!(parse_snapshot(b"<html>502 Bad Gateway</html>"), Err(FetchError::Parse(_))));
        assert!(matches!(parse_snapshot(b"[1, 2, 3]"), Err(FetchError::Parse(_))));
        assert!(matches!(parse_snapshot(br#"{"features": 7}"#), Err(FetchError::Parse(_))));
        assert!(matches!(parse_snapshot(br#"{"type": "FeatureCollection"}"#), Err(FetchError::Parse(_))));
    }

    #[test]
    fn test_geometry_split() {
        let mut text_only = feature("t", "Special Weather Statement");
        text_only["geometry"] = Value::Null;
        let parsed = parse_snapshot(&body(vec![feature("a", "Tornado Warning"), text_only])).unwrap();

        assert_eq!(parsed.snapshot.with_geometry().count(), 1);
        assert_eq!(parsed.snapshot.without_geometry().next().unwrap().id, "t");
    }
}
