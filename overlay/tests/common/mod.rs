#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alert_overlay::{MemorySurface, OverlayRegistry, PolygonSpec, RenderSurface, SnapshotSource, SurfaceError};
use chrono::Utc;
use nws::{AlertRecord, FetchError, Snapshot};
use serde_json::{json, Value};
use tokio::time::Instant;

pub type Registry = OverlayRegistry<RecordingSurface>;

/// An alert record built from a minimal feature
pub fn alert(id: &str, event: &str) -> AlertRecord {
    feature(id, event, json!({
        "type": "Polygon",
        "coordinates": [[[-97.5, 35.4], [-97.3, 35.4], [-97.3, 35.6], [-97.5, 35.4]]]
    }))
}

/// An alert without a polygon
pub fn text_alert(id: &str, event: &str) -> AlertRecord {
    feature(id, event, Value::Null)
}

fn feature(id: &str, event: &str, geometry: Value) -> AlertRecord {
    AlertRecord::from_feature(json!({
        "id": id,
        "type": "Feature",
        "geometry": geometry,
        "properties": { "event": event, "headline": format!("{} headline", event) }
    }))
    .unwrap()
}

pub fn snapshot(records: Vec<AlertRecord>) -> Snapshot {
    let (snapshot, skipped) = Snapshot::from_records(records, Utc::now());
    assert!(skipped.is_empty());
    snapshot
}

/// Plays back a fixed list of fetch results, then fails
#[derive(Clone, Default)]
pub struct ScriptedSource {
    script: Arc<Mutex<VecDeque<Result<Snapshot, FetchError>>>>,
    started: Arc<Mutex<Vec<Instant>>>,
    latency: Duration,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Snapshot, FetchError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            ..Self::default()
        }
    }

    /// Each fetch takes `latency` before answering
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn fetches(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    pub fn fetch_starts(&self) -> Vec<Instant> {
        self.started.lock().unwrap().clone()
    }
}

impl SnapshotSource for ScriptedSource {
    async fn fetch(&self) -> Result<Snapshot, FetchError> {
        self.started.lock().unwrap().push(Instant::now());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(FetchError::Parse("script exhausted".to_string())))
    }
}

/// A memory surface that also remembers the order of every draw
#[derive(Default)]
pub struct RecordingSurface {
    inner: MemorySurface,
    pub draws: Arc<Mutex<Vec<String>>>,
}

impl RecordingSurface {
    pub fn new(draws: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            inner: MemorySurface::new(),
            draws,
        }
    }
}

impl RenderSurface for RecordingSurface {
    type Handle = String;

    fn draw_polygon(&mut self, spec: &PolygonSpec) -> Result<String, SurfaceError> {
        let handle = self.inner.draw_polygon(spec)?;
        self.draws.lock().unwrap().push(spec.key.clone());
        Ok(handle)
    }

    fn delete(&mut self, handle: &String) -> Result<(), SurfaceError> {
        self.inner.delete(handle)
    }

    fn overlay_ids(&self) -> HashSet<String> {
        self.inner.overlay_ids()
    }
}
