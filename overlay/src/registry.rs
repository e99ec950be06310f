use std::collections::{BTreeMap, HashMap};

use nws::AlertRecord;
use spc::OutlookPolygon;

use crate::reconcile::{IdSet, ReconcilePlan};
use crate::surface::{PolygonSpec, RenderSurface};
use crate::ApplyError;

/// Prefix of every outlook key, keeping outlooks out of the alert id space
pub const OUTLOOK_KEY_PREFIX: &str = "outlook:";

/// What a drawn polygon represents
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    Alert(AlertRecord),
    Outlook(OutlookPolygon),
}

impl Overlay {
    pub fn as_alert(&self) -> Option<&AlertRecord> {
        match self {
            Overlay::Alert(record) => Some(record),
            Overlay::Outlook(_) => None,
        }
    }
}

/// One drawn polygon and the surface handle that owns it
#[derive(Debug)]
pub struct OverlayEntry<H> {
    pub overlay: Overlay,
    handle: H,
}

impl<H> OverlayEntry<H> {
    pub fn handle(&self) -> &H {
        &self.handle
    }
}

/// Outcome of applying one plan (or one outlook refresh)
#[derive(Debug, Default, PartialEq)]
pub struct ApplyReport {
    pub drawn: usize,
    pub text_only: usize,
    pub removed: usize,
    /// Adds for ids that were already present
    pub skipped: usize,
    pub failures: Vec<ApplyError>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Called with the record of a clicked alert
pub type SelectHook = Box<dyn FnMut(&AlertRecord)>;

/// What the polling loop needs from the render side
pub trait AlertLayer {
    fn current_ids(&mut self) -> IdSet;

    fn apply(&mut self, plan: ReconcilePlan) -> ApplyReport;
}

/// Sole owner of every visual object on a surface.
///
/// Lives on the render thread. Alerts are keyed by their remote id; outlooks
/// by `outlook:{label}:{n}` and are only ever replaced wholesale.
pub struct OverlayRegistry<S: RenderSurface> {
    surface: S,
    alerts: HashMap<String, OverlayEntry<S::Handle>>,
    text_only: BTreeMap<String, AlertRecord>,
    outlooks: BTreeMap<String, OverlayEntry<S::Handle>>,
    on_select: Option<SelectHook>,
}

impl<S: RenderSurface> OverlayRegistry<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            alerts: HashMap::new(),
            text_only: BTreeMap::new(),
            outlooks: BTreeMap::new(),
            on_select: None,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn set_on_select(&mut self, hook: impl FnMut(&AlertRecord) + 'static) {
        self.on_select = Some(Box::new(hook));
    }

    /// Drawn alerts
    pub fn alerts(&self) -> impl Iterator<Item = &AlertRecord> {
        self.alerts.values().filter_map(|entry| entry.overlay.as_alert())
    }

    /// Alerts kept without a polygon
    pub fn text_only_alerts(&self) -> impl Iterator<Item = &AlertRecord> {
        self.text_only.values()
    }

    pub fn outlooks(&self) -> impl Iterator<Item = &OverlayEntry<S::Handle>> {
        self.outlooks.values()
    }

    pub fn get(&self, key: &str) -> Option<&OverlayEntry<S::Handle>> {
        self.alerts.get(key).or_else(|| self.outlooks.get(key))
    }

    /// Number of drawn alerts
    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn text_only_len(&self) -> usize {
        self.text_only.len()
    }

    pub fn outlook_len(&self) -> usize {
        self.outlooks.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.alerts.contains_key(id) || self.text_only.contains_key(id)
    }

    /// Forget entries whose polygons the surface no longer shows
    fn sync_with_surface(&mut self) {
        let on_surface = self.surface.overlay_ids();

        let before = self.alerts.len() + self.outlooks.len();
        self.alerts.retain(|key, _| on_surface.contains(key));
        self.outlooks.retain(|key, _| on_surface.contains(key));

        let dropped = before - self.alerts.len() - self.outlooks.len();
        if dropped > 0 {
            debug!("Dropped {} entries cleared from the surface", dropped);
        }
    }

    /// Ids of every tracked alert, drawn or text-only
    pub fn current_ids(&mut self) -> IdSet {
        self.sync_with_surface();
        self.alerts.keys().chain(self.text_only.keys()).cloned().collect()
    }

    /// Carry out a reconcile plan: adds first, then removes.
    ///
    /// Failures do not stop the rest of the plan. A failed draw leaves no
    /// entry; a failed delete keeps its entry so the next cycle retries.
    pub fn apply(&mut self, plan: ReconcilePlan) -> ApplyReport {
        let mut report = ApplyReport::default();

        for record in plan.to_add {
            if self.contains(&record.id) {
                report.skipped += 1;
                continue;
            }

            let Some(spec) = PolygonSpec::for_alert(&record) else {
                debug!("Tracking {} ({}) without a polygon", record.id, record.kind);
                self.text_only.insert(record.id.clone(), record);
                report.text_only += 1;
                continue;
            };

            match self.surface.draw_polygon(&spec) {
                Ok(handle) => {
                    self.alerts.insert(
                        record.id.clone(),
                        OverlayEntry {
                            overlay: Overlay::Alert(record),
                            handle,
                        },
                    );
                    report.drawn += 1;
                }
                Err(source) => report.failures.push(ApplyError::Draw { id: record.id, source }),
            }
        }

        for id in plan.to_remove {
            if let Some(entry) = self.alerts.remove(&id) {
                match self.surface.delete(&entry.handle) {
                    Ok(()) => report.removed += 1,
                    Err(source) => {
                        self.alerts.insert(id.clone(), entry);
                        report.failures.push(ApplyError::Delete { id, source });
                    }
                }
            } else if self.text_only.remove(&id).is_some() {
                report.removed += 1;
            }
        }

        for failure in &report.failures {
            warn!("{}", failure);
        }

        report
    }

    /// Forward a click on `key` to the select hook when it is a drawn alert
    pub fn handle_click(&mut self, key: &str) -> bool {
        let Some(record) = self.alerts.get(key).and_then(|entry| entry.overlay.as_alert()) else {
            return false;
        };

        match self.on_select.as_mut() {
            Some(hook) => {
                hook(record);
                true
            }
            None => false,
        }
    }

    /// Remove every outlook polygon and draw a new set
    pub fn replace_outlooks(&mut self, outlooks: Vec<OutlookPolygon>) -> ApplyReport {
        let mut report = ApplyReport::default();
        self.clear_outlooks_into(&mut report);

        let mut counters: HashMap<String, usize> = HashMap::new();
        for outlook in outlooks {
            let n = counters.entry(outlook.label.clone()).or_insert(0);
            let mut key = format!("{}{}:{}", OUTLOOK_KEY_PREFIX, outlook.label, n);
            // Skip keys still held by polygons that refused to be deleted
            while self.outlooks.contains_key(&key) {
                *n += 1;
                key = format!("{}{}:{}", OUTLOOK_KEY_PREFIX, outlook.label, n);
            }
            *n += 1;

            let spec = PolygonSpec::for_outlook(key.clone(), &outlook);
            match self.surface.draw_polygon(&spec) {
                Ok(handle) => {
                    self.outlooks.insert(
                        key,
                        OverlayEntry {
                            overlay: Overlay::Outlook(outlook),
                            handle,
                        },
                    );
                    report.drawn += 1;
                }
                Err(source) => report.failures.push(ApplyError::Draw { id: key, source }),
            }
        }

        for failure in &report.failures {
            warn!("{}", failure);
        }
        info!("Drew {} outlook polygons", report.drawn);

        report
    }

    /// Remove every outlook polygon, returning how many were removed
    pub fn clear_outlooks(&mut self) -> usize {
        let mut report = ApplyReport::default();
        self.clear_outlooks_into(&mut report);
        for failure in &report.failures {
            warn!("{}", failure);
        }
        report.removed
    }

    fn clear_outlooks_into(&mut self, report: &mut ApplyReport) {
        for (key, entry) in std::mem::take(&mut self.outlooks) {
            match self.surface.delete(&entry.handle) {
                Ok(()) => report.removed += 1,
                Err(source) => {
                    report.failures.push(ApplyError::Delete { id: key.clone(), source });
                    self.outlooks.insert(key, entry);
                }
            }
        }
    }

    /// Remove every alert. They return on the next poll while still active.
    pub fn clear_alerts(&mut self) -> usize {
        let mut removed = self.text_only.len();
        self.text_only.clear();

        for (id, entry) in std::mem::take(&mut self.alerts) {
            match self.surface.delete(&entry.handle) {
                Ok(()) => removed += 1,
                Err(source) => warn!("{}", ApplyError::Delete { id, source }),
            }
        }

        info!("Cleared {} alerts", removed);
        removed
    }
}

impl<S: RenderSurface> AlertLayer for OverlayRegistry<S> {
    fn current_ids(&mut self) -> IdSet {
        OverlayRegistry::current_ids(self)
    }

    fn apply(&mut self, plan: ReconcilePlan) -> ApplyReport {
        OverlayRegistry::apply(self, plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;
    use crate::SurfaceError;
    use nws::AlertKind;
    use serde_json::Value;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    /// MemorySurface that can be told to refuse specific keys
    #[derive(Default)]
    struct FlakySurface {
        inner: MemorySurface,
        refuse_draw: HashSet<String>,
        refuse_delete: HashSet<String>,
    }

    impl RenderSurface for FlakySurface {
        type Handle = String;

        fn draw_polygon(&mut self, spec: &PolygonSpec) -> Result<String, SurfaceError> {
            if self.refuse_draw.contains(&spec.key) {
                return Err(SurfaceError::new("draw refused"));
            }
            self.inner.draw_polygon(spec)
        }

        fn delete(&mut self, handle: &String) -> Result<(), SurfaceError> {
            if self.refuse_delete.contains(handle) {
                return Err(SurfaceError::new("delete refused"));
            }
            self.inner.delete(handle)
        }

        fn overlay_ids(&self) -> HashSet<String> {
            self.inner.overlay_ids()
        }
    }

    fn record(id: &str, kind: AlertKind) -> AlertRecord {
        AlertRecord {
            id: id.to_string(),
            kind,
            code: None,
            geometry: Some(vec![(30.0, -90.0), (30.5, -90.5), (30.0, -91.0), (30.0, -90.0)]),
            time_sent: None,
            time_effective: None,
            time_onset: None,
            time_expires: None,
            description: String::new(),
            headline: format!("{} headline", id),
            sender: String::new(),
            parameters: Value::Null,
        }
    }

    fn add(records: Vec<AlertRecord>) -> ReconcilePlan {
        ReconcilePlan {
            to_add: records,
            to_remove: vec![],
        }
    }

    fn remove(ids: &[&str]) -> ReconcilePlan {
        ReconcilePlan {
            to_add: vec![],
            to_remove: ids.iter().map(|id| id.to_string()).collect(),
        }
    }

    fn outlook(label: &str) -> OutlookPolygon {
        OutlookPolygon {
            label: label.to_string(),
            name: None,
            vertices: vec![(35.0, -100.0), (36.0, -99.0), (35.0, -98.0)],
            valid: None,
            expire: None,
            issue: None,
            stroke: Some("#DDAA00".to_string()),
            fill: None,
        }
    }

    #[test]
    fn test_one_entry_per_id() {
        let mut registry = OverlayRegistry::new(MemorySurface::new());
        let report = registry.apply(add(vec![record("a", AlertKind::TornadoWarning)]));
        assert_eq!(report.drawn, 1);

        let report = registry.apply(add(vec![record("a", AlertKind::TornadoWarning)]));
        assert_eq!(report.skipped, 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.surface().len(), 1);
    }

    #[test]
    fn test_text_only_alerts_tracked() {
        let mut registry = OverlayRegistry::new(MemorySurface::new());
        let mut no_polygon = record("t", AlertKind::SpecialWeatherStatement);
        no_polygon.geometry = None;

        let report = registry.apply(add(vec![no_polygon, record("u", AlertKind::Other("Heat Advisory".into()))]));
        assert_eq!(report.text_only, 2);
        assert!(registry.surface().is_empty());
        assert_eq!(registry.current_ids(), ["t", "u"].iter().map(|s| s.to_string()).collect::<IdSet>());

        let report = registry.apply(remove(&["t"]));
        assert_eq!(report.removed, 1);
        assert_eq!(registry.text_only_len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry = OverlayRegistry::new(MemorySurface::new());
        registry.apply(add(vec![record("a", AlertKind::FloodWatch)]));

        assert_eq!(registry.apply(remove(&["a"])).removed, 1);
        let report = registry.apply(remove(&["a", "never-seen"]));
        assert_eq!(report, ApplyReport::default());
    }

    #[test]
    fn test_failed_draw_leaves_no_entry() {
        let mut surface = FlakySurface::default();
        surface.refuse_draw.insert("bad".to_string());
        let mut registry = OverlayRegistry::new(surface);

        let report = registry.apply(add(vec![record("bad", AlertKind::TornadoWarning), record("good", AlertKind::FloodWatch)]));
        assert_eq!(report.drawn, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id(), "bad");
        assert!(!registry.current_ids().contains("bad"));

        // Surface recovers; the next cycle offers the id again
        registry.surface_mut().refuse_draw.clear();
        let report = registry.apply(add(vec![record("bad", AlertKind::TornadoWarning)]));
        assert_eq!(report.drawn, 1);
        assert!(registry.current_ids().contains("bad"));
    }

    #[test]
    fn test_failed_delete_keeps_entry() {
        let mut registry = OverlayRegistry::new(FlakySurface::default());
        registry.apply(add(vec![record("a", AlertKind::TornadoWarning)]));
        registry.surface_mut().refuse_delete.insert("a".to_string());

        let report = registry.apply(remove(&["a"]));
        assert!(matches!(report.failures.as_slice(), [ApplyError::Delete { id, .. }] if id == "a"));
        assert!(registry.current_ids().contains("a"));

        registry.surface_mut().refuse_delete.clear();
        assert_eq!(registry.apply(remove(&["a"])).removed, 1);
        assert!(registry.current_ids().is_empty());
    }

    #[test]
    fn test_external_clear_is_synced() {
        let mut registry = OverlayRegistry::new(MemorySurface::new());
        registry.apply(add(vec![record("a", AlertKind::TornadoWarning), record("b", AlertKind::FloodWatch)]));
        registry.replace_outlooks(vec![outlook("SLGT")]);

        registry.surface_mut().clear();
        assert!(registry.current_ids().is_empty());
        assert_eq!(registry.outlook_len(), 0);
    }

    #[test]
    fn test_click_invokes_hook() {
        let selected = Rc::new(RefCell::new(Vec::new()));
        let mut registry = OverlayRegistry::new(MemorySurface::new());
        let sink = selected.clone();
        registry.set_on_select(move |record| sink.borrow_mut().push(record.headline.clone()));

        registry.apply(add(vec![record("a", AlertKind::TornadoWarning)]));
        registry.replace_outlooks(vec![outlook("SLGT")]);

        assert!(registry.handle_click("a"));
        assert!(!registry.handle_click("outlook:SLGT:0"));
        assert!(!registry.handle_click("missing"));
        assert_eq!(*selected.borrow(), vec!["a headline".to_string()]);
    }

    #[test]
    fn test_outlooks_keyed_separately() {
        let mut registry = OverlayRegistry::new(MemorySurface::new());
        registry.apply(add(vec![record("a", AlertKind::TornadoWarning)]));

        let report = registry.replace_outlooks(vec![outlook("SLGT"), outlook("SLGT"), outlook("MRGL")]);
        assert_eq!(report.drawn, 3);
        assert!(registry.get("outlook:SLGT:0").is_some());
        assert!(registry.get("outlook:SLGT:1").is_some());
        assert!(registry.get("outlook:MRGL:0").is_some());
        assert_eq!(registry.current_ids().len(), 1);

        let report = registry.replace_outlooks(vec![outlook("ENH")]);
        assert_eq!((report.removed, report.drawn), (3, 1));
        assert_eq!(registry.surface().len(), 2);

        assert_eq!(registry.clear_outlooks(), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.surface().len(), 1);
    }

    #[test]
    fn test_clear_alerts() {
        let mut registry = OverlayRegistry::new(MemorySurface::new());
        let mut text_only = record("t", AlertKind::FloodWatch);
        text_only.geometry = None;
        registry.apply(add(vec![record("a", AlertKind::TornadoWarning), text_only]));
        registry.replace_outlooks(vec![outlook("SLGT")]);

        assert_eq!(registry.clear_alerts(), 2);
        assert!(registry.current_ids().is_empty());
        assert_eq!(registry.outlook_len(), 1);
    }
}
