use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use std::rc::Rc;

use alert_overlay::{Job, Layer, OverlayRegistry, PolygonSpec, QueueClosed, RenderQueue, RenderSurface, Rgb, SurfaceError};
use basemap::{point_in_polygon, MapView};
use slint::{Color, ComponentHandle, Model, ModelRc, VecModel};

use crate::app::status::refresh_status;
use crate::{MainWindow, MapPolygon};

pub type Registry = OverlayRegistry<SlintSurface>;

/// Alpha of alert fills, so the basemap stays readable underneath
const FILL_ALPHA: u8 = 96;

struct RenderState {
    registry: Registry,
    window: slint::Weak<MainWindow>,
}

thread_local! {
    // Only ever set on the slint event loop thread
    static RENDER_STATE: RefCell<Option<RenderState>> = RefCell::new(None);
}

struct Shape {
    /// Outer ring in basemap pixels
    ring: Vec<(f64, f64)>,
    layer: Layer,
    clickable: bool,
}

/// Draws polygons as rows of the `polygons` model shown over the basemap.
///
/// Row order is paint order: outlook rows are kept ahead of alert rows.
pub struct SlintSurface {
    view: MapView,
    model: Rc<VecModel<MapPolygon>>,
    shapes: HashMap<String, Shape>,
}

impl SlintSurface {
    pub fn new(view: MapView) -> Self {
        Self {
            view,
            model: Rc::new(VecModel::default()),
            shapes: HashMap::new(),
        }
    }

    pub fn model(&self) -> ModelRc<MapPolygon> {
        ModelRc::from(self.model.clone())
    }

    pub fn view(&self) -> &MapView {
        &self.view
    }

    /// Key of the topmost clickable polygon under a basemap pixel
    pub fn hit_test(&self, x: f64, y: f64) -> Option<String> {
        (0..self.model.row_count())
            .rev()
            .filter_map(|row| self.model.row_data(row))
            .map(|polygon| polygon.key.to_string())
            .find(|key| {
                self.shapes
                    .get(key)
                    .is_some_and(|shape| shape.clickable && point_in_polygon((x, y), &shape.ring))
            })
    }

    fn row_of(&self, key: &str) -> Option<usize> {
        self.model.iter().position(|polygon| polygon.key.as_str() == key)
    }

    fn insert_row(&self, polygon: MapPolygon, layer: Layer) {
        let first_alert = self.model.iter().position(|row| {
            self.shapes
                .get(row.key.as_str())
                .is_some_and(|shape| shape.layer == Layer::Alert)
        });

        match (layer, first_alert) {
            (Layer::Outlook, Some(row)) => self.model.insert(row, polygon),
            _ => self.model.push(polygon),
        }
    }
}

fn color(rgb: Rgb, alpha: u8) -> Color {
    Color::from_argb_u8(alpha, rgb.r, rgb.g, rgb.b)
}

/// SVG path data for a closed ring
fn path_commands(ring: &[(f64, f64)]) -> String {
    let mut commands = String::new();
    for (i, (x, y)) in ring.iter().enumerate() {
        let verb = if i == 0 { 'M' } else { 'L' };
        let _ = write!(commands, "{} {:.1} {:.1} ", verb, x, y);
    }
    commands.push('Z');
    commands
}

impl RenderSurface for SlintSurface {
    type Handle = String;

    fn draw_polygon(&mut self, spec: &PolygonSpec) -> Result<String, SurfaceError> {
        if spec.vertices.len() < 3 {
            return Err(SurfaceError::new(format!("{} vertices cannot form a polygon", spec.vertices.len())));
        }
        if self.shapes.contains_key(&spec.key) {
            return Err(SurfaceError::new(format!("{} is already on the map", spec.key)));
        }

        let ring = self.view.project_ring(&spec.vertices);
        let polygon = MapPolygon {
            key: spec.key.as_str().into(),
            commands: path_commands(&ring).into(),
            stroke: color(spec.style.stroke, 255),
            fill: spec.style.fill.map(|fill| color(fill, FILL_ALPHA)).unwrap_or(Color::from_argb_u8(0, 0, 0, 0)),
            stroke_width: spec.style.border_width as f32,
        };

        self.insert_row(polygon, spec.layer);
        self.shapes.insert(
            spec.key.clone(),
            Shape {
                ring,
                layer: spec.layer,
                clickable: spec.clickable,
            },
        );

        Ok(spec.key.clone())
    }

    fn delete(&mut self, handle: &String) -> Result<(), SurfaceError> {
        let row = self
            .row_of(handle)
            .ok_or_else(|| SurfaceError::new(format!("{} is not on the map", handle)))?;
        self.model.remove(row);
        self.shapes.remove(handle);
        Ok(())
    }

    fn overlay_ids(&self) -> HashSet<String> {
        self.shapes.keys().cloned().collect()
    }
}

pub fn install_registry(registry: Registry, main_window: &MainWindow) {
    let state = RenderState {
        registry,
        window: main_window.as_weak(),
    };
    RENDER_STATE.with(|cell| *cell.borrow_mut() = Some(state));
}

pub fn remove_registry() -> Option<Registry> {
    RENDER_STATE.with(|cell| cell.borrow_mut().take().map(|state| state.registry))
}

/// Run `f` against the registry; `None` off the event loop thread or after
/// shutdown
pub fn with_registry<R>(f: impl FnOnce(&mut Registry) -> R) -> Option<R> {
    RENDER_STATE.with(|cell| cell.borrow_mut().as_mut().map(|state| f(&mut state.registry)))
}

/// Hands jobs to the slint event loop, where the registry lives
#[derive(Debug, Clone, Copy, Default)]
pub struct SlintQueue;

impl RenderQueue<Registry> for SlintQueue {
    fn post(&self, job: Job<Registry>) -> Result<(), QueueClosed> {
        slint::invoke_from_event_loop(move || {
            RENDER_STATE.with(|cell| match cell.borrow_mut().as_mut() {
                Some(state) => {
                    job(&mut state.registry);
                    if let Some(window) = state.window.upgrade() {
                        refresh_status(&window, &state.registry);
                    }
                }
                None => debug!("Registry is gone, dropping render job"),
            });
        })
        .map_err(|_| QueueClosed)
    }
}
