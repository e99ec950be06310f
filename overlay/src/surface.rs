//! The drawing seam between the registry and whatever shows polygons.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use nws::AlertRecord;
use spc::OutlookPolygon;

use crate::SurfaceError;

pub const ALERT_BORDER_WIDTH: u32 = 2;
pub const OUTLOOK_BORDER_WIDTH: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    /// Parse `#RRGGBB` (the leading `#` is optional)
    pub fn from_hex(hex: &str) -> Option<Rgb> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }

        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
        Some(Rgb {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Stacking layer; outlooks always sit below alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    Outlook,
    Alert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolygonStyle {
    pub stroke: Rgb,
    pub fill: Option<Rgb>,
    pub border_width: u32,
}

/// Everything a surface needs to draw one polygon
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonSpec {
    pub key: String,
    /// (lat, lon) pairs
    pub vertices: Vec<(f64, f64)>,
    pub style: PolygonStyle,
    pub layer: Layer,
    pub clickable: bool,
}

impl PolygonSpec {
    /// Style an alert by its kind. `None` when the alert has no polygon or
    /// its kind has no display color.
    pub fn for_alert(record: &AlertRecord) -> Option<PolygonSpec> {
        let vertices = record.geometry.as_ref().filter(|ring| !ring.is_empty())?;
        let color = record.kind.color().and_then(Rgb::from_hex)?;

        Some(PolygonSpec {
            key: record.id.clone(),
            vertices: vertices.clone(),
            style: PolygonStyle {
                stroke: color,
                fill: Some(color),
                border_width: ALERT_BORDER_WIDTH,
            },
            layer: Layer::Alert,
            clickable: true,
        })
    }

    pub fn for_outlook(key: String, outlook: &OutlookPolygon) -> PolygonSpec {
        let stroke = outlook.stroke.as_deref().and_then(Rgb::from_hex).unwrap_or(Rgb::BLACK);

        PolygonSpec {
            key,
            vertices: outlook.vertices.clone(),
            style: PolygonStyle {
                stroke,
                fill: None,
                border_width: OUTLOOK_BORDER_WIDTH,
            },
            layer: Layer::Outlook,
            clickable: false,
        }
    }
}

/// A stateful visual layer of polygons.
///
/// Implementations are only touched from the render thread.
pub trait RenderSurface {
    type Handle;

    fn draw_polygon(&mut self, spec: &PolygonSpec) -> Result<Self::Handle, SurfaceError>;

    fn delete(&mut self, handle: &Self::Handle) -> Result<(), SurfaceError>;

    /// Keys of every polygon the surface currently shows
    fn overlay_ids(&self) -> HashSet<String>;
}

/// Keeps polygons in memory and logs every change. Backs the headless
/// binary.
#[derive(Debug, Default)]
pub struct MemorySurface {
    polygons: BTreeMap<String, PolygonSpec>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn polygons(&self) -> impl Iterator<Item = &PolygonSpec> {
        self.polygons.values()
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Drop everything, as a user "clear map" would
    pub fn clear(&mut self) {
        self.polygons.clear();
    }
}

impl RenderSurface for MemorySurface {
    type Handle = String;

    fn draw_polygon(&mut self, spec: &PolygonSpec) -> Result<String, SurfaceError> {
        if spec.vertices.len() < 3 {
            return Err(SurfaceError::new(format!("{} has only {} vertices", spec.key, spec.vertices.len())));
        }

        info!("Drawing {:?} polygon {} ({} vertices, {})", spec.layer, spec.key, spec.vertices.len(), spec.style.stroke);
        self.polygons.insert(spec.key.clone(), spec.clone());
        Ok(spec.key.clone())
    }

    fn delete(&mut self, handle: &String) -> Result<(), SurfaceError> {
        match self.polygons.remove(handle) {
            Some(_) => {
                info!("Removed polygon {}", handle);
                Ok(())
            }
            None => Err(SurfaceError::new(format!("no polygon {}", handle))),
        }
    }

    fn overlay_ids(&self) -> HashSet<String> {
        self.polygons.keys().cloned().collect()
    }
}
