//! Keeps a map's alert polygons in step with the active-alerts feed.
//!
//! A background [`poller`] fetches snapshots and computes a
//! [`reconcile::ReconcilePlan`]; the plan is handed through a
//! [`queue::RenderQueue`] to the thread that owns the
//! [`registry::OverlayRegistry`], which alone draws and deletes polygons on
//! a [`surface::RenderSurface`].

#[macro_use] extern crate log;

pub mod config;
mod error;
pub mod logging;
pub mod poller;
pub mod queue;
pub mod reconcile;
pub mod registry;
pub mod surface;

pub use config::AlertConfig;
pub use error::{ApplyError, FatalError, QueueClosed, SurfaceError};
pub use poller::{spawn_alert_poller, PollSummary, PollerHandle, SnapshotSource, StopReason};
pub use queue::{round_trip, Job, RenderQueue, ThreadQueue};
pub use reconcile::{reconcile, IdSet, ReconcilePlan};
pub use registry::{AlertLayer, ApplyReport, Overlay, OverlayRegistry};
pub use surface::{Layer, MemorySurface, PolygonSpec, PolygonStyle, RenderSurface, Rgb};
