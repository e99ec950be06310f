//! Error types for the overlay engine.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A render surface refused a draw or delete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SurfaceError(pub String);

impl SurfaceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// One item of a plan could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("failed to draw {id}: {source}")]
    Draw { id: String, source: SurfaceError },

    #[error("failed to delete {id}: {source}")]
    Delete { id: String, source: SurfaceError },
}

impl ApplyError {
    pub fn id(&self) -> &str {
        match self {
            ApplyError::Draw { id, .. } | ApplyError::Delete { id, .. } => id,
        }
    }
}

/// The render side has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("render queue closed")]
pub struct QueueClosed;

/// Startup failures; nothing is polled when one of these occurs.
#[derive(Debug, Error)]
pub enum FatalError {
    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The configuration file exists but could not be read.
    #[error("Cannot read {path:?}: {source}")]
    ConfigFile { path: PathBuf, source: io::Error },

    /// The configuration file is not valid JSON for `AlertConfig`.
    #[error("Malformed configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// The poller's async runtime could not be built.
    #[error("Failed to build runtime: {0}")]
    Runtime(#[source] io::Error),

    /// A background thread could not be started.
    #[error("Failed to spawn thread: {0}")]
    Spawn(#[source] io::Error),

    /// The render surface could not be initialised.
    #[error("Render surface unavailable: {0}")]
    Surface(String),
}
