//! Narrow interface to the platform's room-capture capability.
//!
//! The depth sensing, positional tracking and room detection all belong to
//! the platform SDK. This crate only consumes them through
//! [`RawCaptureSource`]:
//!
//! - a capability query used to gate scanning,
//! - one capture run that resolves to raw room data or an error,
//! - a snapshot of the tracking world, used for relocalization,
//! - an idempotent stop that releases the sensors.
//!
//! Platform bindings implement the trait; [`ScriptedCaptureSource`] and
//! [`ReplayCaptureSource`] are the in-crate implementations used by tests
//! and the headless CLI.

mod replay;
mod scripted;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Confidence, ObjectCategory, Point3, SurfaceCategory};

pub use replay::{CaptureRecording, RecordedSnapshot, ReplayCaptureSource};
pub use scripted::{rectangular_room, ScriptedCaptureSource, ScriptedOutcome};

/// Whether this device can run room captures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub device_supported: bool,
    pub os_version: String,
}

impl Capability {
    pub fn supported(os_version: impl Into<String>) -> Self {
        Self {
            available: true,
            reason: None,
            device_supported: true,
            os_version: os_version.into(),
        }
    }

    pub fn unsupported(reason: impl Into<String>, os_version: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
            device_supported: false,
            os_version: os_version.into(),
        }
    }
}

/// Opaque serialized tracking world, plus the feature point count the
/// capture layer reported for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldSnapshot {
    pub data: Vec<u8>,
    pub feature_point_count: u64,
}

impl WorldSnapshot {
    pub fn new(data: Vec<u8>, feature_point_count: u64) -> Self {
        Self {
            data,
            feature_point_count,
        }
    }

    /// A snapshot with no tracked feature points cannot seed relocalization.
    pub fn is_degenerate(&self) -> bool {
        self.feature_point_count == 0
    }
}

/// Parameters for one capture run.
#[derive(Debug, Clone, Default)]
pub struct CaptureConfig {
    /// Previously saved world to relocalize against
    pub initial_world: Option<WorldSnapshot>,
    /// Show on-screen coaching during capture
    pub coaching_enabled: bool,
}

/// A surface as detected, before refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSurface {
    pub category: SurfaceCategory,
    pub polygon: Vec<Point3>,
    pub confidence: Confidence,
}

/// An object as detected, before refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObject {
    pub category: ObjectCategory,
    pub center: Point3,
    pub dimensions: Point3,
    pub yaw: f64,
    pub confidence: Confidence,
}

/// Raw per-room output of one capture run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCaptureData {
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub surfaces: Vec<RawSurface>,
    #[serde(default)]
    pub objects: Vec<RawObject>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// User abort, tracking loss, sensor fault. The message is shown to the user as-is.
    #[error("{0}")]
    Aborted(String),

    #[error("Capture session was stopped")]
    Stopped,

    #[error("World snapshot unavailable: {0}")]
    SnapshotUnavailable(String),
}

/// Platform room-capture capability.
#[async_trait]
pub trait RawCaptureSource: Send + Sync {
    /// Query device/OS support.
    fn capability(&self) -> Capability;

    /// Run one capture. Resolves once the platform has raw room data or
    /// the capture failed.
    async fn capture(&self, config: CaptureConfig) -> Result<RawCaptureData, CaptureError>;

    /// Snapshot the live tracking world. Only meaningful while the tracking
    /// session is running.
    async fn world_snapshot(&self) -> Result<WorldSnapshot, CaptureError>;

    /// Stop the tracking session and release sensors. Must be idempotent.
    fn stop(&self);

    /// Short description for logging.
    fn description(&self) -> String;
}
