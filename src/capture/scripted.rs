//! Deterministic capture source that plays back a pre-set outcome.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{
    Capability, CaptureConfig, CaptureError, RawCaptureData, RawCaptureSource, RawObject,
    RawSurface, WorldSnapshot,
};
use crate::model::{Confidence, ObjectCategory, Point3, SurfaceCategory};

/// What the next capture run resolves to.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    Room(RawCaptureData),
    Error(String),
    /// Never resolves on its own; ends with `Stopped` once `stop()` is called
    Pending,
}

pub struct ScriptedCaptureSource {
    capability: Capability,
    outcome: ScriptedOutcome,
    snapshot: Option<WorldSnapshot>,
    last_config: Mutex<Option<CaptureConfig>>,
    capture_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    stopped: Notify,
}

impl ScriptedCaptureSource {
    pub fn new(outcome: ScriptedOutcome) -> Self {
        Self {
            capability: Capability::supported("scripted"),
            outcome,
            snapshot: None,
            last_config: Mutex::new(None),
            capture_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            stopped: Notify::new(),
        }
    }

    pub fn succeeding(data: RawCaptureData) -> Self {
        Self::new(ScriptedOutcome::Room(data))
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::new(ScriptedOutcome::Error(message.into()))
    }

    pub fn pending() -> Self {
        Self::new(ScriptedOutcome::Pending)
    }

    /// Report this snapshot from `world_snapshot()`.
    pub fn with_snapshot(mut self, snapshot: WorldSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn unavailable(mut self, reason: impl Into<String>) -> Self {
        self.capability = Capability::unsupported(reason, "scripted");
        self
    }

    /// Config passed to the most recent `capture()` call.
    pub fn last_config(&self) -> Option<CaptureConfig> {
        self.last_config.lock().clone()
    }

    pub fn capture_calls(&self) -> usize {
        self.capture_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RawCaptureSource for ScriptedCaptureSource {
    fn capability(&self) -> Capability {
        self.capability.clone()
    }

    async fn capture(&self, config: CaptureConfig) -> Result<RawCaptureData, CaptureError> {
        self.capture_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_config.lock() = Some(config);

        match &self.outcome {
            ScriptedOutcome::Room(data) => Ok(data.clone()),
            ScriptedOutcome::Error(message) => Err(CaptureError::Aborted(message.clone())),
            ScriptedOutcome::Pending => {
                self.stopped.notified().await;
                Err(CaptureError::Stopped)
            }
        }
    }

    async fn world_snapshot(&self) -> Result<WorldSnapshot, CaptureError> {
        self.snapshot
            .clone()
            .ok_or_else(|| CaptureError::SnapshotUnavailable("no snapshot scripted".to_string()))
    }

    fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        // Leaves a permit behind if no capture is waiting yet
        self.stopped.notify_one();
    }

    fn description(&self) -> String {
        "Scripted capture source".to_string()
    }
}

/// Raw data for an axis-aligned rectangular room with one door on its
/// south wall (the wall at `min_z`).
pub fn rectangular_room(min_x: f64, min_z: f64, width: f64, depth: f64) -> RawCaptureData {
    const HEIGHT: f64 = 2.5;
    let (max_x, max_z) = (min_x + width, min_z + depth);
    let corners = [
        Point3::new(min_x, 0.0, min_z),
        Point3::new(max_x, 0.0, min_z),
        Point3::new(max_x, 0.0, max_z),
        Point3::new(min_x, 0.0, max_z),
    ];

    let vertical = |a: Point3, b: Point3, bottom: f64, top: f64, category| RawSurface {
        category,
        polygon: vec![
            Point3::new(a.x, bottom, a.z),
            Point3::new(b.x, bottom, b.z),
            Point3::new(b.x, top, b.z),
            Point3::new(a.x, top, a.z),
        ],
        confidence: Confidence::High,
    };

    let mut surfaces: Vec<RawSurface> = (0..4)
        .map(|i| {
            vertical(
                corners[i],
                corners[(i + 1) % 4],
                0.0,
                HEIGHT,
                SurfaceCategory::Wall,
            )
        })
        .collect();

    let door_mid = min_x + width / 2.0;
    surfaces.push(vertical(
        Point3::new(door_mid - 0.45, 0.0, min_z),
        Point3::new(door_mid + 0.45, 0.0, min_z),
        0.0,
        2.0,
        SurfaceCategory::Door,
    ));

    surfaces.push(RawSurface {
        category: SurfaceCategory::Floor,
        polygon: corners.to_vec(),
        confidence: Confidence::High,
    });

    RawCaptureData {
        captured_at: Utc::now(),
        surfaces,
        objects: vec![RawObject {
            category: ObjectCategory::Table,
            center: Point3::new(min_x + width / 2.0, 0.375, min_z + depth / 2.0),
            dimensions: Point3::new(1.2, 0.75, 0.8),
            yaw: 0.0,
            confidence: Confidence::Medium,
        }],
    }
}
