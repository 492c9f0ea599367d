//! Capture source backed by a recorded capture on disk.
//!
//! A recording is a JSON document:
//!
//! ```json
//! {
//!   "capture": { "captured_at": "...", "surfaces": [...], "objects": [...] },
//!   "snapshot": { "feature_point_count": 1200, "data": [1, 2, 3] }
//! }
//! ```
//!
//! `capture` may be replaced by `"error": "Tracking lost"` to replay a
//! failed run.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    Capability, CaptureConfig, CaptureError, RawCaptureData, RawCaptureSource, WorldSnapshot,
};

/// Stored tracking world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedSnapshot {
    pub feature_point_count: u64,
    #[serde(default)]
    pub data: Vec<u8>,
}

/// On-disk capture recording.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureRecording {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<RawCaptureData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<RecordedSnapshot>,
}

pub struct ReplayCaptureSource {
    recording: CaptureRecording,
    label: String,
    stopped: AtomicBool,
}

impl ReplayCaptureSource {
    pub fn new(recording: CaptureRecording, label: impl Into<String>) -> Self {
        Self {
            recording,
            label: label.into(),
            stopped: AtomicBool::new(false),
        }
    }

    /// Load a recording from a JSON file.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read capture recording {}", path.display()))?;
        let recording: CaptureRecording =
            serde_json::from_str(&content).context("Failed to parse capture recording")?;

        if recording.capture.is_none() && recording.error.is_none() {
            anyhow::bail!("Recording has neither a capture nor an error");
        }

        Ok(Self::new(recording, path.display().to_string()))
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RawCaptureSource for ReplayCaptureSource {
    fn capability(&self) -> Capability {
        Capability::supported(format!("replay ({})", std::env::consts::OS))
    }

    async fn capture(&self, config: CaptureConfig) -> Result<RawCaptureData, CaptureError> {
        if let Some(world) = &config.initial_world {
            tracing::debug!(
                "[capture] Replay seeded with {} feature points",
                world.feature_point_count
            );
        }

        if let Some(error) = &self.recording.error {
            return Err(CaptureError::Aborted(error.clone()));
        }

        self.recording
            .capture
            .clone()
            .ok_or_else(|| CaptureError::Aborted("Recording contains no capture".to_string()))
    }

    async fn world_snapshot(&self) -> Result<WorldSnapshot, CaptureError> {
        if self.is_stopped() {
            return Err(CaptureError::Stopped);
        }
        self.recording
            .snapshot
            .as_ref()
            .map(|s| WorldSnapshot::new(s.data.clone(), s.feature_point_count))
            .ok_or_else(|| CaptureError::SnapshotUnavailable("recording has no snapshot".into()))
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn description(&self) -> String {
        format!("Replay of {}", self.label)
    }
}
