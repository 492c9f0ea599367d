use std::path::{Path, PathBuf};

use serde::Serialize;

use super::phase::ScanPhase;
use crate::error::{ScanError, ScanErrorKind};

/// Final result of a scan. Either the success fields or the error fields
/// are populated, never both.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanCompletion {
    #[serde(skip_serializing_if = "Option::is_none")]
    combined_artifact_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_room_metadata_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_room_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<ScanErrorKind>,
}

impl ScanCompletion {
    pub fn success(
        combined_artifact_path: Option<PathBuf>,
        new_room_metadata_path: PathBuf,
        total_room_count: usize,
    ) -> Self {
        Self {
            combined_artifact_path,
            new_room_metadata_path: Some(new_room_metadata_path),
            total_room_count: Some(total_room_count),
            error: None,
            error_kind: None,
        }
    }

    pub fn failure(error: &ScanError) -> Self {
        Self {
            combined_artifact_path: None,
            new_room_metadata_path: None,
            total_room_count: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn combined_artifact_path(&self) -> Option<&Path> {
        self.combined_artifact_path.as_deref()
    }

    pub fn new_room_metadata_path(&self) -> Option<&Path> {
        self.new_room_metadata_path.as_deref()
    }

    pub fn total_room_count(&self) -> Option<usize> {
        self.total_room_count
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn error_kind(&self) -> Option<ScanErrorKind> {
        self.error_kind
    }
}

/// Events emitted on a session's channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanEvent {
    PhaseChanged { from: ScanPhase, to: ScanPhase },
    /// Raw capture finished; refinement has begun
    ProcessingStarted,
    /// Sent exactly once per started session
    Completed(ScanCompletion),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_and_failure_are_exclusive() {
        let ok = ScanCompletion::success(
            Some(PathBuf::from("/p/MasterView.obj")),
            PathBuf::from("/p/a.json"),
            2,
        );
        assert!(ok.is_success());
        assert!(ok.error_kind().is_none());
        assert_eq!(ok.total_room_count(), Some(2));

        let failed = ScanCompletion::failure(&ScanError::Cancelled);
        assert!(!failed.is_success());
        assert!(failed.combined_artifact_path().is_none());
        assert!(failed.total_room_count().is_none());
        assert_eq!(failed.error(), Some("Scan cancelled"));
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(ScanEvent::PhaseChanged {
            from: ScanPhase::Idle,
            to: ScanPhase::Relocalizing,
        })
        .unwrap();
        assert_eq!(json["type"], "phase_changed");
        assert_eq!(json["to"], "relocalizing");

        let json = serde_json::to_value(ScanEvent::Completed(ScanCompletion::failure(
            &ScanError::CaptureAborted("Tracking lost".into()),
        )))
        .unwrap();
        assert_eq!(json["type"], "completed");
        assert_eq!(json["error"], "Tracking lost");
        assert_eq!(json["errorKind"], "capture_aborted");
    }
}
