//! End-to-end scan tests against a scripted capture source.
//!
//! These run the full pipeline (relocalize, capture, process, persist,
//! merge, export, anchor) on a temp directory.

#![cfg(test)]

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tempfile::TempDir;
use tokio::sync::{mpsc, Notify};

use super::{CaptureSessionController, ScanCompletion, ScanEvent, ScanPhase, ScanServices};
use crate::anchor::WorldAnchorStore;
use crate::capture::{
    rectangular_room, Capability, CaptureConfig, CaptureError, RawCaptureData, RawCaptureSource,
    ScriptedCaptureSource, WorldSnapshot,
};
use crate::error::{ScanError, ScanErrorKind};
use crate::merge::{
    MergeError, ModelExporter, ObjExporter, StructureBuilder, StructureMerger,
};
use crate::model::{Room, Structure};
use crate::processor::{BeautifyRoomBuilder, RoomBuilder};
use crate::project::{Project, ProjectLayout, ProjectStore};
use crate::repository::{load_room, ProjectRoomRepository};

struct AlwaysFailingBuilder;

impl StructureBuilder for AlwaysFailingBuilder {
    fn build(&self, _rooms: &[Room]) -> Result<Structure, MergeError> {
        Err(MergeError::Inconsistent("forced failure".to_string()))
    }

    fn description(&self) -> String {
        "always failing".to_string()
    }
}

struct BrokenExporter;

impl ModelExporter for BrokenExporter {
    fn extension(&self) -> &str {
        "obj"
    }

    fn encode(&self, _structure: &Structure) -> crate::error::Result<Vec<u8>> {
        Err(ScanError::Encoding("exporter unavailable".to_string()))
    }
}

/// Capture source that holds `world_snapshot` open until released, so a
/// test can act after capture data arrived but before processing starts.
struct GatedSnapshotSource {
    snapshot_requested: Notify,
    release: Notify,
}

impl GatedSnapshotSource {
    fn new() -> Self {
        Self {
            snapshot_requested: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl RawCaptureSource for GatedSnapshotSource {
    fn capability(&self) -> Capability {
        Capability::supported("test")
    }

    async fn capture(&self, _config: CaptureConfig) -> Result<RawCaptureData, CaptureError> {
        Ok(rectangular_room(0.0, 0.0, 4.0, 3.0))
    }

    async fn world_snapshot(&self) -> Result<WorldSnapshot, CaptureError> {
        self.snapshot_requested.notify_one();
        self.release.notified().await;
        Ok(WorldSnapshot::new(vec![1; 16], 50))
    }

    fn stop(&self) {}

    fn description(&self) -> String {
        "Gated snapshot source".to_string()
    }
}

fn test_project(temp: &TempDir) -> Project {
    Project::new(temp.path(), "Room_1700000000000", ProjectLayout::default()).unwrap()
}

fn services(source: Arc<ScriptedCaptureSource>) -> ScanServices {
    ScanServices::new(source)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ScanEvent>) -> Vec<ScanEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn run_scan(services: ScanServices, project: &Project) -> (ScanCompletion, Vec<ScanEvent>) {
    let (controller, mut rx) = CaptureSessionController::new(services, project.clone());
    let completion = controller.start().await.expect("first start runs");
    drop(controller);
    (completion, drain(&mut rx))
}

async fn persisted_room(created_offset_secs: i64, min_x: f64, project: &Project) -> Room {
    let mut room = BeautifyRoomBuilder::default()
        .build(&rectangular_room(min_x, 0.0, 4.0, 3.0))
        .unwrap();
    room.created_at = Utc::now() + Duration::seconds(created_offset_secs);
    ProjectRoomRepository::new()
        .save(project, &room)
        .await
        .unwrap();
    room
}

fn count_with_extension(dir: &Path, extension: &str) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().is_some_and(|x| x == extension))
                .count()
        })
        .unwrap_or(0)
}

// ============================================================================
// Successful scans
// ============================================================================

#[tokio::test]
async fn test_first_scan_exports_single_room() {
    let temp = TempDir::new().unwrap();
    let project = test_project(&temp);
    let source = Arc::new(ScriptedCaptureSource::succeeding(rectangular_room(
        0.0, 0.0, 4.0, 3.0,
    )));

    let (completion, _) = run_scan(services(source.clone()), &project).await;

    assert!(completion.is_success(), "{:?}", completion.error());
    assert_eq!(completion.total_room_count(), Some(1));

    let rooms = ProjectRoomRepository::new().list_all(&project).await.unwrap();
    assert_eq!(rooms.len(), 1);

    let combined = completion.combined_artifact_path().unwrap();
    assert_eq!(combined, project.combined_export_path());
    let direct = ObjExporter::new()
        .encode(&Structure::single(&rooms[0]))
        .unwrap();
    assert_eq!(std::fs::read(combined).unwrap(), direct);

    let room_path = completion.new_room_metadata_path().unwrap();
    assert_eq!(load_room(room_path).await.unwrap(), rooms[0]);
}

#[tokio::test]
async fn test_export_is_written_after_room() {
    let temp = TempDir::new().unwrap();
    let project = test_project(&temp);
    let source = Arc::new(ScriptedCaptureSource::succeeding(rectangular_room(
        0.0, 0.0, 4.0, 3.0,
    )));

    let (completion, _) = run_scan(services(source), &project).await;

    let modified = |p: &Path| std::fs::metadata(p).unwrap().modified().unwrap();
    assert!(
        modified(completion.combined_artifact_path().unwrap())
            >= modified(completion.new_room_metadata_path().unwrap())
    );
}

#[tokio::test]
async fn test_each_scan_adds_exactly_one_room() {
    let temp = TempDir::new().unwrap();
    let project = test_project(&temp);
    let repo = ProjectRoomRepository::new();

    for (i, min_x) in [0.0, 4.0, 8.0].into_iter().enumerate() {
        let before = repo.count(&project).await.unwrap();
        let source = Arc::new(ScriptedCaptureSource::succeeding(rectangular_room(
            min_x, 0.0, 4.0, 3.0,
        )));
        let (completion, _) = run_scan(services(source), &project).await;

        assert!(completion.is_success());
        assert_eq!(repo.count(&project).await.unwrap(), before + 1);
        assert_eq!(completion.total_room_count(), Some(i + 1));
    }

    let text = std::fs::read_to_string(project.combined_export_path()).unwrap();
    assert!(text.contains("# rooms: 3, adjacencies: 2"));
}

#[tokio::test]
async fn test_forced_merge_failure_exports_latest_room_and_counts_all() {
    let temp = TempDir::new().unwrap();
    let project = test_project(&temp);
    persisted_room(-120, 0.0, &project).await;
    persisted_room(-60, 4.0, &project).await;

    let source = Arc::new(ScriptedCaptureSource::succeeding(rectangular_room(
        8.0, 0.0, 4.0, 3.0,
    )));
    let mut services = services(source);
    services.merger = Arc::new(StructureMerger::new(
        Arc::new(AlwaysFailingBuilder),
        Arc::new(ObjExporter::new()),
    ));

    let (completion, _) = run_scan(services, &project).await;

    assert!(completion.is_success(), "{:?}", completion.error());
    assert_eq!(completion.total_room_count(), Some(3));
    assert_eq!(
        ProjectRoomRepository::new()
            .list_all(&project)
            .await
            .unwrap()
            .len(),
        3
    );

    let newest = load_room(completion.new_room_metadata_path().unwrap())
        .await
        .unwrap();
    let expected = ObjExporter::new()
        .encode(&Structure::single(&newest))
        .unwrap();
    assert_eq!(
        std::fs::read(project.combined_export_path()).unwrap(),
        expected
    );
}

#[tokio::test]
async fn test_export_failure_keeps_room_and_skips_anchor() {
    let temp = TempDir::new().unwrap();
    let project = test_project(&temp);
    let source = Arc::new(
        ScriptedCaptureSource::succeeding(rectangular_room(0.0, 0.0, 4.0, 3.0))
            .with_snapshot(WorldSnapshot::new(vec![3; 16], 50)),
    );
    let mut services = services(source);
    services.merger = Arc::new(StructureMerger::new(
        Arc::new(AlwaysFailingBuilder),
        Arc::new(BrokenExporter),
    ));

    let (completion, events) = run_scan(services, &project).await;

    assert!(!completion.is_success());
    assert_eq!(completion.error_kind(), Some(ScanErrorKind::Encoding));
    let last_transition = events.iter().rev().find_map(|e| match e {
        ScanEvent::PhaseChanged { from, to } => Some((*from, *to)),
        _ => None,
    });
    assert_eq!(
        last_transition,
        Some((ScanPhase::Exporting, ScanPhase::Errored))
    );

    // The room stays persisted; no export and no anchor are written
    assert_eq!(
        ProjectRoomRepository::new().count(&project).await.unwrap(),
        1
    );
    assert!(!project.combined_export_path().exists());
    assert!(!project.anchor_path().exists());
    assert_eq!(
        WorldAnchorStore::new().load(&project).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn test_event_sequence() {
    let temp = TempDir::new().unwrap();
    let project = test_project(&temp);
    let source = Arc::new(ScriptedCaptureSource::succeeding(rectangular_room(
        0.0, 0.0, 4.0, 3.0,
    )));

    let (_, events) = run_scan(services(source), &project).await;

    let phases: Vec<ScanPhase> = events
        .iter()
        .filter_map(|e| match e {
            ScanEvent::PhaseChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            ScanPhase::Relocalizing,
            ScanPhase::Capturing,
            ScanPhase::Processing,
            ScanPhase::Merging,
            ScanPhase::Exporting,
            ScanPhase::Completed,
        ]
    );

    let processing_started = events
        .iter()
        .position(|e| *e == ScanEvent::ProcessingStarted)
        .unwrap();
    let entered_processing = events
        .iter()
        .position(|e| {
            matches!(
                e,
                ScanEvent::PhaseChanged {
                    to: ScanPhase::Processing,
                    ..
                }
            )
        })
        .unwrap();
    assert!(processing_started > entered_processing);

    let completed = events
        .iter()
        .filter(|e| matches!(e, ScanEvent::Completed(_)))
        .count();
    assert_eq!(completed, 1);
    assert!(matches!(events.last(), Some(ScanEvent::Completed(_))));
}

// ============================================================================
// World anchor
// ============================================================================

#[tokio::test]
async fn test_snapshot_is_saved_and_seeds_next_scan() {
    let temp = TempDir::new().unwrap();
    let project = test_project(&temp);
    let snapshot = WorldSnapshot::new(vec![1, 2, 3, 4], 900);

    let first = Arc::new(
        ScriptedCaptureSource::succeeding(rectangular_room(0.0, 0.0, 4.0, 3.0))
            .with_snapshot(snapshot.clone()),
    );
    let (completion, _) = run_scan(services(first.clone()), &project).await;
    assert!(completion.is_success());
    assert!(first.last_config().unwrap().initial_world.is_none());
    assert_eq!(
        WorldAnchorStore::new().load(&project).await.unwrap(),
        Some(snapshot.clone())
    );

    let second = Arc::new(ScriptedCaptureSource::succeeding(rectangular_room(
        4.0, 0.0, 4.0, 3.0,
    )));
    run_scan(services(second.clone()), &project).await;
    assert_eq!(second.last_config().unwrap().initial_world, Some(snapshot));
}

#[tokio::test]
async fn test_degenerate_snapshot_keeps_previous_anchor() {
    let temp = TempDir::new().unwrap();
    let project = test_project(&temp);
    let good = WorldSnapshot::new(vec![5; 32], 300);
    WorldAnchorStore::new().save(&project, &good).await.unwrap();
    let before = std::fs::read(project.anchor_path()).unwrap();

    let source = Arc::new(
        ScriptedCaptureSource::succeeding(rectangular_room(0.0, 0.0, 4.0, 3.0))
            .with_snapshot(WorldSnapshot::new(vec![0; 8], 0)),
    );
    let (completion, _) = run_scan(services(source), &project).await;

    assert!(completion.is_success());
    assert_eq!(std::fs::read(project.anchor_path()).unwrap(), before);
}

#[tokio::test]
async fn test_unreadable_anchor_does_not_block_scan() {
    let temp = TempDir::new().unwrap();
    let project = test_project(&temp);
    std::fs::create_dir_all(project.dir()).unwrap();
    std::fs::write(project.anchor_path(), b"not an anchor").unwrap();

    let source = Arc::new(ScriptedCaptureSource::succeeding(rectangular_room(
        0.0, 0.0, 4.0, 3.0,
    )));
    let (completion, _) = run_scan(services(source.clone()), &project).await;

    assert!(completion.is_success());
    assert!(source.last_config().unwrap().initial_world.is_none());
}

// ============================================================================
// Failures and cancellation
// ============================================================================

#[tokio::test]
async fn test_capture_error_forwards_message() {
    let temp = TempDir::new().unwrap();
    let project = test_project(&temp);
    let source = Arc::new(ScriptedCaptureSource::failing("Tracking lost"));

    let (completion, events) = run_scan(services(source.clone()), &project).await;

    assert_eq!(completion.error(), Some("Tracking lost"));
    assert_eq!(completion.error_kind(), Some(ScanErrorKind::CaptureAborted));
    assert!(events.contains(&ScanEvent::PhaseChanged {
        from: ScanPhase::Capturing,
        to: ScanPhase::Errored,
    }));
    assert!(source.stop_calls() >= 1);
    assert_eq!(count_with_extension(project.dir(), "json"), 0);
}

#[tokio::test]
async fn test_unavailable_capability_never_captures() {
    let temp = TempDir::new().unwrap();
    let project = test_project(&temp);
    let source = Arc::new(
        ScriptedCaptureSource::succeeding(rectangular_room(0.0, 0.0, 4.0, 3.0))
            .unavailable("Requires a depth sensor"),
    );

    let (completion, _) = run_scan(services(source.clone()), &project).await;

    assert_eq!(
        completion.error_kind(),
        Some(ScanErrorKind::CapabilityUnavailable)
    );
    assert!(completion.error().unwrap().contains("Requires a depth sensor"));
    assert_eq!(source.capture_calls(), 0);
}

#[tokio::test]
async fn test_processing_failure_persists_nothing() {
    let temp = TempDir::new().unwrap();
    let project = test_project(&temp);
    let mut raw = rectangular_room(0.0, 0.0, 4.0, 3.0);
    raw.surfaces
        .retain(|s| s.category == crate::model::SurfaceCategory::Door);
    let source = Arc::new(ScriptedCaptureSource::succeeding(raw));

    let (completion, _) = run_scan(services(source), &project).await;

    assert_eq!(completion.error_kind(), Some(ScanErrorKind::ProcessingFailed));
    assert!(completion.error().unwrap().contains("insufficient geometry"));
    assert_eq!(count_with_extension(project.dir(), "json"), 0);
    assert!(!project.combined_export_path().exists());
}

#[tokio::test]
async fn test_cancel_while_capturing() {
    let temp = TempDir::new().unwrap();
    let project = test_project(&temp);
    let source = Arc::new(ScriptedCaptureSource::pending());

    let (controller, mut rx) = CaptureSessionController::new(services(source.clone()), project.clone());
    let controller = Arc::new(controller);
    let handle = controller.clone().attach().unwrap();

    while let Some(event) = rx.recv().await {
        if matches!(
            event,
            ScanEvent::PhaseChanged {
                to: ScanPhase::Capturing,
                ..
            }
        ) {
            break;
        }
    }
    assert!(controller.cancel());

    let completion = handle.await.unwrap();
    assert_eq!(completion.error_kind(), Some(ScanErrorKind::Cancelled));
    assert_eq!(controller.phase(), ScanPhase::Cancelled);
    assert!(source.stop_calls() >= 1);
    assert_eq!(count_with_extension(project.dir(), "json"), 0);
    assert!(!project.combined_export_path().exists());

    // Cancel outside Capturing is ignored
    assert!(!controller.cancel());
}

#[tokio::test]
async fn test_cancel_after_capture_data_before_processing() {
    let temp = TempDir::new().unwrap();
    let project = test_project(&temp);
    let source = Arc::new(GatedSnapshotSource::new());

    let (controller, mut rx) =
        CaptureSessionController::new(ScanServices::new(source.clone()), project.clone());
    let controller = Arc::new(controller);
    let handle = controller.clone().attach().unwrap();

    // Capture has returned; the session is still Capturing while snapshotting
    source.snapshot_requested.notified().await;
    assert_eq!(controller.phase(), ScanPhase::Capturing);
    assert!(controller.cancel());
    source.release.notify_one();

    let completion = handle.await.unwrap();
    assert_eq!(completion.error_kind(), Some(ScanErrorKind::Cancelled));
    assert_eq!(controller.phase(), ScanPhase::Cancelled);
    assert_eq!(count_with_extension(project.dir(), "json"), 0);
    assert!(!project.combined_export_path().exists());

    let events = drain(&mut rx);
    assert!(!events
        .iter()
        .any(|e| matches!(e, ScanEvent::ProcessingStarted)));
    assert!(!events.iter().any(|e| matches!(
        e,
        ScanEvent::PhaseChanged {
            to: ScanPhase::Processing,
            ..
        }
    )));
}

#[tokio::test]
async fn test_detach_while_capturing_cancels() {
    let temp = TempDir::new().unwrap();
    let project = test_project(&temp);
    let source = Arc::new(ScriptedCaptureSource::pending());

    let (controller, mut rx) = CaptureSessionController::new(services(source.clone()), project.clone());
    let controller = Arc::new(controller);
    let handle = controller.clone().attach().unwrap();

    while let Some(event) = rx.recv().await {
        if event
            == (ScanEvent::PhaseChanged {
                from: ScanPhase::Relocalizing,
                to: ScanPhase::Capturing,
            })
        {
            break;
        }
    }
    controller.detach();

    let completion = handle.await.unwrap();
    assert_eq!(completion.error_kind(), Some(ScanErrorKind::Cancelled));
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_attach_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let project = test_project(&temp);
    let source = Arc::new(ScriptedCaptureSource::succeeding(rectangular_room(
        0.0, 0.0, 4.0, 3.0,
    )));

    let (controller, mut rx) = CaptureSessionController::new(services(source.clone()), project.clone());
    let controller = Arc::new(controller);

    let handle = controller.clone().attach().unwrap();
    assert!(controller.clone().attach().is_none());

    let completion = handle.await.unwrap();
    assert!(completion.is_success());
    assert!(controller.start().await.is_none());
    assert_eq!(source.capture_calls(), 1);

    let completed = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, ScanEvent::Completed(_)))
        .count();
    assert_eq!(completed, 1);
}

#[tokio::test]
async fn test_drop_stops_tracking_session() {
    let temp = TempDir::new().unwrap();
    let source = Arc::new(ScriptedCaptureSource::pending());
    let (controller, _rx) =
        CaptureSessionController::new(services(source.clone()), test_project(&temp));
    drop(controller);
    assert_eq!(source.stop_calls(), 1);
}

#[tokio::test]
async fn test_clear_after_scans_leaves_no_rooms() {
    let temp = TempDir::new().unwrap();
    let project = test_project(&temp);
    for min_x in [0.0, 4.0] {
        let source = Arc::new(ScriptedCaptureSource::succeeding(rectangular_room(
            min_x, 0.0, 4.0, 3.0,
        )));
        run_scan(services(source), &project).await;
    }

    let store = ProjectStore::new(temp.path(), ProjectLayout::default());
    assert_eq!(store.clear_artifacts(&project).await.unwrap(), 3);
    assert_eq!(count_with_extension(project.dir(), "json"), 0);
    assert_eq!(count_with_extension(project.dir(), "obj"), 0);
    assert!(ProjectRoomRepository::new()
        .list_all(&project)
        .await
        .unwrap()
        .is_empty());
}
