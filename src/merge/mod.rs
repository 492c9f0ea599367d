//! Combining a project's rooms into one structure and exporting it.
//!
//! The structure is a materialized view: it is recomputed from every room
//! on disk after each scan and the combined export is overwritten. Merge
//! and export for one project never run concurrently; callers hold the
//! guard from [`StructureMerger::lock_project`] across list, merge and
//! export.
//!
//! When the builder rejects a set of rooms, the merger falls back to the
//! most recently created room so the user still gets a combined artifact.

mod obj;
mod stitch;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::{Result, ScanError};
use crate::model::{Room, Structure};
use crate::project::{files, Project};
use crate::repository::ProjectRoomRepository;

pub use obj::{ModelExporter, ObjExporter};
pub use stitch::{MergeError, StitchConfig, StitchingStructureBuilder, StructureBuilder};

/// What a merge produced.
#[derive(Debug, Clone)]
pub enum MergeOutcome {
    /// No rooms; nothing to export
    Empty,
    /// Exactly one room, exported as-is
    SingleRoom(Room),
    Structure(Structure),
    /// The builder failed; only the latest room is exported
    Fallback { room: Room, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcomeKind {
    Empty,
    SingleRoom,
    Structure,
    Fallback,
}

impl MergeOutcome {
    pub fn kind(&self) -> MergeOutcomeKind {
        match self {
            MergeOutcome::Empty => MergeOutcomeKind::Empty,
            MergeOutcome::SingleRoom(_) => MergeOutcomeKind::SingleRoom,
            MergeOutcome::Structure(_) => MergeOutcomeKind::Structure,
            MergeOutcome::Fallback { .. } => MergeOutcomeKind::Fallback,
        }
    }

    /// The structure to export, if any.
    pub fn to_structure(&self) -> Option<Structure> {
        match self {
            MergeOutcome::Empty => None,
            MergeOutcome::SingleRoom(room) | MergeOutcome::Fallback { room, .. } => {
                Some(Structure::single(room))
            }
            MergeOutcome::Structure(structure) => Some(structure.clone()),
        }
    }
}

/// Summary of a [`StructureMerger::rebuild`] run.
#[derive(Debug, Clone, Serialize)]
pub struct RebuildReport {
    pub project_id: String,
    pub room_count: usize,
    pub outcome: MergeOutcomeKind,
    pub combined_artifact_path: Option<PathBuf>,
}

pub struct StructureMerger {
    builder: Arc<dyn StructureBuilder>,
    exporter: Arc<dyn ModelExporter>,
    repository: ProjectRoomRepository,
    locks: parking_lot::Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl StructureMerger {
    pub fn new(builder: Arc<dyn StructureBuilder>, exporter: Arc<dyn ModelExporter>) -> Self {
        Self {
            builder,
            exporter,
            repository: ProjectRoomRepository::new(),
            locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn exporter(&self) -> &dyn ModelExporter {
        self.exporter.as_ref()
    }

    /// Serialize merge/export for one project. Held until the guard drops.
    pub async fn lock_project(&self, project_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .lock()
            .entry(project_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Merge rooms into a structure, falling back to the latest room when
    /// the builder rejects them.
    pub fn merge(&self, rooms: &[Room]) -> MergeOutcome {
        match rooms {
            [] => MergeOutcome::Empty,
            [room] => MergeOutcome::SingleRoom(room.clone()),
            _ => match self.builder.build(rooms) {
                Ok(structure) => {
                    tracing::info!(
                        "[merge] Built structure from {} rooms with {}",
                        rooms.len(),
                        self.builder.description()
                    );
                    MergeOutcome::Structure(structure)
                }
                Err(e) => {
                    // max_by_key returns the last of equal maxima
                    let latest = rooms.iter().max_by_key(|r| r.created_at);
                    match latest {
                        Some(room) => {
                            tracing::warn!(
                                "[merge] fallback: {} (exporting latest room {} of {})",
                                e,
                                room.identifier,
                                rooms.len()
                            );
                            MergeOutcome::Fallback {
                                room: room.clone(),
                                reason: ScanError::MergeFailed(e.to_string()).to_string(),
                            }
                        }
                        None => MergeOutcome::Empty,
                    }
                }
            },
        }
    }

    /// Write the outcome to `target`. `Empty` leaves `target` untouched.
    pub async fn export(&self, outcome: &MergeOutcome, target: &Path) -> Result<Option<PathBuf>> {
        let Some(structure) = outcome.to_structure() else {
            tracing::debug!("[merge] Nothing to export for {}", target.display());
            return Ok(None);
        };

        let bytes = self.exporter.encode(&structure)?;
        files::remove_if_exists(target)
            .await
            .map_err(|e| ScanError::persistence("Failed to remove previous combined export", e))?;
        files::write_atomic(target, &bytes)
            .await
            .map_err(|e| ScanError::persistence("Failed to write combined export", e))?;

        tracing::info!(
            "[merge] Exported {} rooms ({} bytes) to {}",
            structure.rooms.len(),
            bytes.len(),
            target.display()
        );
        Ok(Some(target.to_path_buf()))
    }

    /// Recompute and re-export a project's structure from disk.
    pub async fn rebuild(&self, project: &Project) -> Result<RebuildReport> {
        let _guard = self.lock_project(project.id()).await;

        let rooms = self.repository.list_all(project).await?;
        let outcome = self.merge(&rooms);
        let path = self
            .export(&outcome, &project.combined_export_path())
            .await?;

        Ok(RebuildReport {
            project_id: project.id().to_string(),
            room_count: rooms.len(),
            outcome: outcome.kind(),
            combined_artifact_path: path,
        })
    }
}

impl Default for StructureMerger {
    fn default() -> Self {
        Self::new(
            Arc::new(StitchingStructureBuilder::default()),
            Arc::new(ObjExporter::new()),
        )
    }
}
