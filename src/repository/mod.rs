//! Room metadata persistence.
//!
//! Rooms live as `<identifier>.<metadata_ext>` files in the project
//! directory. The directory is the source of truth: every listing re-reads
//! it, so rooms dropped in by other tools are picked up on the next merge.

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{Result, ScanError};
use crate::model::Room;
use crate::project::{files, Project};

#[derive(Debug, Clone, Default)]
pub struct ProjectRoomRepository;

impl ProjectRoomRepository {
    pub fn new() -> Self {
        Self
    }

    /// Every decodable room in the project, ordered by `(created_at, identifier)`.
    ///
    /// A missing project directory yields an empty list. Files that fail to
    /// decode are logged and skipped.
    pub async fn list_all(&self, project: &Project) -> Result<Vec<Room>> {
        let mut rooms = Vec::new();
        let dir = project.dir();
        if !dir.is_dir() {
            return Ok(rooms);
        }

        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|e| ScanError::persistence("Failed to read project directory", e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ScanError::persistence("Failed to read project directory", e))?
        {
            let path = entry.path();
            if !path.is_file() || !project.is_metadata_file(&path) {
                continue;
            }
            match load_room(&path).await {
                Ok(room) => rooms.push(room),
                Err(e) => {
                    tracing::warn!("[repo] Skipping undecodable room {}: {}", path.display(), e);
                }
            }
        }

        rooms.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.identifier.cmp(&b.identifier))
        });
        tracing::debug!("[repo] Listed {} rooms in {}", rooms.len(), project.id());
        Ok(rooms)
    }

    /// Persist a room, creating the project directory if needed.
    pub async fn save(&self, project: &Project, room: &Room) -> Result<PathBuf> {
        project.ensure().await?;

        let path = project.room_metadata_path(&room.identifier);
        let json = serde_json::to_vec_pretty(room)?;
        files::write_atomic(&path, &json)
            .await
            .map_err(|e| ScanError::persistence("Failed to write room metadata", e))?;

        tracing::info!("[repo] Saved room {} to {}", room.identifier, path.display());
        Ok(path)
    }

    /// Number of decodable rooms in the project.
    pub async fn count(&self, project: &Project) -> Result<usize> {
        Ok(self.list_all(project).await?.len())
    }
}

/// Decode a single room metadata file.
pub async fn load_room(path: &Path) -> Result<Room> {
    let content = fs::read(path)
        .await
        .map_err(|e| ScanError::persistence("Failed to read room metadata", e))?;
    Ok(serde_json::from_slice(&content)?)
}
