//! Project directory bookkeeping and artifact management.

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs;
use uuid::Uuid;

use super::files;
use super::viewer::ModelViewer;
use super::{Project, ProjectLayout, IMPORT_PROJECT_PREFIX, SCAN_PROJECT_PREFIX};
use crate::error::{Result, ScanError};
use crate::model::Room;
use crate::paths::normalize_external_path;
use crate::repository::{load_room, ProjectRoomRepository};
use crate::settings::StorageSettings;

/// A project directory as seen by a listing.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub id: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// A combined export or imported model inside a project.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactEntry {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// Creation time, falling back to modification time, then the epoch floor.
fn file_time(metadata: &Metadata) -> DateTime<Utc> {
    pick_file_time(metadata.created(), || metadata.modified())
}

fn pick_file_time(
    created: io::Result<SystemTime>,
    modified: impl FnOnce() -> io::Result<SystemTime>,
) -> DateTime<Utc> {
    created
        .or_else(|_| modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Newest first; equal timestamps fall back to file name.
fn sort_newest_first(artifacts: &mut [ArtifactEntry]) {
    artifacts.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.name.cmp(&b.name))
    });
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Access to all projects under one data directory.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    data_dir: PathBuf,
    layout: ProjectLayout,
    rooms: ProjectRoomRepository,
}

impl ProjectStore {
    pub fn new(data_dir: impl Into<PathBuf>, layout: ProjectLayout) -> Self {
        Self {
            data_dir: data_dir.into(),
            layout,
            rooms: ProjectRoomRepository::new(),
        }
    }

    pub fn from_settings(settings: &StorageSettings) -> Self {
        Self::new(settings.data_dir.clone(), ProjectLayout::from(settings))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Address an existing or future project by id.
    pub fn project(&self, id: &str) -> Result<Project> {
        Project::new(&self.data_dir, id, self.layout.clone())
    }

    /// Turn user input (`file://` URI, absolute or data-dir relative path)
    /// into a filesystem path.
    pub fn resolve(&self, input: &str) -> PathBuf {
        normalize_external_path(input, &self.data_dir)
    }

    // =========================================================================
    // Projects
    // =========================================================================

    /// Non-hidden project directories, newest first.
    pub async fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        let mut projects = Vec::new();
        if !self.data_dir.is_dir() {
            return Ok(projects);
        }

        let mut entries = fs::read_dir(&self.data_dir)
            .await
            .map_err(|e| ScanError::persistence("Failed to read data directory", e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ScanError::persistence("Failed to read data directory", e))?
        {
            let id = entry.file_name().to_string_lossy().into_owned();
            if id.starts_with('.') {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_dir() => m,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!("[project] Cannot stat {}: {}", id, e);
                    continue;
                }
            };
            projects.push(ProjectSummary {
                path: entry.path(),
                created_at: file_time(&metadata),
                id,
            });
        }

        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(projects)
    }

    /// Create a fresh `Room_<millis>` project directory.
    pub async fn create_project(&self) -> Result<Project> {
        self.create_unique(SCAN_PROJECT_PREFIX).await
    }

    async fn create_unique(&self, prefix: &str) -> Result<Project> {
        let mut millis = Utc::now().timestamp_millis();
        let project = loop {
            let candidate = self.project(&Project::timestamped_id(prefix, millis))?;
            if !candidate.dir().exists() {
                break candidate;
            }
            millis += 1;
        };

        project.ensure().await?;
        tracing::info!("[project] Created project {}", project.id());
        Ok(project)
    }

    /// Remove a project directory and everything in it.
    pub async fn delete_project(&self, id: &str) -> Result<bool> {
        let project = self.project(id)?;
        match fs::remove_dir_all(project.dir()).await {
            Ok(()) => {
                tracing::info!("[project] Deleted project {}", id);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ScanError::persistence("Failed to delete project", e)),
        }
    }

    /// Number of decodable rooms in the project.
    pub async fn room_count(&self, project: &Project) -> Result<usize> {
        self.rooms.count(project).await
    }

    /// Decodable rooms in the project, oldest first.
    pub async fn rooms(&self, project: &Project) -> Result<Vec<Room>> {
        self.rooms.list_all(project).await
    }

    // =========================================================================
    // Artifacts
    // =========================================================================

    /// Export-format files in the project, newest first, then by name.
    pub async fn list_artifacts(&self, project: &Project) -> Result<Vec<ArtifactEntry>> {
        let mut artifacts = Vec::new();
        if !project.exists() {
            return Ok(artifacts);
        }

        let mut entries = fs::read_dir(project.dir())
            .await
            .map_err(|e| ScanError::persistence("Failed to read project directory", e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ScanError::persistence("Failed to read project directory", e))?
        {
            let path = entry.path();
            if !project.is_export_file(&path) {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            artifacts.push(ArtifactEntry {
                name: file_name_of(&path),
                size: metadata.len(),
                created_at: file_time(&metadata),
                path,
            });
        }

        sort_newest_first(&mut artifacts);
        Ok(artifacts)
    }

    /// Delete every export and metadata file in the project, plus any
    /// staged `.tmp` leftovers. Returns the number of files removed.
    pub async fn clear_artifacts(&self, project: &Project) -> Result<usize> {
        if !project.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        let mut entries = fs::read_dir(project.dir())
            .await
            .map_err(|e| ScanError::persistence("Failed to read project directory", e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ScanError::persistence("Failed to read project directory", e))?
        {
            let path = entry.path();
            let staged = path
                .extension()
                .is_some_and(|e| e == files::TEMP_EXTENSION);
            if !(project.is_export_file(&path) || project.is_metadata_file(&path) || staged) {
                continue;
            }
            if files::remove_if_exists(&path)
                .await
                .map_err(|e| ScanError::persistence("Failed to remove artifact", e))?
            {
                removed += 1;
            }
        }

        tracing::info!("[project] Cleared {} artifacts from {}", removed, project.id());
        Ok(removed)
    }

    /// Copy an external model into the project as `<uuid>.<ext>`.
    ///
    /// Returns `Ok(None)` without touching the project when the source
    /// does not exist.
    pub async fn import_artifact(&self, project: &Project, source: &str) -> Result<Option<PathBuf>> {
        let source = self.resolve(source);
        if !source.is_file() {
            tracing::warn!("[project] Import source {} not found", source.display());
            return Ok(None);
        }

        let extension = source
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.layout.export_extension.clone());
        project.ensure().await?;
        let dest = project.dir().join(format!("{}.{}", Uuid::new_v4(), extension));

        let bytes = files::copy_atomic(&source, &dest)
            .await
            .map_err(|e| ScanError::persistence("Failed to import artifact", e))?;
        tracing::info!(
            "[project] Imported {} into {} ({} bytes)",
            source.display(),
            dest.display(),
            bytes
        );
        Ok(Some(dest))
    }

    /// Create an `Import_<millis>` project whose combined export is a copy
    /// of `source`.
    pub async fn import_as_new_project(&self, source: &str) -> Result<Option<Project>> {
        let source = self.resolve(source);
        if !source.is_file() {
            tracing::warn!("[project] Import source {} not found", source.display());
            return Ok(None);
        }

        let project = self.create_unique(IMPORT_PROJECT_PREFIX).await?;
        files::copy_atomic(&source, &project.combined_export_path())
            .await
            .map_err(|e| ScanError::persistence("Failed to import model", e))?;
        tracing::info!(
            "[project] Imported {} as project {}",
            source.display(),
            project.id()
        );
        Ok(Some(project))
    }

    /// Read a room metadata file given as a `file://` URI or a path.
    pub async fn read_room_metadata(&self, input: &str) -> Result<Option<Room>> {
        let path = self.resolve(input);
        if !path.is_file() {
            tracing::debug!("[project] Room metadata {} not found", path.display());
            return Ok(None);
        }
        load_room(&path).await.map(Some)
    }

    /// Hand a model file to `viewer`. Returns `false` when the file is
    /// missing, empty, or the viewer fails.
    pub async fn preview(&self, input: &str, viewer: &dyn ModelViewer) -> bool {
        let path = self.resolve(input);
        match fs::metadata(&path).await {
            Ok(m) if m.is_file() && m.len() > 0 => {}
            Ok(_) => {
                tracing::warn!("[project] Preview target {} is empty", path.display());
                return false;
            }
            Err(e) => {
                tracing::warn!("[project] Preview target {} unavailable: {}", path.display(), e);
                return false;
            }
        }

        match viewer.open(&path).await {
            Ok(()) => {
                tracing::info!("[project] Opened {} with {}", path.display(), viewer.description());
                true
            }
            Err(e) => {
                tracing::warn!("[project] {} failed to open {}: {}", viewer.description(), path.display(), e);
                false
            }
        }
    }
}
