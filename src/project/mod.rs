//! Projects and their on-disk layout.
//!
//! Each project is a directory under the configured data directory:
//!
//! ```text
//! <data_dir>/<project_id>/
//!   <room-uuid>.json     # one per processed room
//!   WorldScan.map        # world anchor snapshot (optional)
//!   MasterView.obj       # combined export (optional)
//! ```

pub mod files;
mod store;
mod viewer;

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{Result, ScanError};
use crate::settings::StorageSettings;

pub use store::{ArtifactEntry, ProjectStore, ProjectSummary};
pub use viewer::{ModelViewer, SystemViewer};

/// Prefix of project ids created for new scans.
pub const SCAN_PROJECT_PREFIX: &str = "Room";
/// Prefix of project ids created by importing an external model.
pub const IMPORT_PROJECT_PREFIX: &str = "Import";

/// File naming inside a project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub combined_file_stem: String,
    pub export_extension: String,
    pub metadata_extension: String,
    pub anchor_file_name: String,
}

impl From<&StorageSettings> for ProjectLayout {
    fn from(settings: &StorageSettings) -> Self {
        Self {
            combined_file_stem: settings.combined_file_stem.clone(),
            export_extension: settings.export_extension.clone(),
            metadata_extension: settings.metadata_extension.clone(),
            anchor_file_name: settings.anchor_file_name.clone(),
        }
    }
}

impl Default for ProjectLayout {
    fn default() -> Self {
        Self::from(&StorageSettings::default())
    }
}

impl ProjectLayout {
    pub fn combined_file_name(&self) -> String {
        format!("{}.{}", self.combined_file_stem, self.export_extension)
    }
}

/// A project directory and its naming rules.
#[derive(Debug, Clone)]
pub struct Project {
    id: String,
    dir: PathBuf,
    layout: ProjectLayout,
}

impl Project {
    /// Address a project under `data_dir`. Does not touch the filesystem.
    pub fn new(data_dir: &Path, id: impl Into<String>, layout: ProjectLayout) -> Result<Self> {
        let id = id.into();
        validate_project_id(&id)?;
        Ok(Self {
            dir: data_dir.join(&id),
            id,
            layout,
        })
    }

    /// Id such as `Room_1700000000000` for a prefix and a unix-millis stamp.
    pub fn timestamped_id(prefix: &str, millis: i64) -> String {
        format!("{}_{}", prefix, millis)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn exists(&self) -> bool {
        self.dir.is_dir()
    }

    pub fn combined_export_path(&self) -> PathBuf {
        self.dir.join(self.layout.combined_file_name())
    }

    pub fn anchor_path(&self) -> PathBuf {
        self.dir.join(&self.layout.anchor_file_name)
    }

    pub fn room_metadata_path(&self, identifier: &Uuid) -> PathBuf {
        self.dir
            .join(format!("{}.{}", identifier, self.layout.metadata_extension))
    }

    pub fn is_metadata_file(&self, path: &Path) -> bool {
        has_extension(path, &self.layout.metadata_extension)
    }

    pub fn is_export_file(&self, path: &Path) -> bool {
        has_extension(path, &self.layout.export_extension)
    }

    /// Create the project directory if it does not exist yet.
    pub async fn ensure(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ScanError::persistence("Failed to create project directory", e))
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

fn validate_project_id(id: &str) -> Result<()> {
    let invalid = id.is_empty()
        || id.starts_with('.')
        || id.contains(['/', '\\', '\0'])
        || id.trim() != id;
    if invalid {
        return Err(ScanError::InvalidProject(id.to_string()));
    }
    Ok(())
}
