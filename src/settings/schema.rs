//! Settings schema definitions for roomforge configuration.
//!
//! All settings structs use `#[serde(default)]` to allow partial configuration files.
//! Missing fields are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root settings structure.
///
/// Loaded from `~/.roomforge/settings.toml` with environment variable interpolation support.
/// Version field enables future migrations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomforgeSettings {
    /// Schema version for migrations
    pub version: u32,

    /// Where projects live and how their artifacts are named
    pub storage: StorageSettings,

    /// Room refinement (beautify) parameters
    pub processing: ProcessingSettings,

    /// Structure merge parameters
    pub merge: MergeSettings,

    /// World anchor persistence
    pub anchor: AnchorSettings,

    /// Log filtering
    pub logging: LoggingSettings,
}

/// Project directory layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Root directory holding one sub-directory per project.
    /// Accepts `$VAR` / `${VAR}` references.
    pub data_dir: PathBuf,

    /// File stem of the combined export (e.g. `MasterView`)
    pub combined_file_stem: String,

    /// Extension of exported 3D models
    pub export_extension: String,

    /// Extension of per-room metadata files
    pub metadata_extension: String,

    /// File name of the world anchor snapshot
    pub anchor_file_name: String,
}

/// Beautify pass configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    /// Run the beautify normalization (snapping, rounding)
    pub beautify: bool,

    /// Walls/objects within this many degrees of the dominant axis are snapped to it
    pub angle_snap_degrees: f64,

    /// Detections below this confidence are dropped: "low" | "medium" | "high"
    pub min_confidence: String,

    /// Coordinate rounding step in metres
    pub rounding_step: f64,
}

/// Structure merge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSettings {
    /// Maximum distance in metres between two walls considered the same wall
    pub stitch_distance: f64,

    /// Maximum angle in degrees between two walls considered the same wall
    pub stitch_angle_degrees: f64,

    /// Fraction of the smaller room footprint two rooms may overlap before
    /// the merge is rejected as geometrically inconsistent
    pub max_footprint_overlap: f64,
}

/// World anchor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorSettings {
    /// Seed new capture sessions with the stored snapshot
    pub relocalize: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level for the `roomforge` target when `--verbose` is not set
    pub level: String,
}

// =============================================================================
// Default implementations
// =============================================================================

impl Default for RoomforgeSettings {
    fn default() -> Self {
        Self {
            version: 1,
            storage: StorageSettings::default(),
            processing: ProcessingSettings::default(),
            merge: MergeSettings::default(),
            anchor: AnchorSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".roomforge")
                .join("projects"),
            combined_file_stem: "MasterView".to_string(),
            export_extension: "obj".to_string(),
            metadata_extension: "json".to_string(),
            anchor_file_name: "WorldScan.map".to_string(),
        }
    }
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            beautify: true,
            angle_snap_degrees: 8.0,
            min_confidence: "low".to_string(),
            rounding_step: 0.001,
        }
    }
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            stitch_distance: 0.15,
            stitch_angle_degrees: 5.0,
            max_footprint_overlap: 0.5,
        }
    }
}

impl Default for AnchorSettings {
    fn default() -> Self {
        Self { relocalize: true }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
