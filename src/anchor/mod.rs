//! World anchor persistence.
//!
//! One snapshot slot per project. Saving overwrites the slot; snapshots
//! with no feature points are refused so a bad capture never replaces a
//! usable anchor.
//!
//! ## File Format
//!
//! ```text
//! offset  size  field
//! 0       4     magic "RFWM"
//! 4       4     format version (u32, little endian)
//! 8       8     feature point count (u64, little endian)
//! 16      8     payload length (u64, little endian)
//! 24      n     payload (opaque)
//! ```

use std::path::PathBuf;

use crate::capture::WorldSnapshot;
use crate::error::{Result, ScanError};
use crate::project::{files, Project};

const MAGIC: &[u8; 4] = b"RFWM";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 24;

/// Result of a save request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorSaveOutcome {
    Saved(PathBuf),
    /// Snapshot had zero feature points; the stored anchor is unchanged
    SkippedDegenerate,
}

#[derive(Debug, Clone, Default)]
pub struct WorldAnchorStore;

impl WorldAnchorStore {
    pub fn new() -> Self {
        Self
    }

    /// Load the project's anchor. A missing file is not an error.
    pub async fn load(&self, project: &Project) -> Result<Option<WorldSnapshot>> {
        let path = project.anchor_path();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("[anchor] No anchor for {}", project.id());
                return Ok(None);
            }
            Err(e) => return Err(ScanError::persistence("Failed to read world anchor", e)),
        };

        let snapshot = decode(&bytes)?;
        tracing::info!(
            "[anchor] Loaded anchor for {} ({} feature points)",
            project.id(),
            snapshot.feature_point_count
        );
        Ok(Some(snapshot))
    }

    /// Store `snapshot` as the project's anchor, unless it is degenerate.
    pub async fn save(
        &self,
        project: &Project,
        snapshot: &WorldSnapshot,
    ) -> Result<AnchorSaveOutcome> {
        if snapshot.is_degenerate() {
            tracing::warn!(
                "[anchor] Snapshot for {} has no feature points, keeping previous anchor",
                project.id()
            );
            return Ok(AnchorSaveOutcome::SkippedDegenerate);
        }

        project.ensure().await?;
        let path = project.anchor_path();
        files::write_atomic(&path, &encode(snapshot))
            .await
            .map_err(|e| ScanError::persistence("Failed to write world anchor", e))?;

        tracing::info!(
            "[anchor] Saved anchor for {} ({} feature points, {} bytes)",
            project.id(),
            snapshot.feature_point_count,
            snapshot.data.len()
        );
        Ok(AnchorSaveOutcome::Saved(path))
    }
}

fn encode(snapshot: &WorldSnapshot) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + snapshot.data.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&snapshot.feature_point_count.to_le_bytes());
    out.extend_from_slice(&(snapshot.data.len() as u64).to_le_bytes());
    out.extend_from_slice(&snapshot.data);
    out
}

fn decode(bytes: &[u8]) -> Result<WorldSnapshot> {
    if bytes.len() < HEADER_LEN {
        return Err(ScanError::Encoding("world anchor header truncated".into()));
    }
    let (header, payload) = bytes.split_at(HEADER_LEN);
    if &header[0..4] != MAGIC {
        return Err(ScanError::Encoding("not a world anchor file".into()));
    }

    let version = u32::from_le_bytes(le_array(&header[4..8]));
    if version != FORMAT_VERSION {
        return Err(ScanError::Encoding(format!(
            "unsupported world anchor version {}",
            version
        )));
    }

    let feature_point_count = u64::from_le_bytes(le_array(&header[8..16]));
    let payload_len = u64::from_le_bytes(le_array(&header[16..24]));
    if payload.len() as u64 != payload_len {
        return Err(ScanError::Encoding(format!(
            "world anchor payload is {} bytes, header says {}",
            payload.len(),
            payload_len
        )));
    }

    Ok(WorldSnapshot::new(payload.to_vec(), feature_point_count))
}

fn le_array<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    out
}
