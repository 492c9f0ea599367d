//! Crash-safe file writes shared by every artifact writer.
//!
//! Writers stage content in `<name>.tmp` next to the target, flush it, and
//! rename it over the target. A crash at any point leaves either the old
//! file, no file, or a stray `.tmp`; never a truncated artifact.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Extension used for staged writes.
pub const TEMP_EXTENSION: &str = "tmp";

/// `dir/name.ext` -> `dir/name.ext.tmp`
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(TEMP_EXTENSION);
    path.with_file_name(name)
}

/// Write `bytes` to `path` via a flushed temp file and a rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let temp = temp_path_for(path);
    let result = async {
        let mut file = fs::File::create(&temp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp, path).await
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&temp).await;
    }
    result
}

/// Copy `source` to `dest` so that `dest` either appears complete or not at all.
pub async fn copy_atomic(source: &Path, dest: &Path) -> io::Result<u64> {
    let temp = temp_path_for(dest);
    let result = async {
        let copied = fs::copy(source, &temp).await?;
        fs::File::open(&temp).await?.sync_all().await?;
        fs::rename(&temp, dest).await?;
        Ok::<u64, io::Error>(copied)
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&temp).await;
    }
    result
}

/// Remove a file, treating "already gone" as success.
pub async fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
