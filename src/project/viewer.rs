//! Handing combined exports to an external viewer.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{Result, ScanError};

/// Something that can display a model file.
#[async_trait]
pub trait ModelViewer: Send + Sync {
    async fn open(&self, path: &Path) -> Result<()>;

    fn description(&self) -> String;
}

/// Opens files with the desktop's default application.
#[derive(Debug, Clone, Default)]
pub struct SystemViewer;

impl SystemViewer {
    fn command(path: &Path) -> Command {
        if cfg!(target_os = "macos") {
            let mut cmd = Command::new("open");
            cmd.arg(path);
            cmd
        } else if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", ""]).arg(path);
            cmd
        } else {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(path);
            cmd
        }
    }
}

#[async_trait]
impl ModelViewer for SystemViewer {
    async fn open(&self, path: &Path) -> Result<()> {
        let status = Self::command(path)
            .status()
            .await
            .map_err(|e| ScanError::persistence("Failed to launch viewer", e))?;

        if !status.success() {
            return Err(ScanError::persistence(
                "Viewer exited with an error",
                std::io::Error::new(std::io::ErrorKind::Other, status.to_string()),
            ));
        }
        Ok(())
    }

    fn description(&self) -> String {
        "System default viewer".to_string()
    }
}
