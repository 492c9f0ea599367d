//! Raw capture data -> structured [`Room`].
//!
//! Refinement is CPU-bound, so [`RoomProcessor`] moves it off the async
//! runtime with `spawn_blocking`. The refinement itself sits behind
//! [`RoomBuilder`] so platform implementations can replace it.

mod beautify;

use std::sync::Arc;

use crate::capture::RawCaptureData;
use crate::error::{Result, ScanError};
use crate::model::Room;

pub use beautify::{BeautifyConfig, BeautifyRoomBuilder};

/// Turns one raw capture into a room.
pub trait RoomBuilder: Send + Sync + 'static {
    /// Errors are surfaced to the user as `ProcessingFailed`.
    fn build(&self, raw: &RawCaptureData) -> std::result::Result<Room, String>;

    fn description(&self) -> String;
}

/// Runs a [`RoomBuilder`] on the blocking thread pool.
#[derive(Clone)]
pub struct RoomProcessor {
    builder: Arc<dyn RoomBuilder>,
}

impl RoomProcessor {
    pub fn new(builder: Arc<dyn RoomBuilder>) -> Self {
        Self { builder }
    }

    pub fn builder_description(&self) -> String {
        self.builder.description()
    }

    pub async fn process(&self, raw: RawCaptureData) -> Result<Room> {
        let builder = self.builder.clone();
        let surfaces = raw.surfaces.len();
        tracing::debug!(
            "[scan] Processing {} surfaces, {} objects with {}",
            surfaces,
            raw.objects.len(),
            builder.description()
        );

        let room = tokio::task::spawn_blocking(move || builder.build(&raw))
            .await
            .map_err(|e| ScanError::ProcessingFailed(format!("processing task failed: {}", e)))?
            .map_err(ScanError::ProcessingFailed)?;

        tracing::info!(
            "[scan] Processed room {}: {} walls, {} objects",
            room.identifier,
            room.geometry.walls.len(),
            room.geometry.objects.len()
        );
        Ok(room)
    }
}

impl Default for RoomProcessor {
    fn default() -> Self {
        Self::new(Arc::new(BeautifyRoomBuilder::default()))
    }
}
