use std::sync::Arc;

use crate::anchor::WorldAnchorStore;
use crate::capture::RawCaptureSource;
use crate::merge::{ObjExporter, StitchConfig, StitchingStructureBuilder, StructureMerger};
use crate::processor::{BeautifyConfig, BeautifyRoomBuilder, RoomProcessor};
use crate::project::ProjectStore;
use crate::session::ScanServices;
use crate::settings::{RoomforgeSettings, SettingsManager};

/// Long-lived services, built once from settings.
pub struct AppState {
    pub settings: Arc<SettingsManager>,
    pub store: ProjectStore,
    pub processor: RoomProcessor,
    pub merger: Arc<StructureMerger>,
    pub anchors: WorldAnchorStore,
    relocalize: bool,
}

impl AppState {
    pub async fn new(settings: Arc<SettingsManager>) -> Self {
        let current = settings.get().await;
        Self::with_settings(settings, &current)
    }

    pub fn with_settings(manager: Arc<SettingsManager>, settings: &RoomforgeSettings) -> Self {
        let processor = RoomProcessor::new(Arc::new(BeautifyRoomBuilder::new(
            BeautifyConfig::from(&settings.processing),
        )));
        let merger = StructureMerger::new(
            Arc::new(StitchingStructureBuilder::new(StitchConfig::from(
                &settings.merge,
            ))),
            Arc::new(ObjExporter::new()),
        );

        let exported = merger.exporter().extension();
        if !exported.eq_ignore_ascii_case(&settings.storage.export_extension) {
            tracing::warn!(
                "[state] storage.export_extension is '{}' but the exporter writes '{}' files",
                settings.storage.export_extension,
                exported
            );
        }

        tracing::debug!(
            "[state] Data directory {}, processing with {}",
            settings.storage.data_dir.display(),
            processor.builder_description()
        );

        Self {
            settings: manager,
            store: ProjectStore::from_settings(&settings.storage),
            processor,
            merger: Arc::new(merger),
            anchors: WorldAnchorStore::new(),
            relocalize: settings.anchor.relocalize,
        }
    }

    /// Services for one scan using `capture` as the platform source.
    pub fn scan_services(&self, capture: Arc<dyn RawCaptureSource>) -> ScanServices {
        ScanServices {
            capture,
            processor: self.processor.clone(),
            repository: Default::default(),
            merger: self.merger.clone(),
            anchors: self.anchors.clone(),
            relocalize: self.relocalize,
            coaching_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{rectangular_room, ScriptedCaptureSource};
    use crate::session::CaptureSessionController;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_state_uses_configured_data_dir() {
        let temp = TempDir::new().unwrap();
        let manager = Arc::new(
            SettingsManager::with_path(temp.path().join("settings.toml"))
                .await
                .unwrap(),
        );
        let mut settings = manager.get().await;
        settings.storage.data_dir = temp.path().join("data");
        settings.anchor.relocalize = false;

        let state = AppState::with_settings(manager, &settings);
        assert_eq!(state.store.data_dir(), temp.path().join("data"));

        let project = state.store.create_project().await.unwrap();
        let source = Arc::new(ScriptedCaptureSource::succeeding(rectangular_room(
            0.0, 0.0, 4.0, 3.0,
        )));
        let services = state.scan_services(source);
        assert!(!services.relocalize);

        let (controller, _rx) = CaptureSessionController::new(services, project.clone());
        let completion = controller.start().await.unwrap();
        assert!(completion.is_success());
        assert_eq!(state.store.room_count(&project).await.unwrap(), 1);
    }
}
