//! Drives one scan from relocalization to a combined export.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::events::{ScanCompletion, ScanEvent};
use super::phase::ScanPhase;
use crate::anchor::WorldAnchorStore;
use crate::capture::{CaptureConfig, CaptureError, RawCaptureSource, WorldSnapshot};
use crate::error::{Result, ScanError};
use crate::merge::StructureMerger;
use crate::processor::RoomProcessor;
use crate::project::Project;
use crate::repository::ProjectRoomRepository;

/// Everything a scan needs, shared between sessions.
#[derive(Clone)]
pub struct ScanServices {
    pub capture: Arc<dyn RawCaptureSource>,
    pub processor: RoomProcessor,
    pub repository: ProjectRoomRepository,
    pub merger: Arc<StructureMerger>,
    pub anchors: WorldAnchorStore,
    /// Seed captures with the project's stored anchor
    pub relocalize: bool,
    pub coaching_enabled: bool,
}

impl ScanServices {
    /// Default processing and merge stack around a capture source.
    pub fn new(capture: Arc<dyn RawCaptureSource>) -> Self {
        Self {
            capture,
            processor: RoomProcessor::default(),
            repository: ProjectRoomRepository::new(),
            merger: Arc::new(StructureMerger::default()),
            anchors: WorldAnchorStore::new(),
            relocalize: true,
            coaching_enabled: true,
        }
    }
}

/// One scan session for one project.
///
/// Progress is reported on the channel returned from [`new`](Self::new).
/// The session runs at most once, either inline via [`start`](Self::start)
/// or on the runtime via [`attach`](Self::attach).
pub struct CaptureSessionController {
    id: Uuid,
    services: ScanServices,
    project: Project,
    phase: Mutex<ScanPhase>,
    started: AtomicBool,
    attached: AtomicBool,
    cancel_requested: AtomicBool,
    cancel_signal: Notify,
    events: mpsc::UnboundedSender<ScanEvent>,
}

impl CaptureSessionController {
    pub fn new(
        services: ScanServices,
        project: Project,
    ) -> (Self, mpsc::UnboundedReceiver<ScanEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let controller = Self {
            id: Uuid::new_v4(),
            services,
            project,
            phase: Mutex::new(ScanPhase::Idle),
            started: AtomicBool::new(false),
            attached: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
            cancel_signal: Notify::new(),
            events,
        };
        (controller, receiver)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn phase(&self) -> ScanPhase {
        *self.phase.lock()
    }

    /// Spawn the scan on the tokio runtime. Only the first call does
    /// anything; later calls return `None`.
    pub fn attach(self: Arc<Self>) -> Option<JoinHandle<ScanCompletion>> {
        if self.attached.swap(true, Ordering::SeqCst) {
            tracing::debug!("[scan] Session {} already attached", self.id);
            return None;
        }

        Some(tokio::spawn(async move {
            match self.start().await {
                Some(completion) => completion,
                None => ScanCompletion::failure(&ScanError::AlreadyStarted),
            }
        }))
    }

    /// Stop the tracking session; cancels the scan if it is still capturing.
    pub fn detach(&self) {
        tracing::debug!("[scan] Detaching session {}", self.id);
        self.cancel();
        self.services.capture.stop();
    }

    /// Request cancellation. Only honored while capturing.
    pub fn cancel(&self) -> bool {
        {
            // Checked and set under the phase lock; see `leave_capturing`
            let phase = self.phase.lock();
            if *phase != ScanPhase::Capturing {
                tracing::debug!(
                    "[scan] Ignoring cancel for session {} in phase {}",
                    self.id,
                    *phase
                );
                return false;
            }
            self.cancel_requested.store(true, Ordering::SeqCst);
        }
        tracing::info!("[scan] Cancelling session {}", self.id);
        self.cancel_signal.notify_one();
        true
    }

    /// Run the scan to completion. Returns `None` if this session was
    /// already started.
    pub async fn start(&self) -> Option<ScanCompletion> {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::warn!("[scan] Session {} already started", self.id);
            return None;
        }

        tracing::info!(
            "[scan] Session {} starting for project {} with {}",
            self.id,
            self.project.id(),
            self.services.capture.description()
        );

        let completion = match self.run().await {
            Ok(completion) => {
                self.transition(ScanPhase::Completed);
                tracing::info!(
                    "[scan] Session {} completed, project {} has {} rooms",
                    self.id,
                    self.project.id(),
                    completion.total_room_count().unwrap_or(0)
                );
                completion
            }
            Err(ScanError::Cancelled) => {
                self.transition(ScanPhase::Cancelled);
                ScanCompletion::failure(&ScanError::Cancelled)
            }
            Err(e) => {
                tracing::error!("[scan] Session {} failed: {}", self.id, e);
                self.transition(ScanPhase::Errored);
                ScanCompletion::failure(&e)
            }
        };

        self.emit(ScanEvent::Completed(completion.clone()));
        Some(completion)
    }

    async fn run(&self) -> Result<ScanCompletion> {
        self.transition(ScanPhase::Relocalizing);
        self.project.ensure().await?;
        let initial_world = self.load_anchor().await;

        let capability = self.services.capture.capability();
        if !capability.available {
            return Err(ScanError::CapabilityUnavailable(
                capability
                    .reason
                    .unwrap_or_else(|| "device not supported".to_string()),
            ));
        }

        self.transition(ScanPhase::Capturing);
        let config = CaptureConfig {
            initial_world,
            coaching_enabled: self.services.coaching_enabled,
        };
        let capture = self.services.capture.clone();
        let raw = tokio::select! {
            result = capture.capture(config) => result,
            _ = self.cancel_signal.notified() => Err(CaptureError::Stopped),
        };

        let raw = match raw {
            _ if self.cancel_requested.load(Ordering::SeqCst) => {
                self.services.capture.stop();
                return Err(ScanError::Cancelled);
            }
            Ok(raw) => raw,
            Err(e) => {
                self.services.capture.stop();
                return Err(ScanError::CaptureAborted(e.to_string()));
            }
        };

        // The tracking session must still be live for the snapshot
        let snapshot = match self.services.capture.world_snapshot().await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!("[scan] No world snapshot for session {}: {}", self.id, e);
                None
            }
        };
        self.services.capture.stop();

        if !self.leave_capturing() {
            return Err(ScanError::Cancelled);
        }
        self.emit(ScanEvent::ProcessingStarted);
        let room = self.services.processor.process(raw).await?;
        let room_path = self.services.repository.save(&self.project, &room).await?;

        self.transition(ScanPhase::Merging);
        let (combined, total) = {
            let _guard = self.services.merger.lock_project(self.project.id()).await;
            let rooms = self.services.repository.list_all(&self.project).await?;
            let outcome = self.services.merger.merge(&rooms);

            self.transition(ScanPhase::Exporting);
            let combined = self
                .services
                .merger
                .export(&outcome, &self.project.combined_export_path())
                .await?;
            (combined, rooms.len())
        };

        self.save_anchor(snapshot).await?;
        Ok(ScanCompletion::success(combined, room_path, total))
    }

    async fn load_anchor(&self) -> Option<WorldSnapshot> {
        if !self.services.relocalize {
            return None;
        }
        match self.services.anchors.load(&self.project).await {
            Ok(anchor) => anchor,
            Err(e) => {
                tracing::warn!(
                    "[scan] Ignoring unreadable anchor for {}: {}",
                    self.project.id(),
                    e
                );
                None
            }
        }
    }

    async fn save_anchor(&self, snapshot: Option<WorldSnapshot>) -> Result<()> {
        match snapshot {
            Some(snapshot) => {
                self.services.anchors.save(&self.project, &snapshot).await?;
            }
            None => {
                tracing::debug!("[scan] Keeping previous anchor for {}", self.project.id());
            }
        }
        Ok(())
    }

    /// Move from `Capturing` to `Processing` unless a cancel was accepted
    /// first. Returns `false` if the scan must end as cancelled.
    fn leave_capturing(&self) -> bool {
        {
            let mut phase = self.phase.lock();
            if self.cancel_requested.load(Ordering::SeqCst) {
                return false;
            }
            *phase = ScanPhase::Processing;
        }

        tracing::debug!(
            "[scan] Session {}: {} -> {}",
            self.id,
            ScanPhase::Capturing,
            ScanPhase::Processing
        );
        self.emit(ScanEvent::PhaseChanged {
            from: ScanPhase::Capturing,
            to: ScanPhase::Processing,
        });
        true
    }

    fn transition(&self, to: ScanPhase) -> bool {
        let from = {
            let mut phase = self.phase.lock();
            let from = *phase;
            if !from.can_transition_to(to) {
                tracing::warn!(
                    "[scan] Session {} ignoring illegal transition {} -> {}",
                    self.id,
                    from,
                    to
                );
                return false;
            }
            *phase = to;
            from
        };

        tracing::debug!("[scan] Session {}: {} -> {}", self.id, from, to);
        self.emit(ScanEvent::PhaseChanged { from, to });
        true
    }

    fn emit(&self, event: ScanEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("[scan] Session {} event receiver dropped", self.id);
        }
    }
}

impl Drop for CaptureSessionController {
    fn drop(&mut self) {
        self.services.capture.stop();
    }
}
