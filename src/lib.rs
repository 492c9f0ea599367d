//! roomforge - merge room captures from many scanning sessions into one
//! building model per project.
//!
//! A scan runs through [`session::CaptureSessionController`]: the capture
//! source is seeded with the project's stored world anchor, the raw room is
//! refined by [`processor::RoomProcessor`], persisted by
//! [`repository::ProjectRoomRepository`], and every room of the project is
//! merged and exported by [`merge::StructureMerger`].

pub mod anchor;
pub mod capture;
pub mod error;
pub mod merge;
pub mod model;
pub mod paths;
pub mod processor;
pub mod project;
pub mod repository;
pub mod session;
pub mod settings;
pub mod state;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{Result, ScanError, ScanErrorKind};
pub use project::{Project, ProjectStore};
pub use session::{CaptureSessionController, ScanCompletion, ScanEvent, ScanPhase, ScanServices};
pub use state::AppState;
