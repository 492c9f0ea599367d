//! Scan sessions.
//!
//! A [`CaptureSessionController`] owns exactly one scan of one project:
//!
//! 1. load the project's world anchor (relocalization seed)
//! 2. run the platform capture
//! 3. refine the raw data into a [`Room`](crate::model::Room) and persist it
//! 4. recompute the structure from every room on disk
//! 5. export the combined model, then store the new anchor
//!
//! Each controller has its own event channel; there is no global event bus.

mod controller;
mod events;
mod phase;

#[cfg(test)]
mod integration_tests;

pub use controller::{CaptureSessionController, ScanServices};
pub use events::{ScanCompletion, ScanEvent};
pub use phase::ScanPhase;
