//! CLI module for headless roomforge operation.
//!
//! The CLI drives the same services a GUI shell would: scans run through
//! [`CaptureSessionController`](crate::session::CaptureSessionController)
//! with a replayed capture, and the session's event channel is rendered by
//! `output.rs`.
//!
//! ```text
//! +-------------------+     +-------------+     +---------------+
//! | SessionController | --> | mpsc events | --> | output.rs     |
//! | (shared logic)    |     |             |     | (print/JSON)  |
//! +-------------------+     +-------------+     +---------------+
//! ```

mod args;
mod bootstrap;
mod output;
mod runner;

pub use args::{Args, Command, ConfigAction};
pub use bootstrap::{initialize, CliContext};
pub use output::{run_event_loop, Output};
pub use runner::{execute, RoomSummary};
