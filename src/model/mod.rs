//! Domain models for rooms and combined structures.
//!
//! - [`Room`]: one processed scan, persisted once as `<identifier>.json`
//!   and never mutated afterwards.
//! - [`Structure`]: the derived multi-room model, rebuilt from the full
//!   set of rooms after every successful scan.

mod geometry;
mod room;
mod structure;

pub use geometry::*;
pub use room::*;
pub use structure::*;
