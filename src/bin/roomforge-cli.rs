//! roomforge CLI - headless room scanning and project management.
//!
//! Scans are driven from capture recordings, since no platform capture
//! source is linked into this binary.
//!
//! # Usage
//!
//! ```bash
//! # Scan a recorded room into a new project
//! ./target/debug/roomforge-cli scan --replay kitchen.json
//!
//! # Add another room to the same project, with JSON events
//! ./target/debug/roomforge-cli scan --replay hall.json --project Room_1700000000000 --json
//!
//! # Inspect and maintain a project
//! ./target/debug/roomforge-cli rooms Room_1700000000000
//! ./target/debug/roomforge-cli rebuild Room_1700000000000
//! ./target/debug/roomforge-cli config set merge.stitch_distance 0.2
//! ```

use anyhow::Result;
use clap::Parser;

use roomforge_lib::cli::{execute, initialize, Args};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let ctx = initialize(&args).await?;

    execute(&ctx).await
}
