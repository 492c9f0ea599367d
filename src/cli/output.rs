//! CLI output handling.
//!
//! Every result goes through [`Output`], which renders it either as one
//! JSON object per line or as human-readable text. Scan progress comes
//! from the session's event channel via [`run_event_loop`].

use std::io::{self, Write};

use anyhow::Result;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::session::{ScanCompletion, ScanEvent};

/// Output mode selected on the command line.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(json: bool, quiet: bool) -> Self {
        Self { json, quiet }
    }

    /// Emit a result. `pretty` renders it for terminal mode.
    pub fn record<T: Serialize>(&self, value: &T, pretty: impl FnOnce(&T) -> String) -> Result<()> {
        let mut stdout = io::stdout().lock();
        if self.json {
            writeln!(stdout, "{}", serde_json::to_string(value)?)?;
        } else {
            writeln!(stdout, "{}", pretty(value))?;
        }
        stdout.flush()?;
        Ok(())
    }

    /// Progress text; suppressed in JSON and quiet modes.
    pub fn progress(&self, message: &str) {
        if !self.json && !self.quiet {
            eprintln!("{}", message);
        }
    }
}

/// Render scan events until the session reports completion.
///
/// Returns the completion, or `None` if the channel closed first.
pub async fn run_event_loop(
    mut event_rx: mpsc::UnboundedReceiver<ScanEvent>,
    output: Output,
) -> Result<Option<ScanCompletion>> {
    while let Some(event) = event_rx.recv().await {
        if output.json {
            println!("{}", serde_json::to_string(&event)?);
            io::stdout().flush()?;
        }

        match event {
            ScanEvent::PhaseChanged { from, to } => {
                output.progress(&format!("[scan] {} -> {}", from, to));
            }
            ScanEvent::ProcessingStarted => {
                output.progress("[scan] Capture complete, processing room...");
            }
            ScanEvent::Completed(completion) => {
                if !output.json {
                    print_completion(&completion);
                }
                return Ok(Some(completion));
            }
        }
    }
    Ok(None)
}

fn print_completion(completion: &ScanCompletion) {
    if let Some(error) = completion.error() {
        eprintln!("Error: {}", error);
        return;
    }
    if let Some(path) = completion.new_room_metadata_path() {
        println!("Room:     {}", path.display());
    }
    if let Some(path) = completion.combined_artifact_path() {
        println!("Combined: {}", path.display());
    }
    if let Some(count) = completion.total_room_count() {
        println!("Rooms in project: {}", count);
    }
}
