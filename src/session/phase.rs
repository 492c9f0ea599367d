use serde::Serialize;

/// Lifecycle of one scan.
///
/// ```text
/// Idle -> Relocalizing -> Capturing -> Processing -> Merging -> Exporting -> Completed
///              \               |  \          \           \           \
///               +--------------+---+----------+-----------+-----------+--> Errored
///                              +--> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Idle,
    Relocalizing,
    Capturing,
    Processing,
    Merging,
    Exporting,
    Completed,
    Errored,
    Cancelled,
}

impl ScanPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanPhase::Completed | ScanPhase::Errored | ScanPhase::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: ScanPhase) -> bool {
        use ScanPhase::*;
        match (self, next) {
            (Idle, Relocalizing)
            | (Relocalizing, Capturing)
            | (Capturing, Processing)
            | (Capturing, Cancelled)
            | (Processing, Merging)
            | (Merging, Exporting)
            | (Exporting, Completed) => true,
            (from, Errored) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScanPhase::Idle => "idle",
            ScanPhase::Relocalizing => "relocalizing",
            ScanPhase::Capturing => "capturing",
            ScanPhase::Processing => "processing",
            ScanPhase::Merging => "merging",
            ScanPhase::Exporting => "exporting",
            ScanPhase::Completed => "completed",
            ScanPhase::Errored => "errored",
            ScanPhase::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}
