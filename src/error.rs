use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a scan failure, stable across error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanErrorKind {
    CapabilityUnavailable,
    CaptureAborted,
    Cancelled,
    ProcessingFailed,
    MergeFailed,
    PersistenceFailed,
    Encoding,
    InvalidProject,
    AlreadyStarted,
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Room capture is not available: {0}")]
    CapabilityUnavailable(String),

    #[error("{0}")]
    CaptureAborted(String),

    #[error("Scan cancelled")]
    Cancelled,

    #[error("Room processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Structure merge failed: {0}")]
    MergeFailed(String),

    #[error("{context}: {source}")]
    PersistenceFailed {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Invalid project id: {0}")]
    InvalidProject(String),

    #[error("Scan session already started")]
    AlreadyStarted,
}

impl ScanError {
    /// Wrap an IO error with a description of the write/read that failed.
    pub fn persistence(context: impl Into<String>, source: std::io::Error) -> Self {
        ScanError::PersistenceFailed {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ScanErrorKind {
        match self {
            ScanError::CapabilityUnavailable(_) => ScanErrorKind::CapabilityUnavailable,
            ScanError::CaptureAborted(_) => ScanErrorKind::CaptureAborted,
            ScanError::Cancelled => ScanErrorKind::Cancelled,
            ScanError::ProcessingFailed(_) => ScanErrorKind::ProcessingFailed,
            ScanError::MergeFailed(_) => ScanErrorKind::MergeFailed,
            ScanError::PersistenceFailed { .. } => ScanErrorKind::PersistenceFailed,
            ScanError::Encoding(_) => ScanErrorKind::Encoding,
            ScanError::InvalidProject(_) => ScanErrorKind::InvalidProject,
            ScanError::AlreadyStarted => ScanErrorKind::AlreadyStarted,
        }
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::Encoding(err.to_string())
    }
}

// Serialize as the display string so completion payloads stay flat
impl Serialize for ScanError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_aborted_forwards_message_verbatim() {
        let err = ScanError::CaptureAborted("Tracking lost".to_string());
        assert_eq!(err.to_string(), "Tracking lost");
        assert_eq!(err.kind(), ScanErrorKind::CaptureAborted);
    }

    #[test]
    fn test_persistence_error_keeps_context() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ScanError::persistence("Failed to write room", io);
        assert_eq!(err.kind(), ScanErrorKind::PersistenceFailed);
        assert!(err.to_string().starts_with("Failed to write room"));
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&ScanError::Cancelled).unwrap();
        assert_eq!(json, "\"Scan cancelled\"");
    }
}
