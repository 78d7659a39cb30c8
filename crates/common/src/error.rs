//! Error types shared across plateblur crates.
//!
//! Variants are grouped by blast radius: region-level failures are handled
//! inside the tracker pool and never reach a caller, file-level failures abort
//! one input, and `Cancelled` stops a whole batch.

use std::path::PathBuf;

/// Top-level error type for plateblur operations.
#[derive(Debug, thiserror::Error)]
pub enum PlateblurError {
    #[error("Input not found: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Failed to open container {path}: {message}")]
    ContainerOpen { path: PathBuf, message: String },

    #[error("Unsupported stream layout: {message}")]
    UnsupportedStream { message: String },

    #[error("Detector invocation failed: {message}")]
    DetectorInvocation { message: String },

    #[error("Tracker initialization failed: {message}")]
    TrackerInit { message: String },

    #[error("Tracker update failed: {message}")]
    TrackerUpdate { message: String },

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Encode error: {message}")]
    Encode { message: String },

    #[error("Mux error: {message}")]
    Mux { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Processing cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using PlateblurError.
pub type PlateblurResult<T> = Result<T, PlateblurError>;

impl PlateblurError {
    pub fn container_open(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::ContainerOpen {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn unsupported_stream(msg: impl Into<String>) -> Self {
        Self::UnsupportedStream {
            message: msg.into(),
        }
    }

    pub fn detector(msg: impl Into<String>) -> Self {
        Self::DetectorInvocation {
            message: msg.into(),
        }
    }

    pub fn tracker_init(msg: impl Into<String>) -> Self {
        Self::TrackerInit {
            message: msg.into(),
        }
    }

    pub fn tracker_update(msg: impl Into<String>) -> Self {
        Self::TrackerUpdate {
            message: msg.into(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn mux(msg: impl Into<String>) -> Self {
        Self::Mux {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether this error should stop the remaining files of a batch.
    ///
    /// Everything except cancellation is scoped to the file that raised it.
    pub fn aborts_batch(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_cancellation_aborts_batch() {
        assert!(PlateblurError::Cancelled.aborts_batch());
        assert!(!PlateblurError::encode("x").aborts_batch());
        assert!(!PlateblurError::InputNotFound {
            path: PathBuf::from("missing.mp4")
        }
        .aborts_batch());
    }

    #[test]
    fn test_container_open_message_includes_path() {
        let err = PlateblurError::container_open("/videos/a.mp4", "No such file");
        let msg = err.to_string();
        assert!(msg.contains("/videos/a.mp4"));
        assert!(msg.contains("No such file"));
    }
}
