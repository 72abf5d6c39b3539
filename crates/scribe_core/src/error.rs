//! Error taxonomy shared by every stage of the pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by acquisition, recognition and export
#[derive(Debug, Error)]
pub enum ScribeError {
    /// The camera device could not be opened
    #[error("camera {index} unavailable: {reason}")]
    DeviceUnavailable { index: u32, reason: String },

    /// A frame could not be read from an open camera
    #[error("frame capture failed: {0}")]
    Capture(String),

    /// An image file or buffer could not be decoded (or encoded)
    #[error("cannot decode {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    /// The recognition engine failed
    #[error("recognition failed: {0}")]
    Engine(String),

    /// Writing an export or capture file failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document renderer failed
    #[error("document rendering failed: {0}")]
    Render(String),

    /// The operation's preconditions are not met
    #[error("{0}")]
    InvalidState(String),

    /// The configuration file could not be read or parsed
    #[error("configuration error: {0}")]
    Config(String),
}

impl ScribeError {
    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub(crate) fn decode(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScribeError>;
