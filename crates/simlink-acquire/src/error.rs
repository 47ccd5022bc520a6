//! Error types for the acquisition engine

use simlink_protocol::ReplayFormatError;
use thiserror::Error;

/// Errors that can occur in the acquisition engine
#[derive(Debug, Error)]
pub enum AcquireError {
    /// Replay file could not be opened or failed validation
    #[error("cannot open \"{path}\": {source}")]
    ReplayOpen {
        path: String,
        #[source]
        source: ReplayFormatError,
    },

    /// A record in a replay file is malformed
    #[error("error reading \"{path}\": {source}")]
    ReplayRead {
        path: String,
        #[source]
        source: ReplayFormatError,
    },

    /// Writing to a recording failed
    #[error("error writing \"{path}\": {source}")]
    ReplayWrite {
        path: String,
        #[source]
        source: ReplayFormatError,
    },

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The worker thread panicked; its adapter is lost
    #[error("acquisition worker panicked")]
    WorkerPanicked,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
