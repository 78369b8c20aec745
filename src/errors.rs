//! Error hierarchy for the configuration engine and the task dispatcher.
//!
//! Lookups on the configuration tree never produce errors: a missing path is an
//! `Option::None`. What remains here are the failures a caller has to branch on,
//! categorized by the layer that raised them.

use std::path::PathBuf;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (storage, wire codec)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Settings loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Task dispatch contract violations and collaborator failures
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A well-known option required by the operation is absent
    #[error("Required option {0} is not set")]
    MissingOption(String),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    // Storage layer
    #[error("Storage operation failed: {0}")]
    Storage(#[from] StorageError),

    // Wire and file format
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Disk I/O failures
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// I/O failure annotated with the path it happened on
    #[error("Error occurred at path: {path}")]
    PathError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Zip archive creation failures while backing up a configuration file
    #[error("Backup of {path} failed: {reason}")]
    Backup { path: PathBuf, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Compressed payload could not be inflated
    #[error("Failed to decompress payload: {0}")]
    Decompress(#[source] std::io::Error),

    /// Payload could not be deflated
    #[error("Failed to compress payload: {0}")]
    Compress(#[source] std::io::Error),

    /// Tree text is malformed
    #[error("Malformed configuration at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// Tree payload is not valid UTF-8
    #[error("Configuration payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// A task may wait for at most one worker type at a time
    #[error("Task {task_id} is already queued for {queued_type}, cannot queue it for {requested_type}")]
    QueuedUnderOtherType {
        task_id: String,
        queued_type: String,
        requested_type: String,
    },

    /// Task disappeared from the master registry while it was being dispatched
    #[error("Task {0} is not registered")]
    UnknownTask(String),

    /// Routing callback failed
    #[error("Routing task {task_id} failed: {reason}")]
    Routing { task_id: String, reason: String },

    /// Transport failed to hand a task over to a worker
    #[error("Sending task {task_id} to worker {worker_id} failed: {reason}")]
    Send {
        task_id: String,
        worker_id: String,
        reason: String,
    },
}

// ============== Conversion Implementations ============== //
impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::System(SystemError::Storage(e))
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::System(SystemError::Codec(e))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::System(SystemError::Storage(StorageError::IoError(e)))
    }
}
