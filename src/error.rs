//! Repository error types

use std::path::PathBuf;
use thiserror::Error;

use crate::store::SnapshotId;

/// Errors that can occur in repository operations
#[derive(Debug, Error)]
pub enum VcsError {
    /// Source path is neither a regular file nor a directory
    #[error("Invalid source path: {0}")]
    InvalidSource(PathBuf),

    /// Snapshot id does not name a stored snapshot
    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(SnapshotId),

    /// Wrapped record shorter than the fixed framing overhead
    #[error("Malformed record: {len} bytes, need at least 8")]
    Malformed { len: usize },

    /// Stored checksum disagrees with the recomputed fingerprint
    #[error("Checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VcsError {
    /// Whether retrying the failed call can reasonably succeed.
    ///
    /// `Io` failures may be transient; the other kinds are logic errors or
    /// data corruption and will fail again unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VcsError::Io(_))
    }
}
