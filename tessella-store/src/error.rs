//! Error types used by the crate.

use thiserror::Error;

/// Store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced row does not exist.
    #[error("item not found")]
    NotFound,
    /// Filesystem access to an attachment failed.
    #[error("failed to access attachment file")]
    FsIo(#[from] std::io::Error),
}
