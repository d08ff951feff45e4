//! Error types used by the crate.

use thiserror::Error;

/// Tessella error type.
#[derive(Debug, Error)]
pub enum TessellaError {
    /// A GPU-side resource could not be created.
    #[error("failed to create render resource: {0}")]
    Resource(String),
    /// Persisted style data could not be parsed.
    #[error("invalid style definition")]
    InvalidStyle(#[from] serde_json::Error),
}
