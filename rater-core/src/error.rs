//! Error types for rating operations.

use thiserror::Error;

/// Result type for rating operations.
pub type RaterResult<T> = Result<T, RaterError>;

/// Errors that can occur in rating operations.
#[derive(Debug, Error)]
pub enum RaterError {
    /// A rectangle's normalized bounds fall outside `[0, 1]`.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Canvas dimensions are not finite and strictly positive.
    #[error("Invalid canvas: {width}x{height}")]
    InvalidCanvas {
        /// Requested width.
        width: f64,
        /// Requested height.
        height: f64,
    },

    /// A batch with zero elements was committed.
    #[error("Cannot commit an empty batch")]
    EmptyBatch,

    /// Annotate/remove target not present in the session.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Fewer elements than the scoring minimum were submitted.
    #[error("Insufficient input: {found} element(s), at least {required} required")]
    InsufficientInput {
        /// Live elements in the session.
        found: usize,
        /// Minimum required by the scoring service.
        required: usize,
    },

    /// A session state-machine operation was issued in the wrong phase.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// The detection collaborator failed.
    #[error("Detection failed: {0}")]
    Detection(String),

    /// A stored rating could not be found.
    #[error("Rating not found: {0}")]
    RatingNotFound(String),

    /// The session actor has shut down.
    #[error("Session closed")]
    SessionClosed,

    /// Filesystem error while persisting ratings.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
