//! Error types for Gradebook
//!
//! Uses `thiserror` for ergonomic error definitions. Every failure the
//! service surfaces is one of these variants; nothing is coerced into an
//! empty result.

use std::io;
use thiserror::Error;

use gradebook_pipeline::pipeline::PipelineError;

use crate::students::store::StoreError;

/// Main error type for Gradebook operations
#[derive(Error, Debug)]
pub enum GradebookError {
    /// A student with this id already exists
    #[error("Student with id {0} already exists")]
    DuplicateId(i64),

    /// No student with this id
    #[error("Student with id {0} not found")]
    NotFound(i64),

    /// Caller supplied an empty or inverted range, or a non-positive limit
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// A catalog pipeline failed to build or run
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// The storage collaborator could not serve the request
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Configuration parsing or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A terminal row does not have the shape the caller expects
    #[error("Unexpected result shape: {0}")]
    ResultShape(String),

    /// Dataset file could not be parsed
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<StoreError> for GradebookError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateId(id) => Self::DuplicateId(id),
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Unavailable(msg) => Self::StorageUnavailable(msg),
        }
    }
}

/// Result type alias for Gradebook operations
pub type Result<T> = std::result::Result<T, GradebookError>;
