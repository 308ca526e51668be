//! Error types for the scene layer.

use thiserror::Error;

use crate::registry::ObjectId;

/// Scene errors.
#[derive(Debug, Error)]
pub enum SceneError {
    /// No object of this kind has the given id.
    #[error("No {kind} with id {id}")]
    NotFound { kind: &'static str, id: ObjectId },
}

/// Result type for scene operations.
pub type SceneResult<T> = std::result::Result<T, SceneError>;
