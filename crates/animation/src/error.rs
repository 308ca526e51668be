//! Error types for skeletons and animations.

use thiserror::Error;

use crate::animation::Interpolation;

/// Errors raised while building skeletons or evaluating animations.
#[derive(Debug, Error)]
pub enum AnimationError {
    /// The sampler uses an interpolation method that is not evaluated.
    #[error("Interpolation method {0:?} is not supported")]
    UnsupportedInterpolation(Interpolation),

    /// No animation with this name exists in the collection.
    #[error("Unknown animation: {0}")]
    UnknownAnimation(String),

    #[error("Animation index {index} out of range ({len} animations)")]
    AnimationIndexOutOfRange { index: usize, len: usize },

    /// A channel targets a node that has no joint in the skeleton.
    #[error("Animation '{animation}' targets node {node}, which is not mapped to a joint")]
    UnmappedNode { animation: String, node: usize },

    #[error("Invalid skeleton: {0}")]
    InvalidSkeleton(String),

    #[error("Invalid sampler: {0}")]
    InvalidSampler(String),

    #[error("Skeleton has {count} joints, the limit is {max}")]
    TooManyJoints { count: usize, max: usize },
}

/// Result type for animation operations.
pub type AnimationResult<T> = std::result::Result<T, AnimationError>;
