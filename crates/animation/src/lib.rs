//! Skeletal animation for skinned meshes.
//!
//! This crate provides:
//! - [`Skeleton`] - an index-linked joint hierarchy producing skinning matrices
//! - [`SkeletalAnimation`] - keyframe samplers and channels with a playhead
//! - [`SkeletalAnimations`] - a named collection with a current animation
//! - [`SkinnedModel`] - the bundle of skeleton and animations for one mesh

mod animation;
mod animations;
mod error;
mod skeleton;
mod skinned_model;

pub use animation::{Channel, Interpolation, Path, Sample, Sampler, SkeletalAnimation};
pub use animations::SkeletalAnimations;
pub use error::{AnimationError, AnimationResult};
pub use skeleton::{Joint, MAX_JOINTS, ROOT_JOINT, Skeleton, SkeletonBuilder};
pub use skinned_model::SkinnedModel;
