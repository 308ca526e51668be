//! Skeleton and animations of one skinned mesh.

use crate::animations::SkeletalAnimations;
use crate::error::AnimationResult;
use crate::skeleton::Skeleton;

/// Decoded skinned mesh data: what an asset loader hands over.
#[derive(Clone, Debug)]
pub struct SkinnedModel {
    name: String,
    skeleton: Skeleton,
    animations: SkeletalAnimations,
    vertex_count: u32,
}

impl SkinnedModel {
    pub fn new(
        name: impl Into<String>,
        skeleton: Skeleton,
        animations: SkeletalAnimations,
        vertex_count: u32,
    ) -> Self {
        Self {
            name: name.into(),
            skeleton,
            animations,
            vertex_count,
        }
    }

    /// Advances the current animation by `dt` seconds, then recomputes the
    /// skeleton's final matrices.
    ///
    /// # Errors
    ///
    /// Propagates animation evaluation errors; the skeleton is not updated then.
    pub fn advance(&mut self, dt: f32) -> AnimationResult<()> {
        self.animations.update(dt, &mut self.skeleton)?;
        self.skeleton.update();
        Ok(())
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    #[inline]
    pub fn skeleton_mut(&mut self) -> &mut Skeleton {
        &mut self.skeleton
    }

    #[inline]
    pub fn animations(&self) -> &SkeletalAnimations {
        &self.animations
    }

    #[inline]
    pub fn animations_mut(&mut self) -> &mut SkeletalAnimations {
        &mut self.animations
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}
