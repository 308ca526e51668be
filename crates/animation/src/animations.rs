//! Named collection of animations with a current selection.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::animation::SkeletalAnimation;
use crate::error::{AnimationError, AnimationResult};
use crate::skeleton::Skeleton;

/// The animations of one model. At most one of them is current.
#[derive(Clone, Debug, Default)]
pub struct SkeletalAnimations {
    animations: Vec<SkeletalAnimation>,
    name_to_index: HashMap<String, usize>,
    current: Option<usize>,
}

impl SkeletalAnimations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an animation. An existing animation with the same name is replaced.
    pub fn push(&mut self, animation: SkeletalAnimation) {
        match self.name_to_index.get(animation.name()) {
            Some(&index) => {
                warn!("Replacing animation '{}'", animation.name());
                self.animations[index] = animation;
            }
            None => {
                self.name_to_index
                    .insert(animation.name().to_string(), self.animations.len());
                self.animations.push(animation);
            }
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.animations.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&SkeletalAnimation> {
        self.index_of(name).map(|index| &self.animations[index])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut SkeletalAnimation> {
        self.index_of(name).map(|index| &mut self.animations[index])
    }

    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Makes `name` current and rewinds it.
    ///
    /// # Errors
    ///
    /// Returns [`AnimationError::UnknownAnimation`] if no animation has that name.
    pub fn start(&mut self, name: &str) -> AnimationResult<()> {
        let index = self
            .index_of(name)
            .ok_or_else(|| AnimationError::UnknownAnimation(name.to_string()))?;
        self.start_index(index)
    }

    /// Makes the animation at `index` current and rewinds it.
    ///
    /// # Errors
    ///
    /// Returns [`AnimationError::AnimationIndexOutOfRange`] for a bad index.
    pub fn start_index(&mut self, index: usize) -> AnimationResult<()> {
        let len = self.animations.len();
        let animation = self
            .animations
            .get_mut(index)
            .ok_or(AnimationError::AnimationIndexOutOfRange { index, len })?;

        animation.start();
        debug!("Started animation '{}'", animation.name());
        self.current = Some(index);
        Ok(())
    }

    /// Stops the current animation, if any.
    pub fn stop(&mut self) {
        if let Some(animation) = self.current_mut() {
            animation.stop();
        }
    }

    /// Sets the repeat flag of the current animation, if any.
    pub fn set_repeat(&mut self, repeat: bool) {
        if let Some(animation) = self.current_mut() {
            animation.set_repeat(repeat);
        }
    }

    pub fn set_repeat_all(&mut self, repeat: bool) {
        for animation in &mut self.animations {
            animation.set_repeat(repeat);
        }
    }

    /// False when there is no current animation.
    pub fn is_running(&self) -> bool {
        self.current().is_some_and(SkeletalAnimation::is_running)
    }

    pub fn will_expire(&self, dt: f32) -> bool {
        self.current().is_some_and(|animation| animation.will_expire(dt))
    }

    /// Duration of the animation called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`AnimationError::UnknownAnimation`] if no animation has that name.
    pub fn duration(&self, name: &str) -> AnimationResult<f32> {
        self.get(name)
            .map(SkeletalAnimation::duration)
            .ok_or_else(|| AnimationError::UnknownAnimation(name.to_string()))
    }

    /// Playhead of the current animation, 0 when there is none.
    pub fn current_time(&self) -> f32 {
        self.current().map_or(0.0, SkeletalAnimation::current_time)
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current().map(SkeletalAnimation::name)
    }

    #[inline]
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Advances only the current animation.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`SkeletalAnimation::update`].
    pub fn update(&mut self, dt: f32, skeleton: &mut Skeleton) -> AnimationResult<()> {
        match self.current_mut() {
            Some(animation) => animation.update(dt, skeleton),
            None => Ok(()),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SkeletalAnimation> {
        self.animations.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, SkeletalAnimation> {
        self.animations.iter_mut()
    }

    fn current(&self) -> Option<&SkeletalAnimation> {
        self.current.map(|index| &self.animations[index])
    }

    fn current_mut(&mut self) -> Option<&mut SkeletalAnimation> {
        self.current.map(|index| &mut self.animations[index])
    }
}

impl<'a> IntoIterator for &'a SkeletalAnimations {
    type Item = &'a SkeletalAnimation;
    type IntoIter = std::slice::Iter<'a, SkeletalAnimation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &'a mut SkeletalAnimations {
    type Item = &'a mut SkeletalAnimation;
    type IntoIter = std::slice::IterMut<'a, SkeletalAnimation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec4;

    use super::*;
    use crate::animation::{Interpolation, Sampler};

    fn animation(name: &str, last: f32) -> SkeletalAnimation {
        let sampler = Sampler::new(
            Interpolation::Step,
            vec![0.0, last],
            vec![Vec4::ZERO, Vec4::ONE],
        )
        .unwrap();
        SkeletalAnimation::new(name, vec![sampler], vec![]).unwrap()
    }

    fn collection() -> SkeletalAnimations {
        let mut animations = SkeletalAnimations::new();
        animations.push(animation("idle", 2.0));
        animations.push(animation("walk", 1.0));
        animations
    }

    #[test]
    fn test_lookup_by_name_and_index() {
        let animations = collection();
        assert_eq!(animations.len(), 2);
        assert_eq!(animations.index_of("walk"), Some(1));
        assert_eq!(animations.duration("idle").unwrap(), 2.0);
        assert!(animations.get("run").is_none());
        assert!(matches!(
            animations.duration("run"),
            Err(AnimationError::UnknownAnimation(_))
        ));
        let names: Vec<_> = animations.iter().map(SkeletalAnimation::name).collect();
        assert_eq!(names, ["idle", "walk"]);
    }

    #[test]
    fn test_push_replaces_same_name() {
        let mut animations = collection();
        animations.push(animation("walk", 4.0));
        assert_eq!(animations.len(), 2);
        assert_eq!(animations.duration("walk").unwrap(), 4.0);
    }

    #[test]
    fn test_no_current_animation() {
        let mut animations = collection();
        assert!(!animations.is_running());
        assert!(!animations.will_expire(10.0));
        assert_eq!(animations.current_time(), 0.0);
        assert_eq!(animations.current_name(), None);
        animations.stop();
        animations.set_repeat(true);
        assert!(animations.iter().all(|a| !a.repeat()));
    }

    #[test]
    fn test_start_selects_current() {
        let mut animations = collection();
        animations.start("walk").unwrap();
        assert_eq!(animations.current_name(), Some("walk"));
        assert!(animations.is_running());

        animations.start_index(0).unwrap();
        assert_eq!(animations.current_name(), Some("idle"));

        assert!(matches!(
            animations.start("run"),
            Err(AnimationError::UnknownAnimation(_))
        ));
        assert!(matches!(
            animations.start_index(2),
            Err(AnimationError::AnimationIndexOutOfRange { index: 2, len: 2 })
        ));
        assert_eq!(animations.current_index(), Some(0));
    }

    #[test]
    fn test_repeat_controls() {
        let mut animations = collection();
        animations.start("idle").unwrap();
        animations.set_repeat(true);
        assert!(animations.get("idle").unwrap().repeat());
        assert!(!animations.get("walk").unwrap().repeat());
        assert!(animations.will_expire(2.5));

        animations.set_repeat_all(false);
        animations.stop();
        assert!(!animations.is_running());
        assert_eq!(animations.current_time(), 3.0);
    }
}
