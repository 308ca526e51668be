//! Keyframe samplers, channels and a single skeletal animation.
//!
//! # Overview
//!
//! A [`SkeletalAnimation`] owns its [`Sampler`]s (keyframe tracks) and
//! [`Channel`]s (which sampler drives which node along which [`Path`]). Each
//! [`SkeletalAnimation::update`] advances the playhead and writes the sampled
//! translation, rotation or scale into the targeted joints of a [`Skeleton`].
//!
//! Playback states:
//! - `start` moves the playhead to the first keyframe
//! - `stop` moves it just past the last keyframe, so a non-repeating
//!   animation reports [`is_running`](SkeletalAnimation::is_running) as false
//! - a repeating animation that passes the last keyframe restarts at the
//!   first one (any overshoot is dropped)

use std::cmp::Ordering;

use glam::{Quat, Vec3, Vec4};

use crate::error::{AnimationError, AnimationResult};
use crate::skeleton::Skeleton;

/// Playhead offset past the last keyframe used by [`SkeletalAnimation::stop`].
const STOP_EPSILON: f32 = 1.0;

/// Joint property a channel writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Path {
    Translation,
    Rotation,
    Scale,
}

/// How a sampler blends between keyframes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    Step,
    /// Accepted in samplers but rejected when evaluated.
    CubicSpline,
}

/// Keyframe track: timestamps plus one value per keyframe.
///
/// Values are `Vec4` so one type covers translation/scale (xyz) and
/// rotation quaternions (xyzw).
#[derive(Clone, Debug)]
pub struct Sampler {
    interpolation: Interpolation,
    timestamps: Vec<f32>,
    values: Vec<Vec4>,
}

impl Sampler {
    /// Creates a sampler.
    ///
    /// # Errors
    ///
    /// Returns [`AnimationError::InvalidSampler`] if timestamps decrease (or are
    /// NaN), or if a linear/step sampler has a value count different from its
    /// keyframe count. Cubic-spline samplers carry three values per keyframe.
    pub fn new(
        interpolation: Interpolation,
        timestamps: Vec<f32>,
        values: Vec<Vec4>,
    ) -> AnimationResult<Self> {
        let ordered = |a: f32, b: f32| {
            matches!(a.partial_cmp(&b), Some(Ordering::Less | Ordering::Equal))
        };
        if let Some(pair) = timestamps.windows(2).find(|pair| !ordered(pair[0], pair[1])) {
            return Err(AnimationError::InvalidSampler(format!(
                "timestamps must be non-decreasing, found {} before {}",
                pair[0], pair[1]
            )));
        }

        let expected = match interpolation {
            Interpolation::Linear | Interpolation::Step => timestamps.len(),
            Interpolation::CubicSpline => timestamps.len() * 3,
        };
        if values.len() != expected {
            return Err(AnimationError::InvalidSampler(format!(
                "{:?} sampler with {} keyframes needs {} values, got {}",
                interpolation,
                timestamps.len(),
                expected,
                values.len()
            )));
        }

        Ok(Self {
            interpolation,
            timestamps,
            values,
        })
    }

    #[inline]
    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    #[inline]
    pub fn timestamps(&self) -> &[f32] {
        &self.timestamps
    }

    #[inline]
    pub fn values(&self) -> &[Vec4] {
        &self.values
    }

    /// Index `i` of the first keyframe pair with `ts[i] <= time <= ts[i + 1]`.
    fn bracket(&self, time: f32) -> Option<usize> {
        self.timestamps
            .windows(2)
            .position(|pair| pair[0] <= time && time <= pair[1])
    }

    /// Samples the track for `path` at `time`.
    ///
    /// Returns `Ok(None)` when `time` lies outside every keyframe pair.
    ///
    /// # Errors
    ///
    /// Returns [`AnimationError::UnsupportedInterpolation`] for cubic-spline
    /// samplers once a keyframe pair is hit.
    pub fn sample(&self, path: Path, time: f32) -> AnimationResult<Option<Sample>> {
        let Some(i) = self.bracket(time) else {
            return Ok(None);
        };

        let sample = match self.interpolation {
            Interpolation::Linear => {
                let span = self.timestamps[i + 1] - self.timestamps[i];
                // Coincident keyframes hold the earlier value
                let amount = if span > 0.0 {
                    (time - self.timestamps[i]) / span
                } else {
                    0.0
                };
                let (from, to) = (self.values[i], self.values[i + 1]);
                match path {
                    Path::Translation => {
                        Sample::Translation(from.truncate().lerp(to.truncate(), amount))
                    }
                    Path::Rotation => Sample::Rotation(
                        Quat::from_vec4(from)
                            .slerp(Quat::from_vec4(to), amount)
                            .normalize(),
                    ),
                    Path::Scale => Sample::Scale(from.truncate().lerp(to.truncate(), amount)),
                }
            }
            Interpolation::Step => {
                let value = self.values[i];
                match path {
                    Path::Translation => Sample::Translation(value.truncate()),
                    Path::Rotation => Sample::Rotation(Quat::from_vec4(value)),
                    Path::Scale => Sample::Scale(value.truncate()),
                }
            }
            Interpolation::CubicSpline => {
                return Err(AnimationError::UnsupportedInterpolation(
                    Interpolation::CubicSpline,
                ));
            }
        };

        Ok(Some(sample))
    }
}

/// A sampled joint property.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sample {
    Translation(Vec3),
    Rotation(Quat),
    Scale(Vec3),
}

/// Binds a sampler to a target node and property.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Channel {
    pub path: Path,
    /// Index into the animation's samplers.
    pub sampler: usize,
    /// External node id, resolved through the skeleton's node mapping.
    pub target_node: usize,
}

/// Named animation with its own playhead.
#[derive(Clone, Debug)]
pub struct SkeletalAnimation {
    name: String,
    samplers: Vec<Sampler>,
    channels: Vec<Channel>,
    repeat: bool,
    first_keyframe_time: f32,
    last_keyframe_time: f32,
    current_keyframe_time: f32,
}

impl SkeletalAnimation {
    /// Creates an animation. The keyframe range comes from the first sampler
    /// when it has at least two keyframes, otherwise it is `0..0`.
    ///
    /// # Errors
    ///
    /// Returns [`AnimationError::InvalidSampler`] if a channel refers to a
    /// sampler that does not exist.
    pub fn new(
        name: impl Into<String>,
        samplers: Vec<Sampler>,
        channels: Vec<Channel>,
    ) -> AnimationResult<Self> {
        let name = name.into();

        if let Some(channel) = channels.iter().find(|c| c.sampler >= samplers.len()) {
            return Err(AnimationError::InvalidSampler(format!(
                "animation '{}' channel uses sampler {} of {}",
                name,
                channel.sampler,
                samplers.len()
            )));
        }

        let (first, last) = match samplers.first().map(Sampler::timestamps) {
            Some(ts) if ts.len() >= 2 => (ts[0], ts[ts.len() - 1]),
            _ => (0.0, 0.0),
        };

        Ok(Self {
            name,
            samplers,
            channels,
            repeat: false,
            first_keyframe_time: first,
            last_keyframe_time: last,
            current_keyframe_time: 0.0,
        })
    }

    /// Rewinds the playhead to the first keyframe.
    pub fn start(&mut self) {
        self.current_keyframe_time = self.first_keyframe_time;
    }

    /// Moves the playhead past the last keyframe.
    pub fn stop(&mut self) {
        self.current_keyframe_time = self.last_keyframe_time + STOP_EPSILON;
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.repeat || self.current_keyframe_time <= self.last_keyframe_time
    }

    /// True when a repeating animation will wrap during the next `dt` seconds.
    #[inline]
    pub fn will_expire(&self, dt: f32) -> bool {
        self.repeat && self.current_keyframe_time + dt > self.last_keyframe_time
    }

    /// Advances the playhead by `dt` seconds and poses `skeleton`.
    ///
    /// Does nothing when the animation is not running. Channels are resolved
    /// and sampled before any joint is written, so an error leaves the
    /// skeleton untouched.
    ///
    /// # Errors
    ///
    /// - [`AnimationError::UnmappedNode`] if a channel targets a node without a joint
    /// - [`AnimationError::UnsupportedInterpolation`] for cubic-spline samplers
    pub fn update(&mut self, dt: f32, skeleton: &mut Skeleton) -> AnimationResult<()> {
        if !self.is_running() {
            return Ok(());
        }

        self.current_keyframe_time += dt;
        if self.repeat && self.current_keyframe_time > self.last_keyframe_time {
            self.current_keyframe_time = self.first_keyframe_time;
        }

        let mut poses = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let joint = skeleton
                .joint_index_for_node(channel.target_node)
                .ok_or_else(|| AnimationError::UnmappedNode {
                    animation: self.name.clone(),
                    node: channel.target_node,
                })?;

            let sampler = &self.samplers[channel.sampler];
            if let Some(sample) = sampler.sample(channel.path, self.current_keyframe_time)? {
                poses.push((joint, sample));
            }
        }

        let joints = skeleton.joints_mut();
        for (index, sample) in poses {
            let joint = &mut joints[index];
            match sample {
                Sample::Translation(value) => joint.deformed_position = value,
                Sample::Rotation(value) => joint.deformed_rotation = value,
                Sample::Scale(value) => joint.deformed_scale = value,
            }
        }

        Ok(())
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    #[inline]
    pub fn repeat(&self) -> bool {
        self.repeat
    }

    /// Last keyframe time minus first keyframe time.
    #[inline]
    pub fn duration(&self) -> f32 {
        self.last_keyframe_time - self.first_keyframe_time
    }

    #[inline]
    pub fn current_time(&self) -> f32 {
        self.current_keyframe_time
    }

    #[inline]
    pub fn first_keyframe_time(&self) -> f32 {
        self.first_keyframe_time
    }

    #[inline]
    pub fn last_keyframe_time(&self) -> f32 {
        self.last_keyframe_time
    }

    #[inline]
    pub fn samplers(&self) -> &[Sampler] {
        &self.samplers
    }

    #[inline]
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }
}

#[cfg(test)]
mod tests {
    use glam::Mat4;

    use super::*;
    use crate::skeleton::SkeletonBuilder;

    const NODE: usize = 4;

    fn single_joint() -> Skeleton {
        let mut builder = SkeletonBuilder::new("single");
        let root = builder.add_joint("root", None, Mat4::IDENTITY);
        builder.map_node(NODE, root);
        builder.build().unwrap()
    }

    fn linear_x(timestamps: Vec<f32>, xs: &[f32]) -> Sampler {
        let values = xs.iter().map(|&x| Vec4::new(x, 0.0, 0.0, 0.0)).collect();
        Sampler::new(Interpolation::Linear, timestamps, values).unwrap()
    }

    fn translation_animation(sampler: Sampler) -> SkeletalAnimation {
        SkeletalAnimation::new(
            "slide",
            vec![sampler],
            vec![Channel {
                path: Path::Translation,
                sampler: 0,
                target_node: NODE,
            }],
        )
        .unwrap()
    }

    #[test]
    fn test_linear_sampling_at_boundaries_and_midpoint() {
        let sampler = linear_x(vec![0.0, 1.0], &[0.0, 10.0]);

        for (time, expected) in [(0.0, 0.0), (0.5, 5.0), (1.0, 10.0)] {
            let sample = sampler.sample(Path::Translation, time).unwrap();
            assert_eq!(
                sample,
                Some(Sample::Translation(Vec3::new(expected, 0.0, 0.0)))
            );
        }
        assert_eq!(sampler.sample(Path::Translation, 1.5).unwrap(), None);
    }

    #[test]
    fn test_shared_keyframe_resolves_to_earlier_pair() {
        let sampler = Sampler::new(
            Interpolation::Step,
            vec![0.0, 1.0, 2.0],
            vec![Vec4::ZERO, Vec4::ONE, Vec4::splat(2.0)],
        )
        .unwrap();

        // t = 1.0 belongs to both [0,1] and [1,2]; the first pair wins
        assert_eq!(
            sampler.sample(Path::Scale, 1.0).unwrap(),
            Some(Sample::Scale(Vec3::ZERO))
        );
        assert_eq!(
            sampler.sample(Path::Scale, 1.5).unwrap(),
            Some(Sample::Scale(Vec3::ONE))
        );
    }

    #[test]
    fn test_rotation_uses_normalized_slerp() {
        let quarter_turn = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let sampler = Sampler::new(
            Interpolation::Linear,
            vec![0.0, 2.0],
            vec![Vec4::from(Quat::IDENTITY), Vec4::from(quarter_turn)],
        )
        .unwrap();

        let Some(Sample::Rotation(rotation)) = sampler.sample(Path::Rotation, 1.0).unwrap() else {
            panic!("expected a rotation sample");
        };
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);
        assert!(rotation.abs_diff_eq(expected, 1e-5));
        assert!((rotation.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_sampler_validation() {
        assert!(matches!(
            Sampler::new(Interpolation::Linear, vec![0.0, 2.0, 1.0], vec![Vec4::ZERO; 3]),
            Err(AnimationError::InvalidSampler(_))
        ));
        assert!(matches!(
            Sampler::new(Interpolation::Step, vec![0.0, 1.0], vec![Vec4::ZERO]),
            Err(AnimationError::InvalidSampler(_))
        ));
        assert!(Sampler::new(Interpolation::CubicSpline, vec![0.0, 1.0], vec![Vec4::ZERO; 6]).is_ok());
        assert!(Sampler::new(Interpolation::Linear, vec![1.0, 1.0], vec![Vec4::ZERO; 2]).is_ok());
    }

    #[test]
    fn test_cubic_spline_is_rejected_when_evaluated() {
        let sampler = Sampler::new(
            Interpolation::CubicSpline,
            vec![0.0, 1.0],
            vec![Vec4::ZERO; 6],
        )
        .unwrap();
        let mut animation = translation_animation(sampler);
        let mut skeleton = single_joint();

        animation.start();
        assert!(matches!(
            animation.update(0.5, &mut skeleton),
            Err(AnimationError::UnsupportedInterpolation(Interpolation::CubicSpline))
        ));
    }

    #[test]
    fn test_channel_with_missing_sampler_is_rejected() {
        let result = SkeletalAnimation::new(
            "broken",
            vec![],
            vec![Channel {
                path: Path::Scale,
                sampler: 0,
                target_node: NODE,
            }],
        );
        assert!(matches!(result, Err(AnimationError::InvalidSampler(_))));
    }

    #[test]
    fn test_keyframe_range_from_first_sampler() {
        let animation = translation_animation(linear_x(vec![0.5, 1.0, 3.0], &[0.0, 1.0, 2.0]));
        assert_eq!(animation.first_keyframe_time(), 0.5);
        assert_eq!(animation.last_keyframe_time(), 3.0);
        assert_eq!(animation.duration(), 2.5);

        let short = translation_animation(linear_x(vec![1.0], &[0.0]));
        assert_eq!(short.duration(), 0.0);
        assert_eq!(short.last_keyframe_time(), 0.0);
    }

    #[test]
    fn test_start_stop_and_running_state() {
        let mut animation = translation_animation(linear_x(vec![0.0, 2.0], &[0.0, 1.0]));

        animation.start();
        assert!(animation.is_running());

        animation.stop();
        assert_eq!(animation.current_time(), 3.0);
        assert!(!animation.is_running());

        animation.set_repeat(true);
        assert!(animation.is_running());
    }

    #[test]
    fn test_will_expire_only_when_repeating() {
        let mut animation = translation_animation(linear_x(vec![0.0, 2.0], &[0.0, 1.0]));
        animation.start();
        assert!(!animation.will_expire(5.0));

        animation.set_repeat(true);
        assert!(animation.will_expire(2.5));
        assert!(!animation.will_expire(1.0));
    }

    #[test]
    fn test_one_shot_animation_expires() {
        let mut animation = translation_animation(linear_x(vec![0.0, 1.0], &[0.0, 10.0]));
        let mut skeleton = single_joint();

        animation.start();
        animation.update(0.75, &mut skeleton).unwrap();
        assert!((skeleton.joints()[0].deformed_position.x - 7.5).abs() < 1e-5);

        animation.update(0.5, &mut skeleton).unwrap();
        assert!(!animation.is_running());
        // Past the last keyframe nothing is sampled, the last pose stays
        assert!((skeleton.joints()[0].deformed_position.x - 7.5).abs() < 1e-5);

        animation.update(0.1, &mut skeleton).unwrap();
        assert_eq!(animation.current_time(), 1.25);
    }

    #[test]
    fn test_unmapped_node_leaves_skeleton_untouched() {
        let mut animation = SkeletalAnimation::new(
            "partial",
            vec![linear_x(vec![0.0, 1.0], &[0.0, 10.0])],
            vec![
                Channel {
                    path: Path::Translation,
                    sampler: 0,
                    target_node: NODE,
                },
                Channel {
                    path: Path::Scale,
                    sampler: 0,
                    target_node: 99,
                },
            ],
        )
        .unwrap();
        let mut skeleton = single_joint();

        animation.start();
        let result = animation.update(0.5, &mut skeleton);
        assert!(matches!(
            result,
            Err(AnimationError::UnmappedNode { node: 99, .. })
        ));
        assert_eq!(skeleton.joints()[0].deformed_position, Vec3::ZERO);
    }
}
