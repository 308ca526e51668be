//! Joint hierarchy and skinning matrices.
//!
//! # Overview
//!
//! A [`Skeleton`] stores its joints in a flat array. Joints refer to each other
//! by index (`parent`, `children`), with joint [`ROOT_JOINT`] as the single
//! root. Animations write each joint's deformed translation, rotation and
//! scale; [`Skeleton::update`] turns those into the final matrices uploaded for
//! GPU skinning:
//!
//! 1. each joint starts from its local `T * R * S` matrix
//! 2. a pre-order walk from the root sets `final[j] = final[parent] * final[j]`
//! 3. every final matrix is multiplied by the joint's inverse-bind matrix
//!
//! # Example
//!
//! ```
//! use glam::{Mat4, Vec3};
//! use engine_animation::SkeletonBuilder;
//!
//! let mut builder = SkeletonBuilder::new("arm");
//! let shoulder = builder.add_joint("shoulder", None, Mat4::IDENTITY);
//! let elbow = builder.add_joint("elbow", Some(shoulder), Mat4::IDENTITY);
//! builder.map_node(7, elbow);
//!
//! let mut skeleton = builder.build().unwrap();
//! skeleton.joints_mut()[elbow].deformed_position = Vec3::X;
//! skeleton.update();
//! ```

use std::collections::HashMap;

use glam::{Mat4, Quat, Vec3};
use tracing::debug;

use crate::error::{AnimationError, AnimationResult};

/// Index of the root joint.
pub const ROOT_JOINT: usize = 0;

/// Maximum number of joints a skeleton may have (size of the joint uniform array).
pub const MAX_JOINTS: usize = 100;

/// One node of the joint hierarchy.
#[derive(Clone, Debug)]
pub struct Joint {
    pub name: String,
    /// Takes model-space positions into this joint's bind space.
    pub inverse_bind_matrix: Mat4,
    pub deformed_position: Vec3,
    pub deformed_rotation: Quat,
    pub deformed_scale: Vec3,
    parent: Option<usize>,
    children: Vec<usize>,
}

impl Joint {
    fn new(name: String, parent: Option<usize>, inverse_bind_matrix: Mat4) -> Self {
        Self {
            name,
            inverse_bind_matrix,
            deformed_position: Vec3::ZERO,
            deformed_rotation: Quat::IDENTITY,
            deformed_scale: Vec3::ONE,
            parent,
            children: Vec::new(),
        }
    }

    /// Local transform `translate * rotate * scale` from the deformed TRS.
    #[inline]
    pub fn deformed_bind_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.deformed_scale,
            self.deformed_rotation,
            self.deformed_position,
        )
    }

    #[inline]
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[usize] {
        &self.children
    }
}

/// Collects joints and node mappings, then validates them into a [`Skeleton`].
#[derive(Debug, Default)]
pub struct SkeletonBuilder {
    name: String,
    joints: Vec<(String, Option<usize>, Mat4)>,
    node_to_joint: HashMap<usize, usize>,
}

impl SkeletonBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Appends a joint and returns its index.
    ///
    /// `parent` may refer to a joint added later; links are checked in [`build`](Self::build).
    pub fn add_joint(
        &mut self,
        name: impl Into<String>,
        parent: Option<usize>,
        inverse_bind_matrix: Mat4,
    ) -> usize {
        self.joints.push((name.into(), parent, inverse_bind_matrix));
        self.joints.len() - 1
    }

    /// Records that the external node `node` drives joint `joint`.
    pub fn map_node(&mut self, node: usize, joint: usize) -> &mut Self {
        self.node_to_joint.insert(node, joint);
        self
    }

    /// Validates the hierarchy and creates the skeleton.
    ///
    /// # Errors
    ///
    /// - [`AnimationError::TooManyJoints`] if there are more than [`MAX_JOINTS`] joints
    /// - [`AnimationError::InvalidSkeleton`] if the skeleton is empty, joint 0 is not
    ///   the only parentless joint, a parent or mapped joint index is out of range,
    ///   or the parent links form a cycle
    pub fn build(self) -> AnimationResult<Skeleton> {
        let count = self.joints.len();

        if count == 0 {
            return Err(AnimationError::InvalidSkeleton(format!(
                "skeleton '{}' has no joints",
                self.name
            )));
        }
        if count > MAX_JOINTS {
            return Err(AnimationError::TooManyJoints {
                count,
                max: MAX_JOINTS,
            });
        }

        for (index, (name, parent, _)) in self.joints.iter().enumerate() {
            match (index, parent) {
                (ROOT_JOINT, None) => {}
                (ROOT_JOINT, Some(_)) => {
                    return Err(AnimationError::InvalidSkeleton(format!(
                        "root joint '{name}' has a parent"
                    )));
                }
                (_, None) => {
                    return Err(AnimationError::InvalidSkeleton(format!(
                        "joint '{name}' ({index}) has no parent, only the root may"
                    )));
                }
                (_, Some(parent)) if *parent >= count || *parent == index => {
                    return Err(AnimationError::InvalidSkeleton(format!(
                        "joint '{name}' ({index}) has invalid parent {parent}"
                    )));
                }
                _ => {}
            }
        }

        // Every chain of parents must reach the root within `count` steps
        for start in 0..count {
            let mut current = start;
            let mut steps = 0;
            while let Some(parent) = self.joints[current].1 {
                current = parent;
                steps += 1;
                if steps > count {
                    return Err(AnimationError::InvalidSkeleton(format!(
                        "joint {start} is part of a parent cycle"
                    )));
                }
            }
        }

        if let Some((node, joint)) = self.node_to_joint.iter().find(|(_, j)| **j >= count) {
            return Err(AnimationError::InvalidSkeleton(format!(
                "node {node} is mapped to missing joint {joint}"
            )));
        }

        let mut joints: Vec<Joint> = self
            .joints
            .into_iter()
            .map(|(name, parent, inverse_bind)| Joint::new(name, parent, inverse_bind))
            .collect();

        for index in 0..count {
            if let Some(parent) = joints[index].parent {
                joints[parent].children.push(index);
            }
        }

        debug!("Built skeleton '{}' with {} joints", self.name, count);

        Ok(Skeleton {
            name: self.name,
            joints,
            node_to_joint: self.node_to_joint,
            final_matrices: vec![Mat4::IDENTITY; count],
            is_animated: true,
        })
    }
}

/// Validated joint hierarchy with its final skinning matrices.
#[derive(Clone, Debug)]
pub struct Skeleton {
    name: String,
    joints: Vec<Joint>,
    node_to_joint: HashMap<usize, usize>,
    final_matrices: Vec<Mat4>,
    is_animated: bool,
}

impl Skeleton {
    /// Recomputes the final matrices from the joints' deformed state.
    ///
    /// A skeleton that is not animated yields identity matrices, so the mesh
    /// renders in its bind pose.
    pub fn update(&mut self) {
        if !self.is_animated {
            self.final_matrices.fill(Mat4::IDENTITY);
            return;
        }

        for (matrix, joint) in self.final_matrices.iter_mut().zip(&self.joints) {
            *matrix = joint.deformed_bind_matrix();
        }

        propagate(&self.joints, &mut self.final_matrices, ROOT_JOINT);

        for (matrix, joint) in self.final_matrices.iter_mut().zip(&self.joints) {
            *matrix *= joint.inverse_bind_matrix;
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    #[inline]
    pub fn joints_mut(&mut self) -> &mut [Joint] {
        &mut self.joints
    }

    #[inline]
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Joint driven by the external node `node`, if mapped.
    #[inline]
    pub fn joint_index_for_node(&self, node: usize) -> Option<usize> {
        self.node_to_joint.get(&node).copied()
    }

    /// Final skinning matrices, one per joint, as of the last [`update`](Self::update).
    #[inline]
    pub fn final_matrices(&self) -> &[Mat4] {
        &self.final_matrices
    }

    #[inline]
    pub fn is_animated(&self) -> bool {
        self.is_animated
    }

    #[inline]
    pub fn set_animated(&mut self, animated: bool) {
        self.is_animated = animated;
    }
}

/// Pre-order walk: a parent's matrix is final before its children read it.
fn propagate(joints: &[Joint], matrices: &mut [Mat4], index: usize) {
    if let Some(parent) = joints[index].parent {
        matrices[index] = matrices[parent] * matrices[index];
    }

    for &child in &joints[index].children {
        propagate(joints, matrices, child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(length: usize) -> Skeleton {
        let mut builder = SkeletonBuilder::new("chain");
        let mut parent = None;
        for i in 0..length {
            parent = Some(builder.add_joint(format!("joint{i}"), parent, Mat4::IDENTITY));
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_build_links_children() {
        let mut builder = SkeletonBuilder::new("tree");
        let root = builder.add_joint("root", None, Mat4::IDENTITY);
        let left = builder.add_joint("left", Some(root), Mat4::IDENTITY);
        let right = builder.add_joint("right", Some(root), Mat4::IDENTITY);
        let skeleton = builder.build().unwrap();

        assert_eq!(skeleton.joints()[root].children(), &[left, right]);
        assert_eq!(skeleton.joints()[right].parent(), Some(root));
        assert_eq!(skeleton.final_matrices().len(), 3);
    }

    #[test]
    fn test_build_accepts_forward_parent_reference() {
        let mut builder = SkeletonBuilder::new("forward");
        builder.add_joint("root", None, Mat4::IDENTITY);
        builder.add_joint("hand", Some(2), Mat4::IDENTITY);
        builder.add_joint("arm", Some(0), Mat4::IDENTITY);
        let skeleton = builder.build().unwrap();
        assert_eq!(skeleton.joints()[2].children(), &[1]);
    }

    #[test]
    fn test_build_rejects_invalid_hierarchies() {
        assert!(matches!(
            SkeletonBuilder::new("empty").build(),
            Err(AnimationError::InvalidSkeleton(_))
        ));

        let mut two_roots = SkeletonBuilder::new("two_roots");
        two_roots.add_joint("a", None, Mat4::IDENTITY);
        two_roots.add_joint("b", None, Mat4::IDENTITY);
        assert!(matches!(
            two_roots.build(),
            Err(AnimationError::InvalidSkeleton(_))
        ));

        let mut bad_parent = SkeletonBuilder::new("bad_parent");
        bad_parent.add_joint("a", None, Mat4::IDENTITY);
        bad_parent.add_joint("b", Some(5), Mat4::IDENTITY);
        assert!(matches!(
            bad_parent.build(),
            Err(AnimationError::InvalidSkeleton(_))
        ));

        let mut cycle = SkeletonBuilder::new("cycle");
        cycle.add_joint("root", None, Mat4::IDENTITY);
        cycle.add_joint("a", Some(2), Mat4::IDENTITY);
        cycle.add_joint("b", Some(1), Mat4::IDENTITY);
        assert!(matches!(
            cycle.build(),
            Err(AnimationError::InvalidSkeleton(_))
        ));

        let mut bad_mapping = SkeletonBuilder::new("bad_mapping");
        bad_mapping.add_joint("root", None, Mat4::IDENTITY);
        bad_mapping.map_node(3, 1);
        assert!(matches!(
            bad_mapping.build(),
            Err(AnimationError::InvalidSkeleton(_))
        ));
    }

    #[test]
    fn test_build_rejects_too_many_joints() {
        let mut builder = SkeletonBuilder::new("big");
        let root = builder.add_joint("root", None, Mat4::IDENTITY);
        for i in 0..MAX_JOINTS {
            builder.add_joint(format!("j{i}"), Some(root), Mat4::IDENTITY);
        }
        assert!(matches!(
            builder.build(),
            Err(AnimationError::TooManyJoints { count: 101, max: 100 })
        ));
    }

    #[test]
    fn test_deformed_bind_matrix_is_trs() {
        let mut skeleton = chain(1);
        let joint = &mut skeleton.joints_mut()[0];
        joint.deformed_position = Vec3::new(1.0, 2.0, 3.0);
        joint.deformed_rotation = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        joint.deformed_scale = Vec3::splat(2.0);

        let expected = Mat4::from_translation(joint.deformed_position)
            * Mat4::from_quat(joint.deformed_rotation)
            * Mat4::from_scale(joint.deformed_scale);
        assert!(joint.deformed_bind_matrix().abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn test_not_animated_yields_identity() {
        let mut skeleton = chain(3);
        for joint in skeleton.joints_mut() {
            joint.deformed_position = Vec3::new(0.0, 4.0, 0.0);
        }
        skeleton.set_animated(false);
        skeleton.update();
        assert!(skeleton.final_matrices().iter().all(|m| *m == Mat4::IDENTITY));
    }

    #[test]
    fn test_inverse_bind_applied_after_propagation() {
        let offset = Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0));
        let mut builder = SkeletonBuilder::new("pair");
        let root = builder.add_joint("root", None, Mat4::IDENTITY);
        builder.add_joint("child", Some(root), offset);
        let mut skeleton = builder.build().unwrap();

        skeleton.joints_mut()[0].deformed_position = Vec3::X;
        skeleton.joints_mut()[1].deformed_position = Vec3::Y;
        skeleton.update();

        // Propagated child translation is (1,1,0); the inverse bind adds (0,-1,0)
        let translation = skeleton.final_matrices()[1].w_axis.truncate();
        assert!(translation.abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-6));
    }
}
