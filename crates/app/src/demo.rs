//! Built-in demo content: a swaying three-bone arm and a ring of lights.

use std::f32::consts::{FRAC_PI_4, TAU};
use std::sync::Arc;

use anyhow::Result;
use glam::{Mat4, Quat, Vec3, Vec4};

use engine_animation::{
    Channel, Interpolation, Path, Sampler, SkeletalAnimation, SkeletalAnimations, SkeletonBuilder,
    SkinnedModel,
};
use engine_renderer::SkinnedVertex;
use engine_scene::{GameObject, MeshSource, ObjectRegistry, PointLight, TransformComponent};

/// Bones in the arm, one box each.
const ARM_SEGMENTS: u32 = 3;

/// Vertices in the arm mesh: one 36-vertex box per segment.
const ARM_VERTEX_COUNT: u32 = ARM_SEGMENTS * 36;

/// Half the width of each arm segment.
const SEGMENT_HALF_WIDTH: f32 = 0.15;

const LIGHT_COLORS: [Vec3; 6] = [
    Vec3::new(1.0, 0.1, 0.1),
    Vec3::new(0.1, 0.1, 1.0),
    Vec3::new(0.1, 1.0, 0.1),
    Vec3::new(1.0, 1.0, 0.1),
    Vec3::new(0.1, 1.0, 1.0),
    Vec3::new(1.0, 1.0, 1.0),
];

/// Six quads of a box, as corner selectors (`true` picks the max coordinate).
const BOX_FACES: [(Vec3, [[bool; 3]; 4]); 6] = [
    (Vec3::X, [[true, false, false], [true, true, false], [true, true, true], [true, false, true]]),
    (Vec3::NEG_X, [[false, false, false], [false, false, true], [false, true, true], [false, true, false]]),
    (Vec3::Y, [[false, true, false], [false, true, true], [true, true, true], [true, true, false]]),
    (Vec3::NEG_Y, [[false, false, false], [true, false, false], [true, false, true], [false, false, true]]),
    (Vec3::Z, [[false, false, true], [true, false, true], [true, true, true], [false, true, true]]),
    (Vec3::NEG_Z, [[false, false, false], [false, true, false], [true, true, false], [true, false, false]]),
];

/// Triangle list of an axis-aligned box rigidly bound to `joint`.
fn box_vertices(min: Vec3, max: Vec3, joint: i32) -> impl Iterator<Item = SkinnedVertex> {
    let corner = move |[x, y, z]: [bool; 3]| {
        Vec3::new(
            if x { max.x } else { min.x },
            if y { max.y } else { min.y },
            if z { max.z } else { min.z },
        )
    };

    BOX_FACES.into_iter().flat_map(move |(normal, corners)| {
        [0, 1, 2, 0, 2, 3]
            .into_iter()
            .map(move |i| SkinnedVertex::rigid(corner(corners[i]), normal, joint))
    })
}

/// Bind-pose geometry of the arm: segment `i` spans `y` in `[-(i + 1), -i]`
/// and follows joint `i` alone.
pub fn arm_vertices() -> Vec<SkinnedVertex> {
    (0..ARM_SEGMENTS)
        .flat_map(|segment| {
            let top = -(segment as f32);
            let min = Vec3::new(-SEGMENT_HALF_WIDTH, top - 1.0, -SEGMENT_HALF_WIDTH);
            let max = Vec3::new(SEGMENT_HALF_WIDTH, top, SEGMENT_HALF_WIDTH);
            box_vertices(min, max, segment as i32)
        })
        .collect()
}

/// Three joints stacked along -Y, one unit apart, with a looping sway on the
/// two upper joints.
pub fn build_arm() -> Result<SkinnedModel> {
    let mut builder = SkeletonBuilder::new("arm");
    let shoulder = builder.add_joint("shoulder", None, Mat4::IDENTITY);
    let elbow = builder.add_joint(
        "elbow",
        Some(shoulder),
        Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)),
    );
    let wrist = builder.add_joint(
        "wrist",
        Some(elbow),
        Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0)),
    );
    builder
        .map_node(0, shoulder)
        .map_node(1, elbow)
        .map_node(2, wrist);
    let mut skeleton = builder.build()?;

    for joint in &mut skeleton.joints_mut()[1..] {
        joint.deformed_position = Vec3::new(0.0, -1.0, 0.0);
    }

    let sway = |angle: f32| {
        let q = Quat::from_rotation_z(angle);
        Vec4::new(q.x, q.y, q.z, q.w)
    };
    let timestamps = vec![0.0, 1.0, 2.0];

    let samplers = vec![
        Sampler::new(
            Interpolation::Linear,
            timestamps.clone(),
            vec![sway(-FRAC_PI_4), sway(FRAC_PI_4), sway(-FRAC_PI_4)],
        )?,
        Sampler::new(
            Interpolation::Linear,
            timestamps,
            vec![sway(0.0), sway(FRAC_PI_4), sway(0.0)],
        )?,
    ];
    let channels = vec![
        Channel {
            path: Path::Rotation,
            sampler: 0,
            target_node: 0,
        },
        Channel {
            path: Path::Rotation,
            sampler: 1,
            target_node: 1,
        },
    ];

    let mut animations = SkeletalAnimations::new();
    animations.push(SkeletalAnimation::new("sway", samplers, channels)?);
    animations.set_repeat_all(true);
    animations.start("sway")?;

    let mut model = SkinnedModel::new("arm", skeleton, animations, ARM_VERTEX_COUNT);
    model.skeleton_mut().update();
    Ok(model)
}

/// Registers the arm mesh and a ring of point lights around it.
pub fn build_scene(mesh: Arc<dyn MeshSource>) -> ObjectRegistry {
    let mut registry = ObjectRegistry::new();

    registry.add_game_object(
        GameObject::new(mesh, "arm")
            .with_color(Vec3::new(0.8, 0.8, 0.8))
            .with_transform(TransformComponent::new().with_translation(Vec3::new(0.0, 0.0, 3.0))),
    );

    for (i, color) in LIGHT_COLORS.iter().enumerate() {
        let angle = i as f32 * TAU / LIGHT_COLORS.len() as f32;
        let position = Vec3::new(angle.cos() * 2.0, -1.5, 3.0 + angle.sin() * 2.0);
        registry.add_point_light(
            PointLight::new(position)
                .with_color(*color)
                .with_intensity(0.4)
                .with_radius(0.1),
        );
    }

    registry
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use glam::Vec4Swizzles;

    struct Outline(u32);

    impl MeshSource for Outline {
        fn name(&self) -> &str {
            "outline"
        }

        fn vertex_count(&self) -> u32 {
            self.0
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_arm_builds_and_animates() {
        let mut model = build_arm().unwrap();
        assert_eq!(model.skeleton().joint_count(), 3);
        assert!(model.animations().is_running());

        let before = model.skeleton().final_matrices()[2];
        model.advance(0.5).unwrap();
        let after = model.skeleton().final_matrices()[2];
        assert_ne!(before, after);
    }

    #[test]
    fn test_first_keyframe_swings_wrist_around_shoulder() {
        let mut model = build_arm().unwrap();
        model.advance(0.0).unwrap();

        let skeleton = model.skeleton();
        let global = skeleton.final_matrices()[2] * skeleton.joints()[2].inverse_bind_matrix.inverse();
        let wrist = global.col(3).xyz();

        assert!((wrist.length() - 2.0).abs() < 1e-4);
        assert!(wrist.x.abs() > 0.1);
    }

    #[test]
    fn test_arm_vertices_follow_their_segment() {
        let vertices = arm_vertices();
        assert_eq!(vertices.len(), ARM_VERTEX_COUNT as usize);

        for (i, vertex) in vertices.iter().enumerate() {
            let segment = (i / 36) as i32;
            assert_eq!(vertex.joint_indices[0], segment);
            assert_eq!(vertex.joint_weights, [1.0, 0.0, 0.0, 0.0]);

            let top = -(segment as f32);
            assert!(vertex.position.y <= top && vertex.position.y >= top - 1.0);
            assert_eq!(vertex.normal.length(), 1.0);
        }
    }

    #[test]
    fn test_box_faces_point_outward() {
        let center = Vec3::new(0.0, -0.5, 0.0);
        let vertices: Vec<SkinnedVertex> = box_vertices(
            Vec3::new(-0.5, -1.0, -0.5),
            Vec3::new(0.5, 0.0, 0.5),
            0,
        )
        .collect();

        for triangle in vertices.chunks(3) {
            let centroid = triangle.iter().map(|v| v.position).sum::<Vec3>() / 3.0;
            assert!((centroid - center).dot(triangle[0].normal) > 0.0);
        }
    }

    #[test]
    fn test_scene_contents() {
        let registry = build_scene(Arc::new(Outline(ARM_VERTEX_COUNT)));

        assert_eq!(registry.game_objects().count(), 1);
        assert_eq!(registry.point_lights().count(), LIGHT_COLORS.len());
        assert_eq!(registry.vertex_count(), u64::from(ARM_VERTEX_COUNT));
    }
}
