//! End-to-end animation and skinning behavior.

use glam::{Mat4, Quat, Vec3, Vec4};

use engine_animation::{
    Channel, Interpolation, Path, Sampler, SkeletalAnimation, SkeletalAnimations, Skeleton,
    SkeletonBuilder, SkinnedModel,
};

const ROOT_NODE: usize = 10;
const CHILD_NODE: usize = 11;
const GRANDCHILD_NODE: usize = 12;

fn three_joint_chain() -> Skeleton {
    let mut builder = SkeletonBuilder::new("chain");
    let root = builder.add_joint("root", None, Mat4::IDENTITY);
    let child = builder.add_joint("child", Some(root), Mat4::IDENTITY);
    let grandchild = builder.add_joint("grandchild", Some(child), Mat4::IDENTITY);
    builder
        .map_node(ROOT_NODE, root)
        .map_node(CHILD_NODE, child)
        .map_node(GRANDCHILD_NODE, grandchild);
    builder.build().unwrap()
}

fn slide_x(node: usize, last: f32, to: f32) -> SkeletalAnimation {
    let sampler = Sampler::new(
        Interpolation::Linear,
        vec![0.0, last],
        vec![Vec4::ZERO, Vec4::new(to, 0.0, 0.0, 0.0)],
    )
    .unwrap();
    SkeletalAnimation::new(
        "slide",
        vec![sampler],
        vec![Channel {
            path: Path::Translation,
            sampler: 0,
            target_node: node,
        }],
    )
    .unwrap()
}

#[test]
fn chain_translations_compose_along_hierarchy() {
    let mut skeleton = three_joint_chain();
    for joint in skeleton.joints_mut() {
        joint.deformed_position = Vec3::new(1.0, 0.0, 0.0);
    }

    skeleton.update();

    let translation = skeleton.final_matrices()[2].w_axis.truncate();
    assert!(translation.abs_diff_eq(Vec3::new(3.0, 0.0, 0.0), 1e-6));
}

#[test]
fn repeated_update_is_idempotent() {
    let mut skeleton = three_joint_chain();
    skeleton.joints_mut()[0].deformed_rotation = Quat::from_rotation_z(0.3);
    skeleton.joints_mut()[1].deformed_position = Vec3::new(0.0, 2.0, 0.0);
    skeleton.joints_mut()[2].deformed_scale = Vec3::splat(0.5);
    skeleton.joints_mut()[2].inverse_bind_matrix = Mat4::from_translation(Vec3::new(0.0, -3.0, 0.0));

    skeleton.update();
    let first = skeleton.final_matrices().to_vec();
    skeleton.update();

    assert_eq!(first, skeleton.final_matrices());
}

#[test]
fn linear_channel_poses_joint() {
    let mut skeleton = three_joint_chain();
    let mut animation = slide_x(CHILD_NODE, 1.0, 10.0);

    animation.start();
    animation.update(0.0, &mut skeleton).unwrap();
    assert_eq!(skeleton.joints()[1].deformed_position, Vec3::ZERO);

    animation.update(0.5, &mut skeleton).unwrap();
    assert!((skeleton.joints()[1].deformed_position.x - 5.0).abs() < 1e-6);

    animation.update(0.5, &mut skeleton).unwrap();
    assert!((skeleton.joints()[1].deformed_position.x - 10.0).abs() < 1e-6);
}

#[test]
fn repeating_animation_restarts_at_first_keyframe() {
    let mut skeleton = three_joint_chain();
    let mut animation = slide_x(ROOT_NODE, 2.0, 4.0);
    animation.set_repeat(true);
    animation.start();

    assert!(animation.will_expire(2.5));
    animation.update(2.5, &mut skeleton).unwrap();

    // Discrete reset: the 0.5 s overshoot is dropped
    assert_eq!(animation.current_time(), 0.0);
    assert_eq!(skeleton.joints()[0].deformed_position, Vec3::ZERO);
    assert!(animation.is_running());
}

#[test]
fn channels_on_one_joint_compose_by_path() {
    let mut skeleton = three_joint_chain();
    let translation = Sampler::new(
        Interpolation::Step,
        vec![0.0, 1.0],
        vec![Vec4::new(0.0, 1.0, 0.0, 0.0), Vec4::ZERO],
    )
    .unwrap();
    let scale = Sampler::new(
        Interpolation::Step,
        vec![0.0, 1.0],
        vec![Vec4::splat(2.0), Vec4::ONE],
    )
    .unwrap();
    let mut animation = SkeletalAnimation::new(
        "pulse",
        vec![translation, scale],
        vec![
            Channel {
                path: Path::Translation,
                sampler: 0,
                target_node: GRANDCHILD_NODE,
            },
            Channel {
                path: Path::Scale,
                sampler: 1,
                target_node: GRANDCHILD_NODE,
            },
        ],
    )
    .unwrap();

    animation.start();
    animation.update(0.25, &mut skeleton).unwrap();

    let joint = &skeleton.joints()[2];
    assert_eq!(joint.deformed_position, Vec3::Y);
    assert_eq!(joint.deformed_scale, Vec3::splat(2.0));
    assert_eq!(joint.deformed_rotation, Quat::IDENTITY);
}

#[test]
fn skinned_model_advance_updates_final_matrices() {
    let mut animations = SkeletalAnimations::new();
    animations.push(slide_x(GRANDCHILD_NODE, 1.0, 2.0));
    animations.start("slide").unwrap();

    let mut model = SkinnedModel::new("chain", three_joint_chain(), animations, 36);
    model.advance(0.5).unwrap();

    let translation = model.skeleton().final_matrices()[2].w_axis.truncate();
    assert!(translation.abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-6));
    assert_eq!(model.vertex_count(), 36);
    assert_eq!(model.animations().current_time(), 0.5);
}
