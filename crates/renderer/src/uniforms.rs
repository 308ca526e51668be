//! Per-frame uniform data shared with the shaders.
//!
//! [`GlobalUbo`] and [`JointUbo`] mirror the shader-side uniform blocks
//! byte for byte. Both use `#[repr(C)]` with explicit tail padding so that
//! `Pod` can be derived and the structs can be copied straight into mapped
//! memory.
//!
//! [`FrameUniforms`] owns one host-visible buffer per block, each holding an
//! entry per frame slot, plus one descriptor set per slot that binds that
//! slot's entries:
//!
//! | binding | block       | stages            |
//! |---------|-------------|-------------------|
//! | 0       | `GlobalUbo` | vertex, fragment  |
//! | 1       | `JointUbo`  | vertex            |

use std::sync::Arc;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use tracing::{debug, warn};

use engine_animation::{MAX_JOINTS, Skeleton};
use engine_rhi::RhiResult;
use engine_rhi::buffer::Buffer;
use engine_rhi::descriptor::{
    DescriptorPool, DescriptorPoolBuilder, DescriptorSetLayout, DescriptorSetLayoutBuilder,
    DescriptorWriter,
};
use engine_rhi::device::Device;
use engine_rhi::swapchain::MAX_FRAMES_IN_FLIGHT;
use engine_scene::{Camera, PointLight};

/// Number of point lights the global block has room for.
pub const MAX_LIGHTS: usize = 10;

/// One point light as the shaders see it.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PointLightUbo {
    /// World position in xyz, w is always 1.
    pub position: Vec4,
    /// Color in rgb, intensity in w.
    pub color: Vec4,
}

impl From<&PointLight> for PointLightUbo {
    fn from(light: &PointLight) -> Self {
        Self {
            position: light.position.extend(1.0),
            color: light.color.extend(light.intensity),
        }
    }
}

/// Camera matrices and lighting for one frame.
///
/// # Memory Layout
///
/// - Offset 0: projection (64 bytes)
/// - Offset 64: view (64 bytes)
/// - Offset 128: inverse view (64 bytes)
/// - Offset 192: ambient light (16 bytes)
/// - Offset 208: point lights (10 x 32 bytes)
/// - Offset 528: light count + padding (16 bytes)
/// - Total size: 544 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GlobalUbo {
    pub projection: Mat4,
    pub view: Mat4,
    pub inverse_view: Mat4,
    /// Ambient color in rgb, strength in w.
    pub ambient_light: Vec4,
    pub point_lights: [PointLightUbo; MAX_LIGHTS],
    pub num_lights: i32,
    pub _padding: [i32; 3],
}

impl Default for GlobalUbo {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            inverse_view: Mat4::IDENTITY,
            ambient_light: Vec4::new(1.0, 1.0, 1.0, 0.02),
            point_lights: [PointLightUbo::default(); MAX_LIGHTS],
            num_lights: 0,
            _padding: [0; 3],
        }
    }
}

impl GlobalUbo {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Copies the camera matrices.
    pub fn set_camera(&mut self, camera: &Camera) {
        self.projection = camera.projection();
        self.view = camera.view();
        self.inverse_view = camera.inverse_view();
    }

    /// Rewrites the light table from `lights`.
    ///
    /// Lights past [`MAX_LIGHTS`] are dropped.
    pub fn update_lights<'a>(&mut self, lights: impl IntoIterator<Item = &'a PointLight>) {
        let mut count = 0;
        let mut dropped = 0;

        for light in lights {
            if count < MAX_LIGHTS {
                self.point_lights[count] = PointLightUbo::from(light);
                count += 1;
            } else {
                dropped += 1;
            }
        }

        if dropped > 0 {
            warn!(
                "{} point lights exceed the limit of {} and were not uploaded",
                dropped, MAX_LIGHTS
            );
        }

        self.point_lights[count..].fill(PointLightUbo::default());
        self.num_lights = count as i32;
    }
}

/// Final joint matrices of one skinned model.
///
/// - Offset 0: joint matrices (100 x 64 bytes)
/// - Offset 6400: joint count + padding (16 bytes)
/// - Total size: 6416 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct JointUbo {
    pub joint_matrices: [Mat4; MAX_JOINTS],
    pub num_joints: i32,
    pub _padding: [i32; 3],
}

impl Default for JointUbo {
    fn default() -> Self {
        Self {
            joint_matrices: [Mat4::IDENTITY; MAX_JOINTS],
            num_joints: 0,
            _padding: [0; 3],
        }
    }
}

impl JointUbo {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Snapshot of the skeleton's current final matrices.
    ///
    /// Slots past the joint count stay identity.
    pub fn from_skeleton(skeleton: &Skeleton) -> Self {
        let mut ubo = Self::default();
        let matrices = skeleton.final_matrices();
        let count = matrices.len().min(MAX_JOINTS);
        ubo.joint_matrices[..count].copy_from_slice(&matrices[..count]);
        ubo.num_joints = count as i32;
        ubo
    }
}

/// Uniform buffers and descriptor sets for every frame slot.
///
/// Each block type lives in one buffer with a [`MAX_FRAMES_IN_FLIGHT`]
/// entry array; slot `i` reads entry `i` through its own descriptor set.
pub struct FrameUniforms {
    // Sets are freed with the pool, so the sets go first.
    descriptor_sets: Vec<vk::DescriptorSet>,
    global: Buffer,
    joints: Buffer,
    pool: DescriptorPool,
    layout: DescriptorSetLayout,
}

impl FrameUniforms {
    /// Creates the mapped uniform buffers and a descriptor set for each of
    /// the [`MAX_FRAMES_IN_FLIGHT`] slots.
    ///
    /// # Errors
    ///
    /// Returns an error if buffer creation, mapping or descriptor allocation
    /// fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let layout = DescriptorSetLayoutBuilder::new()
            .add_binding(
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                1,
            )
            .add_binding(
                1,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::VERTEX,
                1,
            )
            .build(Arc::clone(&device))?;

        let slots = MAX_FRAMES_IN_FLIGHT as u32;
        let pool = DescriptorPoolBuilder::new()
            .max_sets(slots)
            .add_pool_size(vk::DescriptorType::UNIFORM_BUFFER, 2 * slots)
            .build(Arc::clone(&device))?;

        let global = mapped_uniform_buffer(&device, GlobalUbo::SIZE)?;
        let joints = mapped_uniform_buffer(&device, JointUbo::SIZE)?;

        let mut descriptor_sets = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for index in 0..slots {
            let set = DescriptorWriter::new(&layout, &pool)
                .write_buffer(0, global.descriptor_info_for_index(index))?
                .write_buffer(1, joints.descriptor_info_for_index(index))?
                .build()?;
            descriptor_sets.push(set);
        }

        debug!(
            "Created uniform buffers for {} frame slots (strides {} and {} bytes)",
            slots,
            global.alignment_size(),
            joints.alignment_size()
        );

        Ok(Self {
            descriptor_sets,
            global,
            joints,
            pool,
            layout,
        })
    }

    /// Uploads both blocks into the entries of `frame_index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot is out of range or a write or flush
    /// fails.
    pub fn write(
        &mut self,
        frame_index: usize,
        global: &GlobalUbo,
        joints: &JointUbo,
    ) -> RhiResult<()> {
        if frame_index >= MAX_FRAMES_IN_FLIGHT {
            return Err(engine_rhi::RhiError::InvalidHandle(format!(
                "Frame slot {} out of range (have {})",
                frame_index, MAX_FRAMES_IN_FLIGHT
            )));
        }
        let index = frame_index as u32;

        self.global
            .write_to_index(bytemuck::bytes_of(global), index)?;
        self.global.flush_index(index)?;

        self.joints
            .write_to_index(bytemuck::bytes_of(joints), index)?;
        self.joints.flush_index(index)?;

        Ok(())
    }

    /// Descriptor set bound for `frame_index`.
    ///
    /// # Panics
    ///
    /// Panics if `frame_index >= MAX_FRAMES_IN_FLIGHT`.
    #[inline]
    pub fn descriptor_set(&self, frame_index: usize) -> vk::DescriptorSet {
        self.descriptor_sets[frame_index]
    }

    /// Layout shared by every frame's set, for pipeline layout creation.
    #[inline]
    pub fn layout(&self) -> vk::DescriptorSetLayout {
        self.layout.handle()
    }

    /// Pool the sets were allocated from.
    #[inline]
    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }
}

fn mapped_uniform_buffer(device: &Arc<Device>, size: usize) -> RhiResult<Buffer> {
    let alignment = device
        .properties()
        .limits
        .min_uniform_buffer_offset_alignment;

    let mut buffer = Buffer::new(
        Arc::clone(device),
        size as vk::DeviceSize,
        MAX_FRAMES_IN_FLIGHT as u32,
        vk::BufferUsageFlags::UNIFORM_BUFFER,
        vk::MemoryPropertyFlags::HOST_VISIBLE,
        alignment,
    )?;
    buffer.map_all()?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_animation::SkeletonBuilder;
    use glam::Vec3;

    #[test]
    fn test_global_ubo_layout() {
        assert_eq!(GlobalUbo::SIZE, 544);
        assert_eq!(GlobalUbo::SIZE % 16, 0);
        assert_eq!(std::mem::offset_of!(GlobalUbo, ambient_light), 192);
        assert_eq!(std::mem::offset_of!(GlobalUbo, point_lights), 208);
        assert_eq!(std::mem::offset_of!(GlobalUbo, num_lights), 528);
    }

    #[test]
    fn test_joint_ubo_layout() {
        assert_eq!(JointUbo::SIZE, 6416);
        assert_eq!(std::mem::offset_of!(JointUbo, num_joints), 6400);
    }

    #[test]
    fn test_global_ubo_default_ambient() {
        let ubo = GlobalUbo::default();
        assert_eq!(ubo.ambient_light, Vec4::new(1.0, 1.0, 1.0, 0.02));
        assert_eq!(ubo.num_lights, 0);
    }

    #[test]
    fn test_update_lights_packs_intensity() {
        let light = PointLight::new(Vec3::new(1.0, 2.0, 3.0))
            .with_color(Vec3::new(0.5, 0.25, 1.0))
            .with_intensity(4.0);

        let mut ubo = GlobalUbo::default();
        ubo.update_lights([&light]);

        assert_eq!(ubo.num_lights, 1);
        assert_eq!(ubo.point_lights[0].position, Vec4::new(1.0, 2.0, 3.0, 1.0));
        assert_eq!(ubo.point_lights[0].color, Vec4::new(0.5, 0.25, 1.0, 4.0));
    }

    #[test]
    fn test_update_lights_caps_at_max() {
        let lights: Vec<PointLight> = (0..MAX_LIGHTS + 3)
            .map(|i| PointLight::new(Vec3::splat(i as f32)))
            .collect();

        let mut ubo = GlobalUbo::default();
        ubo.update_lights(&lights);

        assert_eq!(ubo.num_lights, MAX_LIGHTS as i32);
        assert_eq!(
            ubo.point_lights[MAX_LIGHTS - 1].position,
            Vec4::new(9.0, 9.0, 9.0, 1.0)
        );
    }

    #[test]
    fn test_update_lights_clears_stale_entries() {
        let lights: Vec<PointLight> = (0..3).map(|_| PointLight::new(Vec3::ONE)).collect();
        let mut ubo = GlobalUbo::default();
        ubo.update_lights(&lights);
        ubo.update_lights(&lights[..1]);

        assert_eq!(ubo.num_lights, 1);
        assert_eq!(ubo.point_lights[1], PointLightUbo::default());
    }

    #[test]
    fn test_slot_entries_use_aligned_stride() {
        use engine_rhi::buffer::{align, index_range};

        // 544 rounds up to 768 with a 256-byte alignment
        let global_stride = align(GlobalUbo::SIZE as u64, 256);
        assert_eq!(index_range(0, global_stride), (0, 768));
        assert_eq!(index_range(1, global_stride), (768, 768));

        let joint_stride = align(JointUbo::SIZE as u64, 64);
        assert_eq!(index_range(1, joint_stride), (6464, 6464));
        assert!(index_range(MAX_FRAMES_IN_FLIGHT as u32 - 1, joint_stride).0 + joint_stride
            <= joint_stride * MAX_FRAMES_IN_FLIGHT as u64);
    }

    #[test]
    fn test_joint_ubo_from_skeleton() {
        let mut builder = SkeletonBuilder::new("chain");
        let root = builder.add_joint("root", None, Mat4::IDENTITY);
        builder.add_joint("tip", Some(root), Mat4::IDENTITY);
        let mut skeleton = builder.build().unwrap();
        skeleton.joints_mut()[root].deformed_position = Vec3::new(0.0, 2.0, 0.0);
        skeleton.update();

        let ubo = JointUbo::from_skeleton(&skeleton);

        assert_eq!(ubo.num_joints, 2);
        assert_eq!(ubo.joint_matrices[0], skeleton.final_matrices()[0]);
        assert_eq!(ubo.joint_matrices[2], Mat4::IDENTITY);
    }
}
