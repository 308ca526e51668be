//! Skinned vertex format and GPU-resident meshes.
//!
//! # Memory Layout
//!
//! [`SkinnedVertex`] is `#[repr(C)]`:
//! - Offset 0: position (12 bytes)
//! - Offset 12: normal (12 bytes)
//! - Offset 24: joint indices (16 bytes)
//! - Offset 40: joint weights (16 bytes)
//! - Total size: 56 bytes
//!
//! # Shader Locations
//!
//! - location 0: position (vec3)
//! - location 1: normal (vec3)
//! - location 2: joint indices (ivec4)
//! - location 3: joint weights (vec4)

use std::any::Any;
use std::sync::Arc;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use tracing::debug;

use engine_rhi::buffer::Buffer;
use engine_rhi::device::Device;
use engine_rhi::{RhiError, RhiResult};
use engine_scene::MeshSource;

/// Vertex influenced by up to four joints.
///
/// Weights of one vertex should sum to 1; unused influences carry weight 0.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SkinnedVertex {
    /// Bind-pose position in model space.
    pub position: Vec3,
    pub normal: Vec3,
    pub joint_indices: [i32; 4],
    pub joint_weights: [f32; 4],
}

impl SkinnedVertex {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Vertex bound rigidly to a single joint.
    #[inline]
    pub const fn rigid(position: Vec3, normal: Vec3, joint: i32) -> Self {
        Self {
            position,
            normal,
            joint_indices: [joint, 0, 0, 0],
            joint_weights: [1.0, 0.0, 0.0, 0.0],
        }
    }

    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: Self::SIZE as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 4] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 12,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32B32A32_SINT,
                offset: 24,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 3,
                format: vk::Format::R32G32B32A32_SFLOAT,
                offset: 40,
            },
        ]
    }
}

/// Non-indexed skinned mesh in a device-local vertex buffer.
pub struct SkinnedMesh {
    device: Arc<Device>,
    name: String,
    vertex_buffer: Buffer,
    vertex_count: u32,
}

impl SkinnedMesh {
    /// Uploads `vertices` through a staging buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidHandle`] for an empty vertex list, or the
    /// error of the upload.
    pub fn upload(
        device: Arc<Device>,
        name: impl Into<String>,
        vertices: &[SkinnedVertex],
    ) -> RhiResult<Self> {
        let name = name.into();
        if vertices.is_empty() {
            return Err(RhiError::InvalidHandle(format!(
                "Mesh '{}' has no vertices",
                name
            )));
        }

        let vertex_buffer = Buffer::upload_device_local(
            Arc::clone(&device),
            bytemuck::cast_slice(vertices),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;

        debug!("Uploaded mesh '{}' ({} vertices)", name, vertices.len());

        Ok(Self {
            device,
            name,
            vertex_buffer,
            vertex_count: vertices.len() as u32,
        })
    }

    /// Binds the vertex buffer to binding 0.
    pub fn bind(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device.handle().cmd_bind_vertex_buffers(
                command_buffer,
                0,
                &[self.vertex_buffer.handle()],
                &[0],
            );
        }
    }

    pub fn draw(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device
                .handle()
                .cmd_draw(command_buffer, self.vertex_count, 1, 0, 0);
        }
    }
}

impl MeshSource for SkinnedMesh {
    fn name(&self) -> &str {
        &self.name
    }

    fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skinned_vertex_layout() {
        assert_eq!(SkinnedVertex::SIZE, 56);
        assert_eq!(std::mem::offset_of!(SkinnedVertex, normal), 12);
        assert_eq!(std::mem::offset_of!(SkinnedVertex, joint_indices), 24);
        assert_eq!(std::mem::offset_of!(SkinnedVertex, joint_weights), 40);
    }

    #[test]
    fn test_attribute_descriptions_match_layout() {
        let binding = SkinnedVertex::binding_description();
        assert_eq!(binding.stride, 56);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);

        let attrs = SkinnedVertex::attribute_descriptions();
        let offsets: Vec<u32> = attrs.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24, 40]);
        assert_eq!(attrs[2].format, vk::Format::R32G32B32A32_SINT);
        assert_eq!(attrs[3].format, vk::Format::R32G32B32A32_SFLOAT);
        assert!(attrs.iter().enumerate().all(|(i, a)| a.location == i as u32));
    }

    #[test]
    fn test_rigid_vertex_weights() {
        let vertex = SkinnedVertex::rigid(Vec3::ONE, Vec3::Y, 2);
        assert_eq!(vertex.joint_indices[0], 2);
        assert_eq!(vertex.joint_weights.iter().sum::<f32>(), 1.0);
    }

    #[test]
    fn test_skinned_mesh_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SkinnedMesh>();
    }
}
