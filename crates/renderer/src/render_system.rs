//! Draws skinned game objects.
//!
//! [`SkinnedMeshSystem`] owns the skinned pipeline. Each frame it binds the
//! frame slot's uniform set at set 0, then pushes each object's model matrix
//! and tint before drawing its mesh. The vertex shader blends the joint
//! matrices from set 0, binding 1.
//!
//! # Example
//!
//! ```no_run
//! # use std::path::Path;
//! # use std::sync::Arc;
//! # use engine_renderer::{FrameUniforms, Renderer, SkinnedMeshSystem};
//! # use engine_scene::ObjectRegistry;
//! # fn example(
//! #     renderer: &Renderer,
//! #     uniforms: &FrameUniforms,
//! #     registry: &ObjectRegistry,
//! #     cmd: engine_rhi::vk::CommandBuffer,
//! # ) -> engine_rhi::RhiResult<()> {
//! let system = SkinnedMeshSystem::new(
//!     Arc::clone(renderer.device()),
//!     renderer.render_pass(),
//!     uniforms.layout(),
//!     Path::new("shaders"),
//! )?;
//! system.render(cmd, uniforms.descriptor_set(renderer.frame_index()), registry);
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use tracing::{info, trace};

use engine_rhi::RhiResult;
use engine_rhi::device::Device;
use engine_rhi::pipeline::{GraphicsPipeline, PipelineConfig, PipelineLayout};
use engine_rhi::shader::{ShaderModule, ShaderStage};
use engine_scene::{GameObject, ObjectRegistry};

use crate::mesh::{SkinnedMesh, SkinnedVertex};

/// Compiled vertex shader of the skinned pipeline, relative to the shader directory.
pub const SKINNED_VERTEX_SHADER: &str = "skinned.vert.spv";
/// Compiled fragment shader of the skinned pipeline.
pub const SKINNED_FRAGMENT_SHADER: &str = "skinned.frag.spv";

/// Per-object push constants.
///
/// - Offset 0: model matrix (64 bytes)
/// - Offset 64: color (12 bytes)
/// - Offset 76: padding (4 bytes)
/// - Total size: 80 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SkinnedPushConstants {
    pub model_matrix: Mat4,
    pub color: Vec3,
    pub _padding: f32,
}

impl SkinnedPushConstants {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub const STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(
        vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw(),
    );

    /// Push constant range of the skinned pipeline layout.
    pub fn range() -> vk::PushConstantRange {
        vk::PushConstantRange {
            stage_flags: Self::STAGES,
            offset: 0,
            size: Self::SIZE as u32,
        }
    }
}

impl From<&GameObject> for SkinnedPushConstants {
    fn from(object: &GameObject) -> Self {
        Self {
            model_matrix: object.transform.matrix(),
            color: object.color,
            _padding: 0.0,
        }
    }
}

/// Pipeline and layout for skinned meshes.
pub struct SkinnedMeshSystem {
    device: Arc<Device>,
    // The pipeline goes before the layout it was built against.
    pipeline: GraphicsPipeline,
    layout: PipelineLayout,
}

impl SkinnedMeshSystem {
    /// Loads the skinned shaders from `shader_dir` and builds the pipeline
    /// for `render_pass`.
    ///
    /// # Errors
    ///
    /// Returns an error if a shader is missing or invalid, or if layout or
    /// pipeline creation fails.
    pub fn new(
        device: Arc<Device>,
        render_pass: vk::RenderPass,
        set_layout: vk::DescriptorSetLayout,
        shader_dir: &Path,
    ) -> RhiResult<Self> {
        let layout = PipelineLayout::new(
            Arc::clone(&device),
            &[set_layout],
            &[SkinnedPushConstants::range()],
        )?;

        let vertex = ShaderModule::from_spirv_file(
            Arc::clone(&device),
            &shader_dir.join(SKINNED_VERTEX_SHADER),
            ShaderStage::Vertex,
        )?;
        let fragment = ShaderModule::from_spirv_file(
            Arc::clone(&device),
            &shader_dir.join(SKINNED_FRAGMENT_SHADER),
            ShaderStage::Fragment,
        )?;

        let pipeline = GraphicsPipeline::new(
            Arc::clone(&device),
            &PipelineConfig::default(),
            &[&vertex, &fragment],
            &[SkinnedVertex::binding_description()],
            &SkinnedVertex::attribute_descriptions(),
            &layout,
            render_pass,
        )?;

        info!("Skinned mesh system ready");

        Ok(Self {
            device,
            pipeline,
            layout,
        })
    }

    /// Records draws for every object in `registry` whose mesh is a
    /// [`SkinnedMesh`].
    ///
    /// Must be called inside the render pass the system was built for.
    pub fn render(
        &self,
        command_buffer: vk::CommandBuffer,
        descriptor_set: vk::DescriptorSet,
        registry: &ObjectRegistry,
    ) {
        let raw = self.device.handle();
        self.pipeline.bind(command_buffer);

        unsafe {
            raw.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.layout.handle(),
                0,
                &[descriptor_set],
                &[],
            );
        }

        for (id, object) in registry.game_objects() {
            let Some(mesh) = object.model.as_any().downcast_ref::<SkinnedMesh>() else {
                trace!("Object {:?} has no skinned mesh, skipped", id);
                continue;
            };

            let push = SkinnedPushConstants::from(object);
            unsafe {
                raw.cmd_push_constants(
                    command_buffer,
                    self.layout.handle(),
                    SkinnedPushConstants::STAGES,
                    0,
                    bytemuck::bytes_of(&push),
                );
            }
            mesh.bind(command_buffer);
            mesh.draw(command_buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use engine_scene::{MeshSource, TransformComponent};

    struct Placeholder;

    impl MeshSource for Placeholder {
        fn name(&self) -> &str {
            "placeholder"
        }

        fn vertex_count(&self) -> u32 {
            3
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_push_constants_layout() {
        assert_eq!(SkinnedPushConstants::SIZE, 80);
        assert_eq!(std::mem::offset_of!(SkinnedPushConstants, color), 64);

        let range = SkinnedPushConstants::range();
        assert_eq!(range.size, 80);
        assert_eq!(
            range.stage_flags,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    fn test_push_constants_from_object() {
        let transform = TransformComponent::new().with_translation(Vec3::new(0.0, 0.0, 3.0));
        let object = GameObject::new(Arc::new(Placeholder), "arm")
            .with_color(Vec3::new(0.8, 0.8, 0.8))
            .with_transform(transform);

        let push = SkinnedPushConstants::from(&object);

        assert_eq!(push.model_matrix, transform.matrix());
        assert_eq!(push.color, Vec3::new(0.8, 0.8, 0.8));
    }

    #[test]
    fn test_foreign_meshes_are_not_skinned() {
        let object = GameObject::new(Arc::new(Placeholder), "other");
        assert!(object.model.as_any().downcast_ref::<SkinnedMesh>().is_none());
    }

    #[test]
    fn test_skinned_mesh_system_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SkinnedMeshSystem>();
    }
}
