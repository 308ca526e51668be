//! Billboards for the scene's point lights.
//!
//! Each light is drawn as one camera-facing quad (six vertices, no vertex
//! buffer). The vertex shader expands the quad from `gl_VertexIndex` using
//! the inverse view matrix of the global block, and the fragment shader
//! fades it out towards the light's radius.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use tracing::info;

use engine_rhi::RhiResult;
use engine_rhi::device::Device;
use engine_rhi::pipeline::{GraphicsPipeline, PipelineConfig, PipelineLayout};
use engine_rhi::shader::{ShaderModule, ShaderStage};
use engine_scene::{ObjectRegistry, PointLight};

pub const POINT_LIGHT_VERTEX_SHADER: &str = "point_light.vert.spv";
pub const POINT_LIGHT_FRAGMENT_SHADER: &str = "point_light.frag.spv";

/// Vertices per light billboard.
const BILLBOARD_VERTICES: u32 = 6;

/// Per-light push constants.
///
/// - Offset 0: position (16 bytes)
/// - Offset 16: color, intensity in w (16 bytes)
/// - Offset 32: radius + padding (16 bytes)
/// - Total size: 48 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PointLightPushConstants {
    pub position: Vec4,
    pub color: Vec4,
    pub radius: f32,
    pub _padding: [f32; 3],
}

impl PointLightPushConstants {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub const STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(
        vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw(),
    );

    pub fn range() -> vk::PushConstantRange {
        vk::PushConstantRange {
            stage_flags: Self::STAGES,
            offset: 0,
            size: Self::SIZE as u32,
        }
    }
}

impl From<&PointLight> for PointLightPushConstants {
    fn from(light: &PointLight) -> Self {
        Self {
            position: light.position.extend(1.0),
            color: light.color.extend(light.intensity),
            radius: light.radius,
            _padding: [0.0; 3],
        }
    }
}

/// Alpha-blended billboard pipeline for point lights.
pub struct PointLightSystem {
    device: Arc<Device>,
    pipeline: GraphicsPipeline,
    layout: PipelineLayout,
}

impl PointLightSystem {
    /// Loads the billboard shaders from `shader_dir` and builds the pipeline
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
            &[PointLightPushConstants::range()],
        )?;

        let vertex = ShaderModule::from_spirv_file(
            Arc::clone(&device),
            &shader_dir.join(POINT_LIGHT_VERTEX_SHADER),
            ShaderStage::Vertex,
        )?;
        let fragment = ShaderModule::from_spirv_file(
            Arc::clone(&device),
            &shader_dir.join(POINT_LIGHT_FRAGMENT_SHADER),
            ShaderStage::Fragment,
        )?;

        let pipeline = GraphicsPipeline::new(
            Arc::clone(&device),
            &PipelineConfig::default().alpha_blended(),
            &[&vertex, &fragment],
            &[],
            &[],
            &layout,
            render_pass,
        )?;

        info!("Point light system ready");

        Ok(Self {
            device,
            pipeline,
            layout,
        })
    }

    /// Records one billboard per light in `registry`.
    ///
    /// Must be called inside the render pass, after the opaque geometry.
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

        for (_, light) in registry.point_lights() {
            let push = PointLightPushConstants::from(light);
            unsafe {
                raw.cmd_push_constants(
                    command_buffer,
                    self.layout.handle(),
                    PointLightPushConstants::STAGES,
                    0,
                    bytemuck::bytes_of(&push),
                );
                raw.cmd_draw(command_buffer, BILLBOARD_VERTICES, 1, 0, 0);
            }
        }
    }
}
