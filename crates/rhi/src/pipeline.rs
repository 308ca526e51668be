//! Graphics pipelines for the swapchain render pass.
//!
//! # Overview
//!
//! - [`PipelineLayout`] wraps the descriptor set layouts and push constant
//!   ranges a pipeline reads.
//! - [`PipelineConfig`] is the fixed-function state. Its defaults suit opaque
//!   meshes: triangle lists, no culling, depth test and write with `LESS`,
//!   and a dynamic viewport and scissor so pipelines survive swapchain
//!   rebuilds.
//! - [`GraphicsPipeline`] combines the shaders, vertex input, config and
//!   layout for one subpass of a render pass.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use engine_rhi::device::Device;
//! use engine_rhi::pipeline::{GraphicsPipeline, PipelineConfig, PipelineLayout};
//! use engine_rhi::shader::ShaderModule;
//!
//! # fn example(
//! #     device: Arc<Device>,
//! #     vertex: &ShaderModule,
//! #     fragment: &ShaderModule,
//! #     render_pass: vk::RenderPass,
//! # ) -> engine_rhi::RhiResult<()> {
//! let layout = PipelineLayout::new(device.clone(), &[], &[])?;
//! let pipeline = GraphicsPipeline::new(
//!     device,
//!     &PipelineConfig::default().alpha_blended(),
//!     &[vertex, fragment],
//!     &[],
//!     &[],
//!     &layout,
//!     render_pass,
//! )?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::shader::ShaderModule;

/// Vulkan pipeline layout wrapper.
pub struct PipelineLayout {
    device: Arc<Device>,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Creates a layout over `set_layouts` (set `i` is `set_layouts[i]`) and
    /// `push_constant_ranges`.
    ///
    /// # Errors
    ///
    /// Returns an error if layout creation fails.
    pub fn new(
        device: Arc<Device>,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_constant_ranges);

        let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None)? };

        debug!(
            "Created pipeline layout with {} set layout(s) and {} push constant range(s)",
            set_layouts.len(),
            push_constant_ranges.len()
        );

        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
        debug!("Destroyed pipeline layout");
    }
}

/// Fixed-function state of a graphics pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    pub topology: vk::PrimitiveTopology,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare_op: vk::CompareOp,
    /// Standard `src * a + dst * (1 - a)` blending on the color attachment.
    pub alpha_blend: bool,
    pub dynamic_states: Vec<vk::DynamicState>,
    pub subpass: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::CLOCKWISE,
            depth_test: true,
            depth_write: true,
            depth_compare_op: vk::CompareOp::LESS,
            alpha_blend: false,
            dynamic_states: vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
            subpass: 0,
        }
    }
}

impl PipelineConfig {
    /// Enables alpha blending on the color attachment.
    pub fn alpha_blended(mut self) -> Self {
        self.alpha_blend = true;
        self
    }

    pub fn cull_mode(mut self, cull_mode: vk::CullModeFlags) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    /// Blend state for the single color attachment.
    pub fn color_blend_attachment(&self) -> vk::PipelineColorBlendAttachmentState {
        let state = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .color_blend_op(vk::BlendOp::ADD)
            .alpha_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO);

        if self.alpha_blend {
            state
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
        } else {
            state
                .blend_enable(false)
                .src_color_blend_factor(vk::BlendFactor::ONE)
                .dst_color_blend_factor(vk::BlendFactor::ZERO)
        }
    }
}

/// Vulkan graphics pipeline bound to one render pass.
pub struct GraphicsPipeline {
    device: Arc<Device>,
    pipeline: vk::Pipeline,
}

impl GraphicsPipeline {
    /// Builds a pipeline for `render_pass` from `config`.
    ///
    /// Viewport and scissor are counted here but set at record time when the
    /// config lists them as dynamic.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::ShaderError`] if `shaders` is empty, or the Vulkan
    /// error if pipeline creation fails.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: Arc<Device>,
        config: &PipelineConfig,
        shaders: &[&ShaderModule],
        vertex_bindings: &[vk::VertexInputBindingDescription],
        vertex_attributes: &[vk::VertexInputAttributeDescription],
        layout: &PipelineLayout,
        render_pass: vk::RenderPass,
    ) -> RhiResult<Self> {
        if shaders.is_empty() {
            return Err(RhiError::ShaderError(
                "A graphics pipeline needs at least one shader stage".to_string(),
            ));
        }

        let stages: Vec<vk::PipelineShaderStageCreateInfo> =
            shaders.iter().map(|shader| shader.stage_create_info()).collect();

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(vertex_bindings)
            .vertex_attribute_descriptions(vertex_attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(config.topology)
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(config.polygon_mode)
            .line_width(1.0)
            .cull_mode(config.cull_mode)
            .front_face(config.front_face)
            .depth_bias_enable(false);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .sample_shading_enable(false)
            .min_sample_shading(1.0);

        let blend_attachments = [config.color_blend_attachment()];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&blend_attachments);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(config.depth_test)
            .depth_write_enable(config.depth_write)
            .depth_compare_op(config.depth_compare_op)
            .depth_bounds_test_enable(false)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0)
            .stencil_test_enable(false);

        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&config.dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .color_blend_state(&color_blend)
            .depth_stencil_state(&depth_stencil)
            .dynamic_state(&dynamic_state)
            .layout(layout.handle())
            .render_pass(render_pass)
            .subpass(config.subpass);

        let pipeline = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, result)| result)?
        }
        .into_iter()
        .next()
        .ok_or_else(|| RhiError::InvalidHandle("No graphics pipeline created".to_string()))?;

        info!(
            "Graphics pipeline created ({} stages, blend {})",
            stages.len(),
            config.alpha_blend
        );

        Ok(Self { device, pipeline })
    }

    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Binds the pipeline to the graphics bind point of `command_buffer`.
    pub fn bind(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device.handle().cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline,
            );
        }
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
        }
        info!("Graphics pipeline destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(config.cull_mode, vk::CullModeFlags::NONE);
        assert_eq!(config.front_face, vk::FrontFace::CLOCKWISE);
        assert!(config.depth_test);
        assert!(config.depth_write);
        assert_eq!(config.depth_compare_op, vk::CompareOp::LESS);
        assert_eq!(
            config.dynamic_states,
            vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]
        );
        assert_eq!(config.subpass, 0);
    }

    #[test]
    fn test_opaque_blend_attachment() {
        let attachment = PipelineConfig::default().color_blend_attachment();
        assert_eq!(attachment.blend_enable, vk::FALSE);
        assert_eq!(attachment.src_color_blend_factor, vk::BlendFactor::ONE);
        assert_eq!(attachment.dst_color_blend_factor, vk::BlendFactor::ZERO);
        assert_eq!(attachment.color_write_mask, vk::ColorComponentFlags::RGBA);
    }

    #[test]
    fn test_alpha_blended_attachment() {
        let config = PipelineConfig::default()
            .alpha_blended()
            .cull_mode(vk::CullModeFlags::BACK);
        let attachment = config.color_blend_attachment();

        assert_eq!(config.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(attachment.blend_enable, vk::TRUE);
        assert_eq!(attachment.src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
        assert_eq!(
            attachment.dst_color_blend_factor,
            vk::BlendFactor::ONE_MINUS_SRC_ALPHA
        );
    }

    #[test]
    fn test_pipeline_types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PipelineLayout>();
        assert_send_sync::<GraphicsPipeline>();
    }
}
