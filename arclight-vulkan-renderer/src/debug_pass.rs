use std::ffi::CString;
use std::sync::Arc;

use ash::vk;

use crate::buffer::GpuVector;
use crate::device::DeviceContext;
use crate::draw_list::{DebugDrawList, DebugDrawVertex};
use crate::error::{RendererError, Result};
use crate::shader::Shader;

const VERTEX_SHADER_PATH: &str = "./shaders/debug.vert.spv";
const FRAGMENT_SHADER_PATH: &str = "./shaders/debug.frag.spv";

/// Everything a pass needs to record its commands for one viewport.
pub struct RenderContext {
    pub cmd: vk::CommandBuffer,
    /// Position of the viewport in this frame's acquired set, matching its
    /// record in the frame's uniform buffer.
    pub viewport_index: usize,
    pub viewport_set: vk::DescriptorSet,
}

/// Per-frame GPU buffers owned by the debug pass, one set per frame in
/// flight.
pub struct DebugFrameData {
    vertices: GpuVector,
    vertex_count: u32,
    indices: GpuVector,
    index_count: u32,
}

/// Line-list pass drawing the accumulated debug geometry.
///
/// Owns the fixed graphics pipeline and the draw list the world simulation
/// appends to; uploads the list's contents into the current frame's buffers
/// and records one indexed draw per viewport.
pub struct DebugPass {
    ctx: Arc<DeviceContext>,
    draw_list: DebugDrawList,
    vertex_shader: Shader,
    fragment_shader: Shader,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
}

impl DebugPass {
    pub fn new(
        ctx: Arc<DeviceContext>,
        viewport_set_layout: vk::DescriptorSetLayout,
        render_pass: vk::RenderPass,
    ) -> Result<Self> {
        let vertex_shader = Shader::from_file(
            ctx.clone(),
            vk::ShaderStageFlags::VERTEX,
            VERTEX_SHADER_PATH,
        )?;
        let fragment_shader = Shader::from_file(
            ctx.clone(),
            vk::ShaderStageFlags::FRAGMENT,
            FRAGMENT_SHADER_PATH,
        )?;

        let mut pass = Self {
            ctx,
            draw_list: DebugDrawList::new(),
            vertex_shader,
            fragment_shader,
            pipeline_layout: vk::PipelineLayout::null(),
            pipeline: vk::Pipeline::null(),
        };

        pass.create_pipeline_layout(viewport_set_layout)?;
        pass.create_pipeline(render_pass)?;

        Ok(pass)
    }

    fn create_pipeline_layout(&mut self, viewport_set_layout: vk::DescriptorSetLayout) -> Result<()> {
        let create_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(std::slice::from_ref(&viewport_set_layout));

        self.pipeline_layout = unsafe {
            self.ctx
                .device()
                .create_pipeline_layout(&create_info, None)?
        };

        Ok(())
    }

    fn create_pipeline(&mut self, render_pass: vk::RenderPass) -> Result<()> {
        let entry_point = CString::new("main").unwrap();

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(self.vertex_shader.stage())
                .module(self.vertex_shader.module())
                .name(&entry_point)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(self.fragment_shader.stage())
                .module(self.fragment_shader.module())
                .name(&entry_point)
                .build(),
        ];

        let binding_description = vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(std::mem::size_of::<DebugDrawVertex>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build();

        let attribute_descriptions = [
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
                offset: std::mem::size_of::<[f32; 3]>() as u32,
            },
        ];

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(std::slice::from_ref(&binding_description))
            .vertex_attribute_descriptions(&attribute_descriptions);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::LINE_LIST)
            .primitive_restart_enable(false);

        // Placeholder viewport and scissor; both are dynamic and set per
        // frame.
        let viewport = vk::Viewport::default();
        let scissor = vk::Rect2D::default();
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(std::slice::from_ref(&viewport))
            .scissors(std::slice::from_ref(&scissor));

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::builder()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(1.0);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::builder()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(false);

        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .build();

        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::builder()
            .attachments(std::slice::from_ref(&color_blend_attachment));

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(self.pipeline_layout)
            .render_pass(render_pass)
            .subpass(0)
            .build();

        let pipelines = unsafe {
            self.ctx.device().create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(&create_info),
                None,
            )
        };

        match pipelines {
            Ok(pipelines) => {
                self.pipeline = pipelines[0];
                Ok(())
            }
            Err((_, err)) => Err(RendererError::PipelineCreation(err)),
        }
    }

    /// Allocates the per-frame vertex/index buffers for one frame resource
    /// set; the returned aggregate frees them when dropped.
    pub fn init_frame_resources(&self) -> Result<DebugFrameData> {
        let vertices = GpuVector::new(self.ctx.clone(), vk::BufferUsageFlags::VERTEX_BUFFER)?;
        let indices = GpuVector::new(self.ctx.clone(), vk::BufferUsageFlags::INDEX_BUFFER)?;

        Ok(DebugFrameData {
            vertices,
            vertex_count: 0,
            indices,
            index_count: 0,
        })
    }

    /// Uploads the draw list into `frame`'s buffers, clears the list, and
    /// records the draw for one viewport.
    ///
    /// Overwriting the buffers here is safe: the renderer has already waited
    /// on this frame slot's fence, so nothing in flight still reads them.
    pub fn render(&mut self, context: &RenderContext, frame: &mut DebugFrameData) -> Result<()> {
        frame.vertex_count = self.draw_list.vertex_count() as u32;
        frame.index_count = self.draw_list.index_count() as u32;

        frame.vertices.write(self.draw_list.vertices())?;
        frame.indices.write(self.draw_list.indices())?;

        self.draw_list.clear();

        let device = self.ctx.device();
        unsafe {
            device.cmd_bind_pipeline(
                context.cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline,
            );
            device.cmd_bind_descriptor_sets(
                context.cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                0,
                std::slice::from_ref(&context.viewport_set),
                &[],
            );
            device.cmd_bind_vertex_buffers(
                context.cmd,
                0,
                std::slice::from_ref(&frame.vertices.handle()),
                &[0],
            );
            device.cmd_bind_index_buffer(
                context.cmd,
                frame.indices.handle(),
                0,
                vk::IndexType::UINT32,
            );
            device.cmd_draw_indexed(context.cmd, frame.index_count, 1, 0, 0, 0);
        }

        Ok(())
    }

    /// The draw list the world simulation appends to before each frame.
    pub fn draw_list_mut(&mut self) -> &mut DebugDrawList {
        &mut self.draw_list
    }
}

impl Drop for DebugPass {
    fn drop(&mut self) {
        let device = self.ctx.device();
        unsafe {
            if self.pipeline != vk::Pipeline::null() {
                device.destroy_pipeline(self.pipeline, None);
            }
            if self.pipeline_layout != vk::PipelineLayout::null() {
                device.destroy_pipeline_layout(self.pipeline_layout, None);
            }
        }
    }
}
