use std::sync::Arc;

use ash::vk;

use crate::device::DeviceContext;
use crate::error::{RendererError, Result};
use crate::viewport::{Viewport, ViewportConfig};

/// Upper bound on viewports owned by one camera.
pub const MAX_VIEWPORTS_PER_CAMERA: usize = 8;

const ATTACHMENT_FORMAT: vk::Format = vk::Format::B8G8R8A8_SRGB;

/// Owned render pass with guaranteed release.
struct RenderPass {
    ctx: Arc<DeviceContext>,
    handle: vk::RenderPass,
}

impl RenderPass {
    /// One color-attachment subpass: clear on load, store on end, ending in
    /// a presentable layout, with an external dependency covering the
    /// color-attachment read/write stages.
    fn new(ctx: Arc<DeviceContext>) -> Result<Self> {
        let color_attachment = vk::AttachmentDescription::builder()
            .format(ATTACHMENT_FORMAT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build();

        let color_attachment_ref = vk::AttachmentReference::builder()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .build();

        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(std::slice::from_ref(&color_attachment_ref))
            .build();

        let dependency = vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_READ)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .build();

        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(std::slice::from_ref(&color_attachment))
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(std::slice::from_ref(&dependency));

        let handle = unsafe { ctx.device().create_render_pass(&create_info, None)? };

        Ok(Self { ctx, handle })
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device().destroy_render_pass(self.handle, None);
        }
    }
}

pub struct CameraConfig<'a> {
    pub gpu: Arc<DeviceContext>,
    pub viewports: &'a [ViewportConfig],
}

/// A render pass shared by a bounded set of viewports with a compatible
/// attachment layout.
pub struct Camera {
    // Declared before the render pass so viewports tear down first.
    viewports: Vec<Viewport>,
    render_pass: RenderPass,
}

impl Camera {
    pub fn new(config: &CameraConfig) -> Result<Self> {
        if config.viewports.len() > MAX_VIEWPORTS_PER_CAMERA {
            return Err(RendererError::TooManyViewports {
                requested: config.viewports.len(),
                max: MAX_VIEWPORTS_PER_CAMERA,
            });
        }

        let render_pass = RenderPass::new(config.gpu.clone())?;

        let viewports = config
            .viewports
            .iter()
            .map(|viewport_config| {
                Viewport::new(config.gpu.clone(), render_pass.handle, viewport_config)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            viewports,
            render_pass,
        })
    }

    /// Hands out the owned viewports for the caller to drive through the
    /// per-frame acquire cycle.
    pub fn acquire(&mut self) -> &mut [Viewport] {
        &mut self.viewports
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass.handle
    }

    pub fn viewport_count(&self) -> usize {
        self.viewports.len()
    }
}
