use std::sync::Arc;

use ash::extensions::khr;
use ash::vk;
use tracing::{debug, warn};

use crate::camera::Camera;
use crate::debug_pass::{DebugPass, RenderContext};
use crate::device::DeviceContext;
use crate::draw_list::DebugDrawList;
use crate::error::{RendererError, Result};
use crate::frame::{DescriptorSetLayout, FrameData};
use crate::viewport::{Viewport, ViewportUniform};

/// Number of frame resource sets cycled through by the renderer.
pub const FRAME_COUNT: usize = 2;

/// Upper bound on cameras rendered in one frame.
pub const MAX_CAMERA_NUM: usize = 1024;

/// Drives the per-frame record/submit/present cycle across one or more
/// cameras.
///
/// Each frame slot moves through idle (fence signaled) → recording →
/// submitted (fence unsignaled) → idle. A slot is only reused after its
/// fence signals, which is the one mechanism keeping CPU writes off
/// buffers, descriptor sets, and command buffers the GPU may still read;
/// GPU work is thereby bounded to [`FRAME_COUNT`] frames of slack.
pub struct Renderer {
    ctx: Arc<DeviceContext>,
    gfx_queue: vk::Queue,
    swapchain_loader: khr::Swapchain,
    frame_index: usize,
    frames: Vec<FrameData>,
    debug_pass: DebugPass,
    set_layout: DescriptorSetLayout,
}

impl Renderer {
    /// Builds the shared uniform descriptor-set layout, the debug pass
    /// against the caller-supplied render pass, and all frame resource
    /// sets.
    pub fn new(ctx: Arc<DeviceContext>, render_pass: vk::RenderPass) -> Result<Self> {
        let set_layout = DescriptorSetLayout::new(ctx.clone())?;
        let debug_pass = DebugPass::new(ctx.clone(), set_layout.handle(), render_pass)?;

        let frames = (0..FRAME_COUNT)
            .map(|_| FrameData::new(ctx.clone(), &debug_pass))
            .collect::<Result<Vec<_>>>()?;

        let gfx_queue = ctx.gfx_queue();
        let swapchain_loader = khr::Swapchain::new(ctx.instance(), ctx.device());

        Ok(Self {
            ctx,
            gfx_queue,
            swapchain_loader,
            frame_index: 0,
            frames,
            debug_pass,
            set_layout,
        })
    }

    /// Records, submits, and presents one frame across `cameras`.
    ///
    /// Viewports that fail to acquire an image are skipped for this frame
    /// only; with nothing acquired the frame is abandoned outright, leaving
    /// the slot's fence signaled so the slot stays reusable. A failed
    /// present is logged and left for the next frame's acquire to surface.
    pub fn render_frame(&mut self, cameras: &mut [Camera]) -> Result<()> {
        if cameras.len() > MAX_CAMERA_NUM {
            return Err(RendererError::TooManyCameras {
                requested: cameras.len(),
                max: MAX_CAMERA_NUM,
            });
        }

        self.frame_index = next_frame_slot(self.frame_index, self.frames.len());

        let Self {
            ctx,
            gfx_queue,
            swapchain_loader,
            frame_index,
            frames,
            debug_pass,
            set_layout,
        } = self;
        let frame = &mut frames[*frame_index];
        let device = ctx.device();

        unsafe {
            device.wait_for_fences(std::slice::from_ref(&frame.in_flight), true, u64::MAX)?;
            device.reset_command_pool(frame.command_pool, vk::CommandPoolResetFlags::empty())?;
            device.reset_descriptor_pool(
                frame.descriptor_pool,
                vk::DescriptorPoolResetFlags::empty(),
            )?;
        }

        let mut viewports: Vec<&mut Viewport> = Vec::new();
        for camera in cameras.iter_mut() {
            for viewport in camera.acquire() {
                if viewport.acquire() {
                    viewports.push(viewport);
                }
            }
        }

        if viewports.is_empty() {
            debug!("no viewport acquired an image, abandoning frame");
            return Ok(());
        }

        let uniforms: Vec<ViewportUniform> =
            viewports.iter().map(|viewport| viewport.uniform()).collect();
        frame.viewport_buf.write(&uniforms)?;

        let set_layouts = [set_layout.handle()];
        let allocate_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(frame.descriptor_pool)
            .set_layouts(&set_layouts);
        let sets = unsafe { device.allocate_descriptor_sets(&allocate_info)? };
        frame.viewport_set = sets[0];

        let buffer_info = vk::DescriptorBufferInfo::builder()
            .buffer(frame.viewport_buf.handle())
            .offset(0)
            .range(vk::WHOLE_SIZE)
            .build();
        let descriptor_write = vk::WriteDescriptorSet::builder()
            .dst_set(frame.viewport_set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(std::slice::from_ref(&buffer_info))
            .build();
        unsafe {
            device.update_descriptor_sets(std::slice::from_ref(&descriptor_write), &[]);
        }

        let cmd_allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(frame.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let cmd = unsafe { device.allocate_command_buffers(&cmd_allocate_info)? }[0];

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            device.begin_command_buffer(cmd, &begin_info)?;
        }

        for (viewport_index, viewport) in viewports.iter().enumerate() {
            viewport.begin_render_pass(cmd);

            let context = RenderContext {
                cmd,
                viewport_index,
                viewport_set: frame.viewport_set,
            };
            debug_pass.render(&context, &mut frame.debug)?;

            unsafe {
                device.cmd_end_render_pass(cmd);
            }
        }

        unsafe {
            device.end_command_buffer(cmd)?;
        }

        let mut wait_semaphores = Vec::with_capacity(viewports.len());
        let mut swapchains = Vec::with_capacity(viewports.len());
        let mut image_indices = Vec::with_capacity(viewports.len());
        for viewport in &viewports {
            if let Some(semaphore) = viewport.on_acquire_semaphore() {
                wait_semaphores.push(semaphore);
            }
            if let Some((swapchain, image_index)) = viewport.present_target() {
                swapchains.push(swapchain);
                image_indices.push(image_index);
            }
        }
        let wait_stages =
            vec![vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT; wait_semaphores.len()];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(std::slice::from_ref(&cmd))
            .signal_semaphores(std::slice::from_ref(&frame.on_finished))
            .build();

        unsafe {
            // The fence stays signaled up to this point so an abandoned or
            // failed frame never leaves the slot waiting forever.
            device.reset_fences(std::slice::from_ref(&frame.in_flight))?;
            device.queue_submit(
                *gfx_queue,
                std::slice::from_ref(&submit_info),
                frame.in_flight,
            )?;
        }

        if !swapchains.is_empty() {
            let present_info = vk::PresentInfoKHR::builder()
                .wait_semaphores(std::slice::from_ref(&frame.on_finished))
                .swapchains(&swapchains)
                .image_indices(&image_indices);

            let presented = unsafe { swapchain_loader.queue_present(*gfx_queue, &present_info) };
            if let Err(err) = presented {
                warn!(?err, "failed to present to swapchains");
            }
        }

        Ok(())
    }

    /// The draw list the world simulation appends to before each
    /// [`render_frame`](Renderer::render_frame) call.
    pub fn debug_draw_list(&mut self) -> &mut DebugDrawList {
        self.debug_pass.draw_list_mut()
    }

    pub fn device_context(&self) -> &Arc<DeviceContext> {
        &self.ctx
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Nothing recorded here may still be executing once the frame sets
        // and passes tear down.
        let result = unsafe { self.ctx.device().queue_wait_idle(self.gfx_queue) };
        if let Err(err) = result {
            warn!(?err, "failed to wait for graphics queue idle during teardown");
        }
    }
}

/// Round-robin advance of the frame-slot index.
fn next_frame_slot(current: usize, frame_count: usize) -> usize {
    (current + 1) % frame_count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_rotation_is_exactly_periodic() {
        let mut slot = 0;
        let mut seen = Vec::new();
        for _ in 0..FRAME_COUNT + 1 {
            slot = next_frame_slot(slot, FRAME_COUNT);
            seen.push(slot);
        }

        // FRAME_COUNT + 1 consecutive frames revisit the first slot exactly
        // once.
        assert_eq!(seen.first(), seen.last());
        assert_eq!(seen.iter().filter(|&&s| s == seen[0]).count(), 2);
    }

    #[test]
    fn every_slot_is_visited_each_period() {
        let mut slot = 0;
        let mut visited = vec![false; FRAME_COUNT];
        for _ in 0..FRAME_COUNT {
            slot = next_frame_slot(slot, FRAME_COUNT);
            visited[slot] = true;
        }
        assert!(visited.iter().all(|&v| v));
    }
}
