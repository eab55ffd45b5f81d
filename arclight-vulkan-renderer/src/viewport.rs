use std::sync::Arc;

use ash::extensions::khr;
use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use tracing::{info, warn};

use crate::device::DeviceContext;
use crate::error::{RendererError, Result};
use crate::MAX_FRAMES_IN_FLIGHT;

/// Upper bound on swapchain images per viewport.
pub const MAX_SWAPCHAIN_IMAGES: usize = 8;

const SWAPCHAIN_FORMAT: vk::Format = vk::Format::B8G8R8A8_SRGB;
const SWAPCHAIN_COLOR_SPACE: vk::ColorSpaceKHR = vk::ColorSpaceKHR::SRGB_NONLINEAR;

/// Per-viewport camera matrices, uploaded once per frame per acquired
/// viewport.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ViewportUniform {
    pub projection: Mat4,
    pub view: Mat4,
}

/// The render target a viewport draws into, tagged by backend kind.
///
/// Only the surface-backed variant exists today; headset targets plug in
/// here without the renderer ever learning which backend produced them.
#[derive(Debug, Clone, Copy)]
pub enum ViewportTarget {
    Surface { surface: vk::SurfaceKHR },
}

#[derive(Debug, Clone, Copy)]
pub struct ViewportConfig {
    pub width: u32,
    pub height: u32,
    pub target: ViewportTarget,
}

struct VpImage {
    #[allow(dead_code)]
    image: vk::Image,
    view: vk::ImageView,
    framebuffer: vk::Framebuffer,
}

/// One presentable render target: a swapchain, its per-image framebuffers,
/// and a ring of image-acquisition semaphores.
///
/// The swapchain and its image resources only ever exist as a unit. The
/// semaphore ring advances strictly round-robin, one slot per
/// [`acquire`](Viewport::acquire) call, so no two in-flight acquisitions
/// share a slot within one rotation period.
pub struct Viewport {
    ctx: Arc<DeviceContext>,
    swapchain_loader: khr::Swapchain,
    swapchain: vk::SwapchainKHR,
    render_pass: vk::RenderPass,
    width: u32,
    height: u32,
    images: Vec<VpImage>,
    acquire_semaphores: [vk::Semaphore; MAX_FRAMES_IN_FLIGHT],
    ring_index: Option<usize>,
    image_acquired: Option<u32>,
}

impl Viewport {
    pub fn new(
        ctx: Arc<DeviceContext>,
        render_pass: vk::RenderPass,
        config: &ViewportConfig,
    ) -> Result<Self> {
        let swapchain_loader = khr::Swapchain::new(ctx.instance(), ctx.device());

        let mut viewport = Self {
            ctx,
            swapchain_loader,
            swapchain: vk::SwapchainKHR::null(),
            render_pass,
            width: config.width,
            height: config.height,
            images: Vec::new(),
            acquire_semaphores: [vk::Semaphore::null(); MAX_FRAMES_IN_FLIGHT],
            ring_index: None,
            image_acquired: None,
        };

        let raw_images = match config.target {
            ViewportTarget::Surface { surface } => viewport.init_surface(surface)?,
        };

        viewport.create_images(&raw_images)?;
        viewport.create_semaphores()?;

        Ok(viewport)
    }

    fn init_surface(&mut self, surface: vk::SurfaceKHR) -> Result<Vec<vk::Image>> {
        info!("creating surface-backed viewport");

        let surface_loader = khr::Surface::new(self.ctx.entry(), self.ctx.instance());
        let physical_device = self.ctx.physical_device();
        let gfx_family = self.ctx.gfx_queue_family();

        let supported = unsafe {
            surface_loader.get_physical_device_surface_support(
                physical_device,
                gfx_family,
                surface,
            )?
        };
        if !supported {
            return Err(RendererError::UnsupportedSurface);
        }

        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };

        let image_count = capabilities.min_image_count.max(3);

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(SWAPCHAIN_FORMAT)
            .image_color_space(SWAPCHAIN_COLOR_SPACE)
            .image_extent(vk::Extent2D {
                width: self.width,
                height: self.height,
            })
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        self.swapchain = unsafe { self.swapchain_loader.create_swapchain(&create_info, None)? };

        let images = unsafe { self.swapchain_loader.get_swapchain_images(self.swapchain)? };
        if images.len() > MAX_SWAPCHAIN_IMAGES {
            return Err(RendererError::TooManySwapchainImages {
                count: images.len(),
                max: MAX_SWAPCHAIN_IMAGES,
            });
        }

        Ok(images)
    }

    fn create_images(&mut self, raw_images: &[vk::Image]) -> Result<()> {
        let device = self.ctx.device();

        for &image in raw_images {
            let view_create_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(SWAPCHAIN_FORMAT)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            let view = unsafe { device.create_image_view(&view_create_info, None)? };

            let framebuffer_create_info = vk::FramebufferCreateInfo::builder()
                .render_pass(self.render_pass)
                .attachments(std::slice::from_ref(&view))
                .width(self.width)
                .height(self.height)
                .layers(1);

            let framebuffer =
                match unsafe { device.create_framebuffer(&framebuffer_create_info, None) } {
                    Ok(framebuffer) => framebuffer,
                    Err(err) => {
                        unsafe { device.destroy_image_view(view, None) };
                        return Err(err.into());
                    }
                };

            self.images.push(VpImage {
                image,
                view,
                framebuffer,
            });
        }

        Ok(())
    }

    fn create_semaphores(&mut self) -> Result<()> {
        let create_info = vk::SemaphoreCreateInfo::builder();

        for slot in &mut self.acquire_semaphores {
            *slot = unsafe { self.ctx.device().create_semaphore(&create_info, None)? };
        }

        Ok(())
    }

    /// Requests the next presentable image, blocking until one is handed
    /// over.
    ///
    /// Returns whether acquisition succeeded. On failure (typically an
    /// out-of-date swapchain) the viewport simply contributes nothing this
    /// frame; the caller neither retries nor treats it as fatal.
    pub fn acquire(&mut self) -> bool {
        let slot = next_ring_slot(self.ring_index, MAX_FRAMES_IN_FLIGHT);
        self.ring_index = Some(slot);
        let semaphore = self.acquire_semaphores[slot];

        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };

        match result {
            Ok((image_index, _suboptimal)) => {
                self.image_acquired = Some(image_index);
                true
            }
            Err(err) => {
                warn!(?err, "failed to acquire swapchain image");
                self.image_acquired = None;
                false
            }
        }
    }

    /// Semaphore signaled by the most recent successful acquisition, if any.
    pub fn on_acquire_semaphore(&self) -> Option<vk::Semaphore> {
        match (self.image_acquired, self.ring_index) {
            (Some(_), Some(slot)) => Some(self.acquire_semaphores[slot]),
            _ => None,
        }
    }

    /// Swapchain handle and image index to present this frame, if the
    /// viewport holds an acquired image.
    pub fn present_target(&self) -> Option<(vk::SwapchainKHR, u32)> {
        self.image_acquired
            .map(|image_index| (self.swapchain, image_index))
    }

    /// Records a render-pass begin against the acquired image's framebuffer
    /// plus a dynamic viewport and scissor covering the full target.
    pub fn begin_render_pass(&self, cmd: vk::CommandBuffer) {
        let Some(image_index) = self.image_acquired else {
            warn!("beginning a render pass on a viewport with no acquired image");
            return;
        };

        let clear_value = vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 1.0],
            },
        };

        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(self.render_pass)
            .framebuffer(self.images[image_index as usize].framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D {
                    width: self.width,
                    height: self.height,
                },
            })
            .clear_values(std::slice::from_ref(&clear_value));

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.width as f32,
            height: self.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D {
                width: self.width,
                height: self.height,
            },
        };

        let device = self.ctx.device();
        unsafe {
            device.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
            device.cmd_set_viewport(cmd, 0, std::slice::from_ref(&viewport));
            device.cmd_set_scissor(cmd, 0, std::slice::from_ref(&scissor));
        }
    }

    /// Projection and view matrices for this viewport's fixed debug camera.
    pub fn uniform(&self) -> ViewportUniform {
        let aspect = self.width as f32 / self.height as f32;
        let projection = Mat4::perspective_rh(90.0f32.to_radians(), aspect, 0.1, 1000.0);
        let view = Mat4::look_at_rh(Vec3::new(10.0, 10.0, 10.0), Vec3::ZERO, Vec3::Y);

        ViewportUniform { projection, view }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl Drop for Viewport {
    fn drop(&mut self) {
        let device = self.ctx.device();
        unsafe {
            for image in &self.images {
                device.destroy_image_view(image.view, None);
            }
            for image in &self.images {
                device.destroy_framebuffer(image.framebuffer, None);
            }

            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }

            for semaphore in self.acquire_semaphores {
                if semaphore != vk::Semaphore::null() {
                    device.destroy_semaphore(semaphore, None);
                }
            }
        }
    }
}

/// Round-robin advance of the acquire-semaphore ring.
fn next_ring_slot(current: Option<usize>, len: usize) -> usize {
    match current {
        None => 0,
        Some(index) => (index + 1) % len,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_starts_at_slot_zero() {
        assert_eq!(next_ring_slot(None, MAX_FRAMES_IN_FLIGHT), 0);
    }

    #[test]
    fn ring_is_exactly_periodic() {
        let mut slot = None;
        let mut seen = Vec::new();
        for _ in 0..2 * MAX_FRAMES_IN_FLIGHT + 1 {
            let next = next_ring_slot(slot, MAX_FRAMES_IN_FLIGHT);
            seen.push(next);
            slot = Some(next);
        }

        // Two full rotations plus one: 0..N, 0..N, 0.
        for (i, &s) in seen.iter().enumerate() {
            assert_eq!(s, i % MAX_FRAMES_IN_FLIGHT);
        }
    }

    #[test]
    fn no_slot_repeats_within_one_rotation() {
        let mut slot = None;
        let mut rotation = Vec::new();
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            let next = next_ring_slot(slot, MAX_FRAMES_IN_FLIGHT);
            assert!(!rotation.contains(&next));
            rotation.push(next);
            slot = Some(next);
        }
    }
}
