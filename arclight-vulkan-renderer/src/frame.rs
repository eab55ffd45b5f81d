use std::sync::Arc;

use ash::vk;

use crate::buffer::GpuVector;
use crate::debug_pass::{DebugFrameData, DebugPass};
use crate::device::DeviceContext;
use crate::error::Result;

/// The per-frame-uniform descriptor-set layout shared by every frame
/// resource set: one uniform buffer visible to the vertex stage.
pub struct DescriptorSetLayout {
    ctx: Arc<DeviceContext>,
    handle: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    pub fn new(ctx: Arc<DeviceContext>) -> Result<Self> {
        let binding = vk::DescriptorSetLayoutBinding::builder()
            .binding(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::VERTEX)
            .build();

        let create_info = vk::DescriptorSetLayoutCreateInfo::builder()
            .bindings(std::slice::from_ref(&binding));

        let handle = unsafe { ctx.device().create_descriptor_set_layout(&create_info, None)? };

        Ok(Self { ctx, handle })
    }

    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.handle
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.ctx
                .device()
                .destroy_descriptor_set_layout(self.handle, None);
        }
    }
}

/// One frame-in-flight resource set.
///
/// Everything here belongs to exactly one frame slot and is only mutated
/// between that slot's fence wait and its next submission. The command and
/// descriptor pools are reset, never recreated, when the slot is reused;
/// the whole set is created and destroyed as a unit.
pub struct FrameData {
    ctx: Arc<DeviceContext>,
    pub(crate) command_pool: vk::CommandPool,
    /// Signaled by the queue when this slot's submission finishes executing.
    pub(crate) on_finished: vk::Semaphore,
    /// Signaled by the GPU when this slot's work retires; waited on before
    /// the slot is reused.
    pub(crate) in_flight: vk::Fence,
    pub(crate) descriptor_pool: vk::DescriptorPool,
    /// Set allocated from `descriptor_pool` each frame, after the pool
    /// reset.
    pub(crate) viewport_set: vk::DescriptorSet,
    pub(crate) viewport_buf: GpuVector,
    pub(crate) debug: DebugFrameData,
}

impl FrameData {
    pub(crate) fn new(ctx: Arc<DeviceContext>, debug_pass: &DebugPass) -> Result<Self> {
        let viewport_buf = GpuVector::new(ctx.clone(), vk::BufferUsageFlags::UNIFORM_BUFFER)?;
        let debug = debug_pass.init_frame_resources()?;

        let mut frame = Self {
            ctx,
            command_pool: vk::CommandPool::null(),
            on_finished: vk::Semaphore::null(),
            in_flight: vk::Fence::null(),
            descriptor_pool: vk::DescriptorPool::null(),
            viewport_set: vk::DescriptorSet::null(),
            viewport_buf,
            debug,
        };

        frame.create_command_pool()?;
        frame.create_sync_objects()?;
        frame.create_descriptor_pool()?;

        Ok(frame)
    }

    fn create_command_pool(&mut self) -> Result<()> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(self.ctx.gfx_queue_family());

        self.command_pool = unsafe { self.ctx.device().create_command_pool(&create_info, None)? };

        Ok(())
    }

    fn create_sync_objects(&mut self) -> Result<()> {
        let device = self.ctx.device();

        let semaphore_create_info = vk::SemaphoreCreateInfo::builder();
        self.on_finished = unsafe { device.create_semaphore(&semaphore_create_info, None)? };

        // Signaled so the first wait on this slot returns immediately.
        let fence_create_info =
            vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);
        self.in_flight = unsafe { device.create_fence(&fence_create_info, None)? };

        Ok(())
    }

    fn create_descriptor_pool(&mut self) -> Result<()> {
        let pool_size = vk::DescriptorPoolSize::builder()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .build();

        let create_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(std::slice::from_ref(&pool_size))
            .max_sets(1);

        self.descriptor_pool =
            unsafe { self.ctx.device().create_descriptor_pool(&create_info, None)? };

        Ok(())
    }
}

impl Drop for FrameData {
    fn drop(&mut self) {
        let device = self.ctx.device();
        unsafe {
            if self.command_pool != vk::CommandPool::null() {
                device.destroy_command_pool(self.command_pool, None);
            }
            if self.on_finished != vk::Semaphore::null() {
                device.destroy_semaphore(self.on_finished, None);
            }
            if self.in_flight != vk::Fence::null() {
                device.destroy_fence(self.in_flight, None);
            }
            if self.descriptor_pool != vk::DescriptorPool::null() {
                device.destroy_descriptor_pool(self.descriptor_pool, None);
            }
        }
    }
}
