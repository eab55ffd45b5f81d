use std::sync::Arc;

use ash::vk;
use tracing::warn;

use crate::device::DeviceContext;
use crate::error::{RendererError, Result};

/// Capacity every buffer starts with, in bytes.
const INITIAL_CAPACITY: vk::DeviceSize = 1024;

/// A device-resident byte buffer that grows geometrically to fit writes.
///
/// Growth never preserves contents: a grow-triggered reallocation destroys
/// the old buffer and its memory, so callers must rewrite the full contents
/// through [`GpuVector::write`] rather than append to earlier data. Every
/// call site here does exactly that, once per frame.
///
/// Memory is always host-visible and host-coherent; there is no
/// device-local staging path.
pub struct GpuVector {
    ctx: Arc<DeviceContext>,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    usage: vk::BufferUsageFlags,
    capacity: vk::DeviceSize,
}

impl GpuVector {
    pub fn new(ctx: Arc<DeviceContext>, usage: vk::BufferUsageFlags) -> Result<Self> {
        let mut vec = Self {
            ctx,
            buffer: vk::Buffer::null(),
            memory: vk::DeviceMemory::null(),
            usage,
            capacity: INITIAL_CAPACITY,
        };

        vec.create_buffer()?;
        vec.allocate_memory()?;

        Ok(vec)
    }

    fn create_buffer(&mut self) -> Result<()> {
        let family_index = self.ctx.gfx_queue_family();

        let create_info = vk::BufferCreateInfo::builder()
            .size(self.capacity)
            .usage(self.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .queue_family_indices(std::slice::from_ref(&family_index));

        self.buffer = unsafe { self.ctx.device().create_buffer(&create_info, None)? };

        Ok(())
    }

    fn allocate_memory(&mut self) -> Result<()> {
        let device = self.ctx.device();
        let requirements = unsafe { device.get_buffer_memory_requirements(self.buffer) };

        let memory_type_index = find_memory_type(
            &self.ctx,
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        let allocate_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        unsafe {
            self.memory = device.allocate_memory(&allocate_info, None)?;
            device.bind_buffer_memory(self.buffer, self.memory, 0)?;
        }

        Ok(())
    }

    /// Grows capacity by repeated ×1.5 until it covers `required_bytes`,
    /// recreating the buffer and its memory at the new size.
    ///
    /// Existing contents are dropped on growth; see the type-level contract.
    pub fn reserve(&mut self, required_bytes: vk::DeviceSize) -> Result<()> {
        let grown = grown_capacity(self.capacity, required_bytes);
        if grown == self.capacity {
            return Ok(());
        }

        unsafe {
            let device = self.ctx.device();
            if self.buffer != vk::Buffer::null() {
                device.destroy_buffer(self.buffer, None);
                self.buffer = vk::Buffer::null();
            }
            if self.memory != vk::DeviceMemory::null() {
                device.free_memory(self.memory, None);
                self.memory = vk::DeviceMemory::null();
            }
        }

        self.capacity = grown;
        self.create_buffer()?;
        self.allocate_memory()?;

        Ok(())
    }

    /// Uploads `data` to the start of the buffer, growing it first if
    /// needed.
    pub fn write<T: bytemuck::Pod>(&mut self, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.is_empty() {
            return Ok(());
        }

        self.reserve(bytes.len() as vk::DeviceSize)?;

        let device = self.ctx.device();
        unsafe {
            let dst = device.map_memory(
                self.memory,
                0,
                bytes.len() as vk::DeviceSize,
                vk::MemoryMapFlags::empty(),
            )?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst.cast::<u8>(), bytes.len());
            device.unmap_memory(self.memory);
        }

        Ok(())
    }

    /// Current buffer handle. Invalidated by any [`GpuVector::reserve`] that
    /// grows, so re-fetch it after every write.
    pub fn handle(&self) -> vk::Buffer {
        if self.buffer == vk::Buffer::null() {
            warn!("retrieving an uninitialized GPU buffer");
        }

        self.buffer
    }

    /// Current capacity in bytes; zero while the backing storage is absent.
    pub fn capacity(&self) -> vk::DeviceSize {
        if self.buffer == vk::Buffer::null() || self.memory == vk::DeviceMemory::null() {
            return 0;
        }

        self.capacity
    }
}

impl Drop for GpuVector {
    fn drop(&mut self) {
        unsafe {
            let device = self.ctx.device();
            if self.buffer != vk::Buffer::null() {
                device.destroy_buffer(self.buffer, None);
            }
            if self.memory != vk::DeviceMemory::null() {
                device.free_memory(self.memory, None);
            }
        }
    }
}

/// First memory type whose property flags are a superset of `desired` and
/// which the buffer's requirements allow.
fn find_memory_type(
    ctx: &DeviceContext,
    type_filter: u32,
    desired: vk::MemoryPropertyFlags,
) -> Result<u32> {
    let properties = unsafe {
        ctx.instance()
            .get_physical_device_memory_properties(ctx.physical_device())
    };

    for index in 0..properties.memory_type_count {
        let matches_filter = type_filter & (1 << index) != 0;
        let flags = properties.memory_types[index as usize].property_flags;
        if matches_filter && flags.contains(desired) {
            return Ok(index);
        }
    }

    Err(RendererError::NoSuitableMemoryType)
}

/// Applies the ×1.5 growth rule until `required` fits.
fn grown_capacity(current: vk::DeviceSize, required: vk::DeviceSize) -> vk::DeviceSize {
    let mut capacity = current;
    while required > capacity {
        capacity += capacity >> 1;
    }
    capacity
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_untouched_when_request_fits() {
        assert_eq!(grown_capacity(1024, 0), 1024);
        assert_eq!(grown_capacity(1024, 1024), 1024);
        assert_eq!(grown_capacity(5184, 4000), 5184);
    }

    #[test]
    fn growth_is_repeated_one_point_five() {
        // 1024 -> 1536 -> 2304 -> 3456 -> 5184
        assert_eq!(grown_capacity(1024, 1025), 1536);
        assert_eq!(grown_capacity(1024, 4000), 5184);
    }

    #[test]
    fn capacity_is_monotonic_over_any_write_sequence() {
        let mut capacity = 1024;
        for required in [10, 2000, 500, 4000, 4000, 100_000, 1] {
            let next = grown_capacity(capacity, required);
            assert!(next >= capacity);
            assert!(next >= required);
            capacity = next;
        }
    }

    #[test]
    fn growth_terminates_in_logarithmic_steps() {
        let mut capacity: vk::DeviceSize = 1024;
        let mut steps = 0;
        while capacity < 1 << 40 {
            capacity += capacity >> 1;
            steps += 1;
        }
        assert!(steps < 80);
    }
}
