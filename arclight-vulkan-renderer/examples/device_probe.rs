//! Headless bootstrap probe: opens a device context and reports what it
//! selected. Useful for checking a machine's Vulkan setup without any
//! display backend.

use std::ffi::CStr;

use anyhow::Result;
use arclight_vulkan_renderer::{DeviceContext, GpuConfig};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = GpuConfig::default();
    let ctx = DeviceContext::new(&config)?;

    let properties = unsafe {
        ctx.instance()
            .get_physical_device_properties(ctx.physical_device())
    };
    let device_name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };

    println!("adapter: {}", device_name.to_string_lossy());
    println!(
        "api version: {}.{}.{}",
        ash::vk::api_version_major(properties.api_version),
        ash::vk::api_version_minor(properties.api_version),
        ash::vk::api_version_patch(properties.api_version),
    );
    println!("graphics queue family: {}", ctx.gfx_queue_family());

    Ok(())
}
