use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use ash::extensions::ext::DebugUtils;
use ash::vk;
use tracing::{info, warn};

use crate::config::{split_extension_list, GpuConfig};
use crate::error::{RendererError, Result};

#[cfg(debug_assertions)]
const ENABLE_VALIDATION_LAYERS: bool = true;
#[cfg(not(debug_assertions))]
const ENABLE_VALIDATION_LAYERS: bool = false;

const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let callback_data = *p_callback_data;
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::from("")
    } else {
        CStr::from_ptr(callback_data.p_message).to_string_lossy()
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            tracing::warn!(target: "vulkan", "validation: type: {:?}, message: {}", message_type, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            tracing::error!(target: "vulkan", "validation: type: {:?}, message: {}", message_type, message);
        }
        _ => {
            tracing::debug!(target: "vulkan", "validation: type: {:?}, message: {}", message_type, message);
        }
    }
    vk::FALSE
}

/// Owner of the Vulkan instance, the selected adapter, and the logical
/// device with its single graphics queue.
///
/// Created once by the process, before every other GPU object, and dropped
/// last: dependents hold it through an `Arc` so the logical device outlives
/// every handle created from it. The graphics queue family selected at
/// construction is the only queue family the core ever uses.
pub struct DeviceContext {
    entry: ash::Entry,
    instance: ash::Instance,
    debug_utils_loader: Option<DebugUtils>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    physical_device: vk::PhysicalDevice,
    gfx_queue_family: u32,
    device: ash::Device,
    gfx_queue: vk::Queue,
}

impl DeviceContext {
    pub fn new(config: &GpuConfig) -> Result<Self> {
        let entry = unsafe { ash::Entry::load()? };

        let instance = Self::create_instance(&entry, config)?;

        let (debug_utils_loader, debug_messenger) =
            match Self::create_debug_messenger(&entry, &instance) {
                Ok(messenger) => messenger,
                Err(err) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(err);
                }
            };

        match Self::open_device(&instance, config) {
            Ok((physical_device, gfx_queue_family, device, gfx_queue)) => Ok(Self {
                entry,
                instance,
                debug_utils_loader,
                debug_messenger,
                physical_device,
                gfx_queue_family,
                device,
                gfx_queue,
            }),
            Err(err) => {
                unsafe {
                    if let (Some(loader), Some(messenger)) =
                        (&debug_utils_loader, debug_messenger)
                    {
                        loader.destroy_debug_utils_messenger(messenger, None);
                    }
                    instance.destroy_instance(None);
                }
                Err(err)
            }
        }
    }

    fn create_instance(entry: &ash::Entry, config: &GpuConfig) -> Result<ash::Instance> {
        let app_name = CString::new("Arclight").unwrap();
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(&app_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(config.min_api_version);

        let instance_extensions = split_extension_list(&config.instance_extensions)?;
        let extension_ptrs: Vec<*const c_char> =
            instance_extensions.iter().map(|ext| ext.as_ptr()).collect();

        let validation_layer = CString::new(VALIDATION_LAYER).unwrap();
        let mut layer_ptrs: Vec<*const c_char> = Vec::new();
        if ENABLE_VALIDATION_LAYERS {
            layer_ptrs.push(validation_layer.as_ptr());
        }

        let mut create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        let mut messenger_create_info = debug_messenger_create_info();
        if ENABLE_VALIDATION_LAYERS {
            create_info = create_info.push_next(&mut messenger_create_info);
        }

        let instance = unsafe { entry.create_instance(&create_info, None)? };
        info!(
            extensions = instance_extensions.len(),
            "Vulkan instance created"
        );

        Ok(instance)
    }

    fn create_debug_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<(Option<DebugUtils>, Option<vk::DebugUtilsMessengerEXT>)> {
        if !ENABLE_VALIDATION_LAYERS {
            return Ok((None, None));
        }

        let loader = DebugUtils::new(entry, instance);
        let create_info = debug_messenger_create_info();
        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None)? };
        info!("Vulkan debug messenger created");

        Ok((Some(loader), Some(messenger)))
    }

    fn open_device(
        instance: &ash::Instance,
        config: &GpuConfig,
    ) -> Result<(vk::PhysicalDevice, u32, ash::Device, vk::Queue)> {
        let physical_device = match config.physical_device {
            Some(device) => device,
            None => Self::autoselect_physical_device(instance)?,
        };

        let gfx_queue_family = Self::find_gfx_queue_family(instance, physical_device)?;

        let device_extensions = split_extension_list(&config.device_extensions)?;
        let extension_ptrs: Vec<*const c_char> =
            device_extensions.iter().map(|ext| ext.as_ptr()).collect();

        let queue_priority = 1.0f32;
        let queue_create_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(gfx_queue_family)
            .queue_priorities(std::slice::from_ref(&queue_priority));

        let features = vk::PhysicalDeviceFeatures::builder();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(&extension_ptrs)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(physical_device, &create_info, None)? };
        let gfx_queue = unsafe { device.get_device_queue(gfx_queue_family, 0) };
        info!(gfx_queue_family, "logical device created");

        Ok((physical_device, gfx_queue_family, device, gfx_queue))
    }

    /// Picks the first enumerated adapter. Deliberately naive: callers that
    /// need present-support or feature filtering pre-select an adapter in
    /// [`GpuConfig::physical_device`] instead.
    fn autoselect_physical_device(instance: &ash::Instance) -> Result<vk::PhysicalDevice> {
        let physical_devices = unsafe { instance.enumerate_physical_devices()? };

        physical_devices
            .first()
            .copied()
            .ok_or(RendererError::NoPhysicalDevice)
    }

    fn find_gfx_queue_family(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
    ) -> Result<u32> {
        let queue_families =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

        queue_families
            .iter()
            .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            .map(|index| index as u32)
            .ok_or(RendererError::NoGraphicsQueue)
    }

    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// The selected adapter. A null handle here means the context is being
    /// used before construction finished, which is a caller bug.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        if self.physical_device == vk::PhysicalDevice::null() {
            warn!("fetching a null Vulkan physical device");
        }

        self.physical_device
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn gfx_queue_family(&self) -> u32 {
        self.gfx_queue_family
    }

    pub fn gfx_queue(&self) -> vk::Queue {
        self.gfx_queue
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_device(None);

            if let (Some(loader), Some(messenger)) =
                (&self.debug_utils_loader, self.debug_messenger)
            {
                loader.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

fn debug_messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXTBuilder<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Exercises instance/device bootstrap on machines that expose a Vulkan
    // ICD; environments without one log and skip.
    #[test]
    fn device_context_creation_and_drop() {
        let _guard = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();

        let config = GpuConfig::default();
        match DeviceContext::new(&config) {
            Ok(ctx) => {
                let families = unsafe {
                    ctx.instance()
                        .get_physical_device_queue_family_properties(ctx.physical_device())
                };
                let family = &families[ctx.gfx_queue_family() as usize];
                assert!(family.queue_flags.contains(vk::QueueFlags::GRAPHICS));
            }
            Err(err) => {
                tracing::warn!(?err, "skipping: no usable Vulkan implementation");
            }
        }
    }
}
