use std::ffi::CString;

use ash::vk;
use tracing::error;

use crate::error::{RendererError, Result};

/// Hard upper bound on the number of entries in one extension list.
pub const MAX_EXTENSIONS: usize = 32;

/// Graphics-API requirements negotiated by the display backend and consumed
/// by [`DeviceContext::new`](crate::DeviceContext::new).
///
/// Extension lists are single strings with space-separated extension names,
/// exactly as the display backend hands them over.
#[derive(Debug, Clone)]
pub struct GpuConfig {
    /// Minimum supported API version; drives `VkApplicationInfo::apiVersion`.
    pub min_api_version: u32,
    /// Maximum supported API version, as negotiated by the display backend.
    pub max_api_version: u32,
    pub instance_extensions: String,
    pub device_extensions: String,
    /// Pre-selected adapter. `None` triggers autoselection.
    pub physical_device: Option<vk::PhysicalDevice>,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            min_api_version: vk::API_VERSION_1_0,
            max_api_version: vk::API_VERSION_1_3,
            instance_extensions: String::new(),
            device_extensions: String::new(),
            physical_device: None,
        }
    }
}

/// Splits a space-separated extension list into C strings.
///
/// A list with more than [`MAX_EXTENSIONS`] entries yields zero extensions;
/// the overflow is logged rather than propagated, and the caller decides
/// whether the resulting device is still usable.
pub(crate) fn split_extension_list(list: &str) -> Result<Vec<CString>> {
    let names: Vec<&str> = list.split_whitespace().collect();

    if names.len() > MAX_EXTENSIONS {
        error!(
            count = names.len(),
            max = MAX_EXTENSIONS,
            "extension list exceeds the supported entry count, ignoring all entries"
        );
        return Ok(Vec::new());
    }

    names
        .into_iter()
        .map(|name| {
            CString::new(name).map_err(|_| RendererError::InvalidExtensionName(name.to_owned()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_space_separated_names() {
        let exts = split_extension_list("VK_KHR_surface VK_KHR_xcb_surface").unwrap();
        assert_eq!(exts.len(), 2);
        assert_eq!(exts[0].to_str().unwrap(), "VK_KHR_surface");
        assert_eq!(exts[1].to_str().unwrap(), "VK_KHR_xcb_surface");
    }

    #[test]
    fn empty_list_yields_no_extensions() {
        assert!(split_extension_list("").unwrap().is_empty());
        assert!(split_extension_list("   ").unwrap().is_empty());
    }

    #[test]
    fn overflowing_list_yields_no_extensions() {
        let list = (0..MAX_EXTENSIONS + 1)
            .map(|i| format!("VK_EXT_fake_{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        assert!(split_extension_list(&list).unwrap().is_empty());
    }

    #[test]
    fn list_at_the_bound_is_kept() {
        let list = (0..MAX_EXTENSIONS)
            .map(|i| format!("VK_EXT_fake_{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(split_extension_list(&list).unwrap().len(), MAX_EXTENSIONS);
    }

    #[test]
    fn interior_nul_is_rejected() {
        assert!(matches!(
            split_extension_list("VK_KHR\0surface"),
            Err(RendererError::InvalidExtensionName(_))
        ));
    }
}
