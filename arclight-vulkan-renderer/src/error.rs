use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

/// Errors surfaced by the rendering core.
///
/// Construction failures are unrecoverable for the object being built;
/// capacity overruns are reported and left to the caller. Transient
/// per-frame conditions (a failed image acquisition, a failed present) are
/// never reported through this type; they are logged and the affected
/// viewport is skipped for the frame.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Vulkan API error: {0}")]
    Vk(#[from] vk::Result),

    #[error("failed to load the Vulkan library: {0}")]
    EntryLoad(#[from] ash::LoadingError),

    #[error("no Vulkan physical device available")]
    NoPhysicalDevice,

    #[error("no graphics-capable queue family on the selected device")]
    NoGraphicsQueue,

    #[error("no host-visible, host-coherent memory type satisfies the buffer requirements")]
    NoSuitableMemoryType,

    #[error("surface does not support presentation on the graphics queue family")]
    UnsupportedSurface,

    #[error("extension name contains an interior NUL byte: {0:?}")]
    InvalidExtensionName(String),

    #[error("a camera owns at most {max} viewports, got {requested}")]
    TooManyViewports { requested: usize, max: usize },

    #[error("a frame renders at most {max} cameras, got {requested}")]
    TooManyCameras { requested: usize, max: usize },

    #[error("swapchain produced {count} images, more than the supported {max}")]
    TooManySwapchainImages { count: usize, max: usize },

    #[error("failed to read shader binary {}: {source}", path.display())]
    ShaderIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("shader binary {} is not valid SPIR-V", path.display())]
    InvalidSpirv { path: PathBuf },

    #[error("failed to create graphics pipeline: {0}")]
    PipelineCreation(vk::Result),
}

pub type Result<T, E = RendererError> = std::result::Result<T, E>;
