//! GPU resource and frame-rendering core for the Arclight engine.
//!
//! The crate bootstraps a Vulkan device, wraps swapchain-backed viewports
//! and their cameras, and drives a frames-in-flight render loop that uploads
//! a per-frame debug draw list and presents it through a line-list pass.
//! Display/session bootstrap, the world simulation, scripting, and
//! networking live in sibling crates; this one only consumes a negotiated
//! [`GpuConfig`] and per-target [`ViewportConfig`]s from the display
//! backend, and hands the world simulation a [`DebugDrawList`] to fill each
//! tick.

mod buffer;
mod camera;
mod config;
mod debug_pass;
mod device;
mod draw_list;
mod error;
mod frame;
mod renderer;
mod shader;
mod viewport;

pub use buffer::GpuVector;
pub use camera::{Camera, CameraConfig, MAX_VIEWPORTS_PER_CAMERA};
pub use config::{GpuConfig, MAX_EXTENSIONS};
pub use debug_pass::{DebugFrameData, DebugPass, RenderContext};
pub use device::DeviceContext;
pub use draw_list::{DebugDrawIndex, DebugDrawList, DebugDrawVertex};
pub use error::{RendererError, Result};
pub use frame::{DescriptorSetLayout, FrameData};
pub use renderer::{Renderer, FRAME_COUNT, MAX_CAMERA_NUM};
pub use shader::Shader;
pub use viewport::{
    Viewport, ViewportConfig, ViewportTarget, ViewportUniform, MAX_SWAPCHAIN_IMAGES,
};

/// Cap on frames the CPU may have queued for GPU execution; sizes each
/// viewport's acquire-semaphore ring.
pub const MAX_FRAMES_IN_FLIGHT: usize = 4;
