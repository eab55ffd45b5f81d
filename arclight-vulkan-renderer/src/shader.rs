use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use ash::util::read_spv;
use ash::vk;
use tracing::info;

use crate::device::DeviceContext;
use crate::error::{RendererError, Result};

/// One SPIR-V shader stage loaded from a precompiled binary.
pub struct Shader {
    ctx: Arc<DeviceContext>,
    stage: vk::ShaderStageFlags,
    module: vk::ShaderModule,
}

impl Shader {
    /// Reads a SPIR-V binary and creates its module. A missing or malformed
    /// file is a construction failure.
    pub fn from_file(
        ctx: Arc<DeviceContext>,
        stage: vk::ShaderStageFlags,
        path: impl AsRef<Path>,
    ) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading shader");

        let bytes = std::fs::read(path).map_err(|source| RendererError::ShaderIo {
            path: path.to_owned(),
            source,
        })?;

        let code = read_spv(&mut Cursor::new(&bytes)).map_err(|_| RendererError::InvalidSpirv {
            path: path.to_owned(),
        })?;

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);
        let module = unsafe { ctx.device().create_shader_module(&create_info, None)? };

        Ok(Self { ctx, stage, module })
    }

    pub fn stage(&self) -> vk::ShaderStageFlags {
        self.stage
    }

    pub fn module(&self) -> vk::ShaderModule {
        self.module
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device().destroy_shader_module(self.module, None);
        }
    }
}
