// Shader module loading
//
// Shaders arrive as precompiled SPIR-V files. They are read once at startup;
// the modules built from them only live until the pipeline is created.

use super::api::DeviceApi;
use super::handle::Owned;
use crate::error::{RenderError, Result};
use ash::vk;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::Arc;

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Vertex and fragment bytecode for the triangle pipeline.
#[derive(Debug, Clone)]
pub struct ShaderSet {
    pub vertex: Vec<u32>,
    pub fragment: Vec<u32>,
}

impl ShaderSet {
    pub fn load(vertex: impl AsRef<Path>, fragment: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            vertex: load_spirv(vertex.as_ref())?,
            fragment: load_spirv(fragment.as_ref())?,
        })
    }
}

/// Read a SPIR-V file. A missing or unreadable file is `ShaderLoad`;
/// malformed contents are `ShaderModuleCreation`.
pub fn load_spirv(path: &Path) -> Result<Vec<u32>> {
    let mut file = File::open(path).map_err(|source| RenderError::ShaderLoad {
        path: path.to_path_buf(),
        source,
    })?;
    let code = parse_spirv(&mut file)?;
    log::debug!("Loaded {} ({} words)", path.display(), code.len());
    Ok(code)
}

/// Decode SPIR-V words from `reader`, fixing endianness and checking the
/// magic number.
pub fn parse_spirv<R: Read + Seek>(reader: &mut R) -> Result<Vec<u32>> {
    let code = ash::util::read_spv(reader)
        .map_err(|e| RenderError::ShaderModuleCreation(format!("invalid SPIR-V: {e}")))?;

    match code.first() {
        Some(&SPIRV_MAGIC) => Ok(code),
        Some(&word) => Err(RenderError::ShaderModuleCreation(format!(
            "invalid SPIR-V magic number {word:#010x}"
        ))),
        None => Err(RenderError::ShaderModuleCreation("empty SPIR-V blob".to_string())),
    }
}

/// # Safety
/// `code` must be valid SPIR-V for the device.
pub unsafe fn create_shader_module<D: DeviceApi>(
    device: &Arc<D>,
    code: &[u32],
) -> Result<Owned<D, vk::ShaderModule>> {
    let create_info = vk::ShaderModuleCreateInfo::default().code(code);

    let module = device
        .create_shader_module(&create_info)
        .map_err(|e| RenderError::ShaderModuleCreation(e.to_string()))?;
    Ok(Owned::new(device, module))
}
