//! Shader loading and compilation
//!
//! Shaders arrive either as SPIR-V or as GLSL that is compiled at runtime with
//! shaderc. Either way the result is a [`ShaderModule`].

use ash::vk;
use std::ffi::CStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{Context, VulkanError, VulkanResult};

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Entry point every framework shader uses
pub fn entry_point() -> &'static CStr {
    // SAFETY: the literal is NUL-terminated with no interior NUL.
    unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") }
}

/// Where a shader's code comes from
#[derive(Debug, Clone)]
pub enum ShaderSource {
    /// Precompiled SPIR-V words
    Spirv(Vec<u32>),
    /// Path to a `.spv` file
    SpirvFile(PathBuf),
    /// GLSL source held in memory; `name` is used in compiler diagnostics
    Glsl {
        /// Name reported in compile errors
        name: String,
        /// GLSL source text
        code: String,
    },
    /// Path to a GLSL file (`.vert`, `.frag`, ...)
    GlslFile(PathBuf),
}

impl ShaderSource {
    /// In-memory GLSL
    pub fn glsl(name: impl Into<String>, code: impl Into<String>) -> Self {
        ShaderSource::Glsl {
            name: name.into(),
            code: code.into(),
        }
    }

    /// Pick SPIR-V or GLSL handling from the file extension
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.extension().map_or(false, |ext| ext == "spv") {
            ShaderSource::SpirvFile(path)
        } else {
            ShaderSource::GlslFile(path)
        }
    }

    /// Produce SPIR-V for `stage`, compiling GLSL if needed
    ///
    /// For GLSL files the extension wins over `stage` when it names a stage.
    pub fn to_spirv(&self, stage: vk::ShaderStageFlags) -> VulkanResult<Vec<u32>> {
        match self {
            ShaderSource::Spirv(words) => {
                validate_spirv(words)?;
                Ok(words.clone())
            }
            ShaderSource::SpirvFile(path) => spirv_from_bytes(&std::fs::read(path)?),
            ShaderSource::Glsl { name, code } => compile_glsl(name, code, stage),
            ShaderSource::GlslFile(path) => {
                let code = std::fs::read_to_string(path)?;
                let stage = stage_from_extension(path).unwrap_or(stage);
                compile_glsl(&path.to_string_lossy(), &code, stage)
            }
        }
    }
}

/// Shader stage implied by a GLSL file extension
pub fn stage_from_extension(path: &Path) -> Option<vk::ShaderStageFlags> {
    let stage = match path.extension()?.to_str()? {
        "vert" => vk::ShaderStageFlags::VERTEX,
        "frag" => vk::ShaderStageFlags::FRAGMENT,
        "comp" => vk::ShaderStageFlags::COMPUTE,
        "geom" => vk::ShaderStageFlags::GEOMETRY,
        "tesc" => vk::ShaderStageFlags::TESSELLATION_CONTROL,
        "tese" => vk::ShaderStageFlags::TESSELLATION_EVALUATION,
        _ => return None,
    };
    Some(stage)
}

/// Reinterpret little-endian bytes as SPIR-V words
pub fn spirv_from_bytes(bytes: &[u8]) -> VulkanResult<Vec<u32>> {
    if bytes.len() % 4 != 0 {
        return Err(VulkanError::ShaderCompilation(format!(
            "SPIR-V length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    validate_spirv(&words)?;
    Ok(words)
}

fn validate_spirv(words: &[u32]) -> VulkanResult<()> {
    match words.first() {
        Some(&SPIRV_MAGIC) => Ok(()),
        _ => Err(VulkanError::ShaderCompilation("Missing SPIR-V magic number".to_string())),
    }
}

fn shader_kind(stage: vk::ShaderStageFlags) -> VulkanResult<shaderc::ShaderKind> {
    let kind = match stage {
        vk::ShaderStageFlags::VERTEX => shaderc::ShaderKind::Vertex,
        vk::ShaderStageFlags::FRAGMENT => shaderc::ShaderKind::Fragment,
        vk::ShaderStageFlags::COMPUTE => shaderc::ShaderKind::Compute,
        vk::ShaderStageFlags::GEOMETRY => shaderc::ShaderKind::Geometry,
        vk::ShaderStageFlags::TESSELLATION_CONTROL => shaderc::ShaderKind::TessControl,
        vk::ShaderStageFlags::TESSELLATION_EVALUATION => shaderc::ShaderKind::TessEvaluation,
        other => {
            return Err(VulkanError::ShaderCompilation(format!(
                "Cannot compile GLSL for stage {:?}",
                other
            )))
        }
    };
    Ok(kind)
}

/// Compile GLSL to SPIR-V targeting Vulkan 1.0
pub fn compile_glsl(name: &str, code: &str, stage: vk::ShaderStageFlags) -> VulkanResult<Vec<u32>> {
    let kind = shader_kind(stage)?;
    let mut compiler = shaderc::Compiler::new()
        .ok_or_else(|| VulkanError::ShaderCompilation("shaderc compiler unavailable".to_string()))?;
    let mut options = shaderc::CompileOptions::new()
        .ok_or_else(|| VulkanError::ShaderCompilation("shaderc options unavailable".to_string()))?;
    options.set_target_env(shaderc::TargetEnv::Vulkan, shaderc::EnvVersion::Vulkan1_0 as u32);
    options.set_optimization_level(shaderc::OptimizationLevel::Performance);

    let artifact = compiler
        .compile_into_spirv(code, kind, name, "main", Some(&options))
        .map_err(|e| VulkanError::ShaderCompilation(format!("{}: {}", name, e)))?;

    if artifact.get_num_warnings() > 0 {
        log::warn!("{}: {}", name, artifact.get_warning_messages());
    }
    log::debug!("Compiled {} ({:?}, {} words)", name, stage, artifact.len() / 4);

    Ok(artifact.as_binary().to_vec())
}

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    context: Arc<Context>,
    module: vk::ShaderModule,
    stage: vk::ShaderStageFlags,
}

impl ShaderModule {
    /// Load or compile `source` and create a module for `stage`
    pub fn new(context: Arc<Context>, source: &ShaderSource, stage: vk::ShaderStageFlags) -> VulkanResult<Self> {
        let code = source.to_spirv(stage)?;
        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);
        let module = unsafe { context.device().create_shader_module(&create_info, None)? };
        Ok(Self { context, module, stage })
    }

    /// Module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Stage this module was built for
    pub fn stage(&self) -> vk::ShaderStageFlags {
        self.stage
    }

    /// Pipeline stage description using the `main` entry point
    pub fn stage_info(&self) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(self.stage)
            .module(self.module)
            .name(entry_point())
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.context.device().destroy_shader_module(self.module, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE_VERT: &str = r#"
        #version 450
        void main() {
            vec2 positions[3] = vec2[](vec2(0.0, -0.5), vec2(0.5, 0.5), vec2(-0.5, 0.5));
            gl_Position = vec4(positions[gl_VertexIndex], 0.0, 1.0);
        }
    "#;

    #[test]
    fn test_stage_from_extension() {
        assert_eq!(stage_from_extension(Path::new("mesh.vert")), Some(vk::ShaderStageFlags::VERTEX));
        assert_eq!(stage_from_extension(Path::new("a/b/mesh.frag")), Some(vk::ShaderStageFlags::FRAGMENT));
        assert_eq!(stage_from_extension(Path::new("mesh.glsl")), None);
        assert_eq!(stage_from_extension(Path::new("mesh")), None);
    }

    #[test]
    fn test_from_path_detects_spirv() {
        assert!(matches!(ShaderSource::from_path("mesh.vert.spv"), ShaderSource::SpirvFile(_)));
        assert!(matches!(ShaderSource::from_path("mesh.vert"), ShaderSource::GlslFile(_)));
    }

    #[test]
    fn test_spirv_bytes_validation() {
        assert!(spirv_from_bytes(&[1, 2, 3]).is_err());
        assert!(spirv_from_bytes(&[0, 0, 0, 0]).is_err());

        let words = spirv_from_bytes(&SPIRV_MAGIC.to_le_bytes()).unwrap();
        assert_eq!(words, vec![SPIRV_MAGIC]);
    }

    #[test]
    fn test_compile_glsl() {
        let words = compile_glsl("triangle.vert", TRIANGLE_VERT, vk::ShaderStageFlags::VERTEX).unwrap();
        assert_eq!(words[0], SPIRV_MAGIC);
    }

    #[test]
    fn test_compile_error_is_reported() {
        let result = compile_glsl("broken.frag", "#version 450\nvoid main() { nope; }", vk::ShaderStageFlags::FRAGMENT);
        assert!(matches!(result, Err(VulkanError::ShaderCompilation(_))));
    }

    #[test]
    fn test_unsupported_stage() {
        let result = compile_glsl("x", TRIANGLE_VERT, vk::ShaderStageFlags::ALL_GRAPHICS);
        assert!(result.is_err());
    }
}
