//! GLSL sources compiled at startup

/// Lit, textured mesh vertex shader
pub const MESH_VERT: &str = include_str!("../shaders/mesh.vert");

/// Lit, textured mesh fragment shader
pub const MESH_FRAG: &str = include_str!("../shaders/mesh.frag");

/// Push constant triangle vertex shader
pub const PUSH_CONSTANTS_VERT: &str = include_str!("../shaders/push_constants.vert");

/// Push constant triangle fragment shader
pub const PUSH_CONSTANTS_FRAG: &str = include_str!("../shaders/push_constants.frag");

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;
    use vulkan_framework::vk_utils::shader::compile_glsl;

    #[test]
    fn test_shaders_compile() {
        let sources = [
            ("mesh.vert", MESH_VERT, vk::ShaderStageFlags::VERTEX),
            ("mesh.frag", MESH_FRAG, vk::ShaderStageFlags::FRAGMENT),
            ("push_constants.vert", PUSH_CONSTANTS_VERT, vk::ShaderStageFlags::VERTEX),
            ("push_constants.frag", PUSH_CONSTANTS_FRAG, vk::ShaderStageFlags::FRAGMENT),
        ];
        for (name, code, stage) in sources {
            assert!(compile_glsl(name, code, stage).is_ok(), "{} failed to compile", name);
        }
    }
}
