//! # Render Framework
//!
//! Builder-produced assets on top of [`crate::vk_utils`]:
//!
//! - [`Texture`]: sampled image plus sampler
//! - [`Mesh`]: device-local vertex and index buffers
//! - [`ParametersList`]: named uniform values laid out with std140 rules,
//!   one buffer copy per frame in flight
//! - [`Material`]: pipeline plus the descriptor sets binding textures and
//!   parameter lists, with an optional push constant range
//! - [`Camera`]: view and projection matrices for Vulkan clip space

use ash::vk;
use bitflags::bitflags;
use thiserror::Error;

use crate::vk_utils::{AssetError, VulkanError};

pub mod camera;
pub mod material;
pub mod mesh;
pub mod parameters;
pub mod texture;

pub use camera::Camera;
pub use material::{BindingPlan, Material, MaterialBuilder};
pub use mesh::{Mesh, MeshBuilder};
pub use parameters::{ParameterType, ParameterValue, ParametersList, ParametersListBuilder};
pub use texture::{Texture, TextureBuilder};

/// Errors from building or using render framework assets
#[derive(Error, Debug)]
pub enum FrameworkError {
    /// Underlying Vulkan failure
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),

    /// Model or image could not be loaded
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    /// Two resources were assigned the same descriptor binding
    #[error("Binding {0} is used more than once")]
    DuplicateBinding(u32),

    /// A parameter name was declared more than once
    #[error("Parameter '{0}' is declared more than once")]
    DuplicateParameter(String),

    /// A parameter was looked up without being declared
    #[error("Unknown parameter '{0}'")]
    UnknownParameter(String),

    /// A parameter was set with a value of the wrong type
    #[error("Parameter '{name}' is {expected:?}, got {actual:?}")]
    ParameterTypeMismatch {
        /// Parameter name
        name: String,
        /// Declared type
        expected: ParameterType,
        /// Type of the supplied value
        actual: ParameterType,
    },

    /// A required shader stage was not supplied
    #[error("Missing {0} shader")]
    MissingShader(&'static str),

    /// Push constant data does not fit the declared range
    #[error("Push constant data of {size} bytes does not fit range of {range} bytes")]
    PushConstantSize {
        /// Bytes supplied
        size: usize,
        /// Bytes declared
        range: u32,
    },

    /// The builder was given nothing to build from
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for render framework operations
pub type FrameworkResult<T> = Result<T, FrameworkError>;

bitflags! {
    /// Shader stages a binding or push constant range is visible to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        /// Vertex shader
        const VERTEX = 1 << 0;
        /// Fragment shader
        const FRAGMENT = 1 << 1;
        /// Both graphics stages
        const ALL = Self::VERTEX.bits() | Self::FRAGMENT.bits();
    }
}

impl ShaderStages {
    /// Matching Vulkan stage flags
    pub fn to_vk(self) -> vk::ShaderStageFlags {
        let mut flags = vk::ShaderStageFlags::empty();
        if self.contains(ShaderStages::VERTEX) {
            flags |= vk::ShaderStageFlags::VERTEX;
        }
        if self.contains(ShaderStages::FRAGMENT) {
            flags |= vk::ShaderStageFlags::FRAGMENT;
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_stages_to_vk() {
        assert_eq!(ShaderStages::VERTEX.to_vk(), vk::ShaderStageFlags::VERTEX);
        assert_eq!(ShaderStages::FRAGMENT.to_vk(), vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(
            ShaderStages::ALL.to_vk(),
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
        );
        assert_eq!(ShaderStages::empty().to_vk(), vk::ShaderStageFlags::empty());
    }
}
