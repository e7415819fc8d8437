//! Low-level Vulkan utilities
//!
//! RAII wrappers around Vulkan objects plus the asset loading glue that feeds them.
//! Every wrapper owns exactly one Vulkan object (or a tightly coupled group, like a
//! swapchain and its image views) and destroys it on drop.

use ash::vk;
use thiserror::Error;

pub mod context;
pub mod device;
pub mod swapchain;
pub mod sync;
pub mod commands;
pub mod buffer;
pub mod image;
pub mod render_pass;
pub mod framebuffer;
pub mod shader;
pub mod pipeline;
pub mod descriptor;
pub mod vertex;
pub mod obj_loader;
pub mod tools;

pub use buffer::{Buffer, MemoryLocation};
pub use commands::{CommandPool, CommandRecorder};
pub use context::Context;
pub use descriptor::{DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorSetWriter};
pub use device::{LogicalDevice, PhysicalDeviceInfo};
pub use framebuffer::Framebuffer;
pub use image::{Image, Sampler};
pub use obj_loader::{ObjLoader, ObjMesh};
pub use pipeline::{GraphicsPipeline, GraphicsPipelineBuilder};
pub use render_pass::RenderPass;
pub use shader::{ShaderModule, ShaderSource};
pub use swapchain::Swapchain;
pub use sync::{Fence, FrameSync, Semaphore};
pub use tools::{AssetError, ImageData};
pub use vertex::{Vertex, VertexLayout};

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Memory allocation through VMA failed
    #[error("Memory allocation failed: {0:?}")]
    Allocation(vk::Result),

    /// GLSL to SPIR-V compilation failed
    #[error("Shader compilation failed: {0}")]
    ShaderCompilation(String),

    /// Reading a shader or other file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<vk::Result> for VulkanError {
    fn from(result: vk::Result) -> Self {
        VulkanError::Api(result)
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;
