//! Application layer
//!
//! [`VkApp`] owns the window, the Vulkan context and everything tied to the
//! swapchain, and drives the acquire → record → submit → present cycle.
//! [`Application`] and [`run`] wrap that cycle in a main loop.

use thiserror::Error;

use crate::config::ConfigError;
use crate::render_framework::FrameworkError;
use crate::vk_utils::{AssetError, VulkanError};
use crate::window::WindowError;

pub mod base_app;
pub mod frame_state;
pub mod vk_app;

pub use base_app::{run, Application, FrameTimer};
pub use frame_state::{FrameCounter, SwapchainEvent, SwapchainState};
pub use vk_app::{Frame, RenderTarget, VkApp};

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Vulkan call or resource failure
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),

    /// Window system failure
    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    /// Invalid or unreadable configuration
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Material, mesh, texture or parameter failure
    #[error("Render framework error: {0}")]
    Framework(#[from] FrameworkError),

    /// Model or image loading failure
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    /// Application error
    #[error("Application error: {0}")]
    Custom(String),
}
