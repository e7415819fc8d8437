//! # Vulkan Framework
//!
//! A thin object-oriented layer over Vulkan for small sample applications.
//!
//! ## Features
//!
//! - **Window + swapchain lifecycle**: GLFW window, acquire/submit/present with
//!   out-of-date and resize recovery
//! - **RAII handles**: every Vulkan object is owned by a wrapper that destroys it on drop
//! - **Render framework**: builders producing materials, meshes, textures and
//!   parameter lists backed by Vulkan resources
//! - **Asset glue**: OBJ models through `tobj`, images through `image`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vulkan_framework::prelude::*;
//!
//! struct MyApp;
//!
//! impl Application for MyApp {
//!     fn initialize(&mut self, app: &mut VkApp) -> Result<(), AppError> {
//!         Ok(())
//!     }
//!
//!     fn render(&mut self, app: &VkApp, frame: &mut Frame) -> Result<(), AppError> {
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<(), AppError> {
//!     let config = AppConfig::new("My App");
//!     run(config, MyApp)
//! }
//! ```

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod window;
pub mod vk_utils;
pub mod render_framework;
pub mod app;

pub use app::{run, AppError, Application, Frame, RenderTarget, VkApp};
pub use config::{AppConfig, Config, ConfigError, ConfigFormat, RendererConfig, WindowConfig};

/// Common imports for framework users
pub mod prelude {
    pub use crate::{
        app::{run, AppError, Application, Frame, FrameTimer, RenderTarget, VkApp},
        config::{AppConfig, Config, RendererConfig, WindowConfig},
        foundation::math::{Mat4, Mat4Ext, Vec3},
        render_framework::{
            Camera, FrameworkError, Material, MaterialBuilder, Mesh, MeshBuilder,
            ParameterType, ParameterValue, ParametersList, ParametersListBuilder, ShaderStages,
            Texture, TextureBuilder,
        },
        vk_utils::{ImageData, ShaderSource, Vertex},
    };
}
