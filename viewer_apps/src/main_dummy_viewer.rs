//! Viewer that needs no asset files
//!
//! Draws a procedural cube with a generated checkerboard, useful for checking
//! that the device, swapchain and pipeline work before loading real models.

use clap::Parser;
use vulkan_framework::{run, AppError};
use viewer_apps::args::CommonArgs;
use viewer_apps::geometry;
use viewer_apps::mesh_viewer::{MeshViewer, ModelSource, TextureSource};

#[derive(Parser, Debug)]
#[command(name = "dummy_obj_viewer", about = "Display a procedural cube")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Checkerboard texture size in pixels
    #[arg(long, default_value_t = 256)]
    texture_size: u32,
}

fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    cli.common.init_logging();

    let config = cli.common.app_config("Dummy OBJ Viewer")?;
    let viewer = MeshViewer::new(
        ModelSource::Procedural(geometry::cube(0.5)),
        Some(TextureSource::Generated(geometry::framed_checkerboard(cli.texture_size.max(8)))),
    );

    run(config, viewer)
}
