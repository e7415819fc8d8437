//! Textured OBJ viewer
//!
//! Loads a model and an optional texture, then spins the model under a directional light.
//! Space pauses the rotation, Escape quits.

use clap::Parser;
use std::path::PathBuf;
use vulkan_framework::{run, AppError};
use viewer_apps::args::CommonArgs;
use viewer_apps::mesh_viewer::{MeshViewer, ModelSource, TextureSource};

#[derive(Parser, Debug)]
#[command(name = "obj_viewer", about = "Display a rotating textured OBJ model")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// OBJ model to display
    #[arg(long, default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/models/cube.obj"))]
    model: PathBuf,

    /// Albedo texture; a checkerboard is generated when omitted
    #[arg(long)]
    texture: Option<PathBuf>,

    /// Rotation speed in radians per second
    #[arg(long, default_value_t = 0.8)]
    speed: f32,
}

fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    cli.common.init_logging();

    log::info!("Starting OBJ viewer with {:?}", cli.model);

    let config = cli.common.app_config("OBJ Viewer")?;
    let viewer = MeshViewer::new(
        ModelSource::ObjFile(cli.model),
        cli.texture.map(TextureSource::File),
    )
    .with_rotation_speed(cli.speed);

    run(config, viewer)
}
