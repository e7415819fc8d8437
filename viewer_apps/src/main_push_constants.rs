//! Push constant demo
//!
//! A single triangle generated in the vertex shader. Color, offset, scale and
//! rotation are pushed every frame; nothing is bound but the pipeline.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use clap::Parser;
use glfw::{Action, Key, WindowEvent};

use vulkan_framework::prelude::*;
use viewer_apps::args::CommonArgs;
use viewer_apps::shaders::{PUSH_CONSTANTS_FRAG, PUSH_CONSTANTS_VERT};

/// Matches the `PushConstants` block in `push_constants.vert`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
struct TrianglePush {
    color: [f32; 4],
    offset: [f32; 2],
    scale: f32,
    time: f32,
}

#[derive(Parser, Debug)]
#[command(name = "push_constants_demo", about = "Animate a triangle through push constants")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Triangle scale in normalized device coordinates
    #[arg(long, default_value_t = 0.8)]
    scale: f32,
}

struct PushConstantsDemo {
    material: Option<Material>,
    push: TrianglePush,
    time: f32,
    paused: bool,
}

impl PushConstantsDemo {
    fn new(scale: f32) -> Self {
        Self {
            material: None,
            push: TrianglePush {
                scale,
                ..TrianglePush::default()
            },
            time: 0.0,
            paused: false,
        }
    }

    fn animate(&mut self, delta_time: f32) {
        if !self.paused {
            self.time += delta_time;
        }
        let t = self.time;
        self.push.time = t;
        self.push.offset = [0.3 * (t * 0.7).sin(), 0.2 * (t * 1.1).cos()];
        self.push.color = [
            0.5 + 0.5 * t.sin(),
            0.5 + 0.5 * (t + 2.094).sin(),
            0.5 + 0.5 * (t + 4.189).sin(),
            1.0,
        ];
    }
}

impl Application for PushConstantsDemo {
    fn initialize(&mut self, app: &mut VkApp) -> Result<(), AppError> {
        let material = MaterialBuilder::new()
            .with_vertex_shader(ShaderSource::glsl("push_constants.vert", PUSH_CONSTANTS_VERT))
            .with_fragment_shader(ShaderSource::glsl("push_constants.frag", PUSH_CONSTANTS_FRAG))
            .without_vertex_input()
            .with_cull_mode(vk::CullModeFlags::NONE)
            .with_depth_test(false)
            .with_push_constants(std::mem::size_of::<TrianglePush>() as u32, ShaderStages::VERTEX)
            .build(&app.render_target())?;

        self.material = Some(material);
        self.animate(0.0);
        Ok(())
    }

    fn update(&mut self, _app: &mut VkApp, delta_time: f32) -> Result<(), AppError> {
        self.animate(delta_time);
        Ok(())
    }

    fn render(&mut self, _app: &VkApp, frame: &mut Frame) -> Result<(), AppError> {
        if let Some(material) = &self.material {
            material.bind(frame)?;
            material.push_constants(frame, &self.push)?;
            frame.recorder().draw(3, 1, 0, 0);
        }
        Ok(())
    }

    fn handle_event(&mut self, app: &mut VkApp, event: &WindowEvent) -> Result<(), AppError> {
        match event {
            WindowEvent::Key(Key::Escape, _, Action::Press, _) => app.window_mut().set_should_close(true),
            WindowEvent::Key(Key::Space, _, Action::Press, _) => self.paused = !self.paused,
            _ => {}
        }
        Ok(())
    }

    fn cleanup(&mut self, _app: &mut VkApp) {
        self.material = None;
    }
}

fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    cli.common.init_logging();

    let config = cli.common.app_config("Push Constants Demo")?;
    run(config, PushConstantsDemo::new(cli.scale))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_block_is_32_bytes() {
        assert_eq!(std::mem::size_of::<TrianglePush>(), 32);
        assert_eq!(std::mem::align_of::<TrianglePush>(), 4);
    }

    #[test]
    fn test_pause_freezes_animation() {
        let mut demo = PushConstantsDemo::new(0.5);
        demo.animate(1.0);
        demo.paused = true;
        let before = demo.push;
        demo.animate(1.0);
        assert_eq!(demo.push.time, before.time);
        assert_eq!(demo.push.scale, 0.5);
    }
}
