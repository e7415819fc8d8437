//! Rotating, textured, directionally lit mesh
//!
//! Used by both OBJ viewers; they differ only in where the mesh and texture come from.

use glfw::{Action, Key, WindowEvent};
use std::path::PathBuf;
use std::sync::Arc;

use vulkan_framework::prelude::*;
use vulkan_framework::vk_utils::ObjMesh;

use crate::geometry;
use crate::shaders::{MESH_FRAG, MESH_VERT};

/// Radians per second
const DEFAULT_ROTATION_SPEED: f32 = 0.8;

/// Where the mesh comes from
#[derive(Debug, Clone)]
pub enum ModelSource {
    /// OBJ file on disk
    ObjFile(PathBuf),
    /// Geometry built in code
    Procedural(ObjMesh),
}

/// Where the albedo texture comes from
#[derive(Debug, Clone)]
pub enum TextureSource {
    /// Image file on disk; a generated checkerboard is used if it fails to load
    File(PathBuf),
    /// Pixels built in code
    Generated(ImageData),
}

/// Uniform block shared by `mesh.vert` and `mesh.frag`
pub fn scene_parameters() -> ParametersListBuilder {
    ParametersListBuilder::new()
        .add("model", ParameterType::Mat4)
        .add("view_projection", ParameterType::Mat4)
        .add("light_direction", ParameterType::Vec3)
        .add("ambient", ParameterType::Float)
        .add("light_color", ParameterType::Vec3)
}

struct Scene {
    material: Material,
    mesh: Mesh,
    parameters: Arc<ParametersList>,
    camera: Camera,
}

/// Viewer application
pub struct MeshViewer {
    model: ModelSource,
    texture: Option<TextureSource>,
    scene: Option<Scene>,
    rotation: f32,
    rotation_speed: f32,
    paused: bool,
}

impl MeshViewer {
    /// Viewer for `model`; without a texture a checkerboard is generated
    pub fn new(model: ModelSource, texture: Option<TextureSource>) -> Self {
        Self {
            model,
            texture,
            scene: None,
            rotation: 0.0,
            rotation_speed: DEFAULT_ROTATION_SPEED,
            paused: false,
        }
    }

    /// Override the rotation speed in radians per second
    pub fn with_rotation_speed(mut self, speed: f32) -> Self {
        self.rotation_speed = speed;
        self
    }

    fn build_texture(&self, target: &RenderTarget) -> Result<Texture, AppError> {
        let fallback = || TextureBuilder::from_image_data(geometry::framed_checkerboard(256));

        let builder = match &self.texture {
            Some(TextureSource::File(path)) => TextureBuilder::from_file(path.clone()),
            Some(TextureSource::Generated(image)) => TextureBuilder::from_image_data(image.clone()),
            None => fallback(),
        };

        match builder.build(target) {
            Ok(texture) => Ok(texture),
            Err(FrameworkError::Asset(e)) => {
                log::warn!("Texture failed to load ({}), using checkerboard", e);
                Ok(fallback().build(target)?)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn mesh_builder(&self) -> MeshBuilder {
        match &self.model {
            ModelSource::ObjFile(path) => MeshBuilder::from_obj_file(path.clone()),
            ModelSource::Procedural(mesh) => MeshBuilder::from_obj(mesh.clone()),
        }
    }
}

impl Application for MeshViewer {
    fn initialize(&mut self, app: &mut VkApp) -> Result<(), AppError> {
        let target = app.render_target();

        let parameters = Arc::new(scene_parameters().build(&target)?);
        parameters.set("light_direction", Vec3::new(-0.4, -1.0, -0.6).normalize())?;
        parameters.set("light_color", [1.0f32, 0.96, 0.9])?;
        parameters.set("ambient", 0.15f32)?;

        let texture = Arc::new(self.build_texture(&target)?);
        let mesh = self.mesh_builder().build(&target)?;

        let material = MaterialBuilder::new()
            .with_vertex_shader(ShaderSource::glsl("mesh.vert", MESH_VERT))
            .with_fragment_shader(ShaderSource::glsl("mesh.frag", MESH_FRAG))
            .with_parameters(0, parameters.clone(), ShaderStages::ALL)
            .with_texture(1, texture, ShaderStages::FRAGMENT)
            .build(&target)?;

        let mut camera = Camera::default();
        if let Some((min, max)) = mesh.bounds() {
            camera.frame_bounds(min, max);
        }
        camera.set_aspect(app.aspect_ratio());

        log::info!(
            "Scene ready: {} triangles, {} frames in flight",
            mesh.index_count() / 3,
            target.frames_in_flight
        );

        self.scene = Some(Scene {
            material,
            mesh,
            parameters,
            camera,
        });
        Ok(())
    }

    fn update(&mut self, app: &mut VkApp, delta_time: f32) -> Result<(), AppError> {
        if !self.paused {
            self.rotation = (self.rotation + self.rotation_speed * delta_time) % std::f32::consts::TAU;
        }

        if let Some(scene) = &mut self.scene {
            scene.camera.set_aspect(app.aspect_ratio());
            scene.parameters.set("model", Mat4::rotation_y(self.rotation))?;
            scene.parameters.set("view_projection", scene.camera.view_projection())?;
        }
        Ok(())
    }

    fn render(&mut self, _app: &VkApp, frame: &mut Frame) -> Result<(), AppError> {
        if let Some(scene) = &self.scene {
            scene.material.bind(frame)?;
            scene.mesh.draw(frame);
        }
        Ok(())
    }

    fn on_resize(&mut self, _app: &mut VkApp, width: u32, height: u32) {
        log::debug!("Viewer resized to {}x{}", width, height);
    }

    fn handle_event(&mut self, app: &mut VkApp, event: &WindowEvent) -> Result<(), AppError> {
        match event {
            WindowEvent::Key(Key::Escape, _, Action::Press, _) => app.window_mut().set_should_close(true),
            WindowEvent::Key(Key::Space, _, Action::Press, _) => {
                self.paused = !self.paused;
                log::info!("Rotation {}", if self.paused { "paused" } else { "resumed" });
            }
            _ => {}
        }
        Ok(())
    }

    fn cleanup(&mut self, _app: &mut VkApp) {
        self.scene = None;
        log::info!("Viewer resources released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_parameter_layout_matches_shaders() {
        let layout = scene_parameters().layout().unwrap();
        let offset = |name: &str| layout.slot(name).map(|slot| slot.offset);
        assert_eq!(offset("model"), Some(0));
        assert_eq!(offset("view_projection"), Some(64));
        assert_eq!(offset("light_direction"), Some(128));
        assert_eq!(offset("ambient"), Some(140));
        assert_eq!(offset("light_color"), Some(144));
        assert_eq!(layout.size(), 160);
    }

    #[test]
    fn test_new_viewer_starts_empty() {
        let viewer = MeshViewer::new(ModelSource::Procedural(geometry::cube(0.5)), None).with_rotation_speed(2.0);
        assert!(viewer.scene.is_none());
        assert_eq!(viewer.rotation_speed, 2.0);
        assert!(matches!(viewer.mesh_builder(), MeshBuilder::Data(_)));
    }
}
