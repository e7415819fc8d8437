//! Indexed triangle meshes in device-local memory

use ash::vk;
use std::path::PathBuf;

use super::{FrameworkError, FrameworkResult};
use crate::app::{Frame, RenderTarget};
use crate::vk_utils::{Buffer, ObjLoader, ObjMesh, Vertex};

/// Builder for [`Mesh`]
#[derive(Debug, Clone)]
pub enum MeshBuilder {
    /// Vertices and triangle list indices supplied directly
    Data(ObjMesh),
    /// OBJ file loaded at build time
    ObjFile(PathBuf),
}

impl MeshBuilder {
    /// Mesh from vertex and index data
    pub fn from_vertices(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        MeshBuilder::Data(ObjMesh { vertices, indices })
    }

    /// Mesh from an OBJ file
    pub fn from_obj_file(path: impl Into<PathBuf>) -> Self {
        MeshBuilder::ObjFile(path.into())
    }

    /// Mesh from an already loaded OBJ
    pub fn from_obj(mesh: ObjMesh) -> Self {
        MeshBuilder::Data(mesh)
    }

    fn load(self) -> FrameworkResult<ObjMesh> {
        let mesh = match self {
            MeshBuilder::Data(mesh) => mesh,
            MeshBuilder::ObjFile(path) => ObjLoader::load_file(path)?,
        };
        validate(&mesh)?;
        Ok(mesh)
    }

    /// Upload to device-local vertex and index buffers
    pub fn build(self, target: &RenderTarget) -> FrameworkResult<Mesh> {
        let data = self.load()?;
        let bounds = data.bounds();

        let vertex_buffer = Buffer::device_local_with_data(
            target.context.clone(),
            vk::BufferUsageFlags::VERTEX_BUFFER,
            &data.vertices,
        )?;
        let index_buffer = Buffer::device_local_with_data(
            target.context.clone(),
            vk::BufferUsageFlags::INDEX_BUFFER,
            &data.indices,
        )?;

        log::debug!(
            "Mesh uploaded: {} vertices, {} indices",
            data.vertices.len(),
            data.indices.len()
        );

        Ok(Mesh {
            vertex_buffer,
            index_buffer,
            vertex_count: data.vertices.len() as u32,
            index_count: data.indices.len() as u32,
            bounds,
        })
    }
}

fn validate(mesh: &ObjMesh) -> FrameworkResult<()> {
    if mesh.vertices.is_empty() || mesh.indices.is_empty() {
        return Err(FrameworkError::InvalidInput("mesh has no geometry".to_string()));
    }
    if mesh.indices.len() % 3 != 0 {
        return Err(FrameworkError::InvalidInput(format!(
            "index count {} is not a multiple of 3",
            mesh.indices.len()
        )));
    }
    if let Some(&bad) = mesh.indices.iter().find(|&&i| i as usize >= mesh.vertices.len()) {
        return Err(FrameworkError::InvalidInput(format!(
            "index {} out of range for {} vertices",
            bad,
            mesh.vertices.len()
        )));
    }
    Ok(())
}

/// Mesh ready to draw
pub struct Mesh {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    vertex_count: u32,
    index_count: u32,
    bounds: Option<([f32; 3], [f32; 3])>,
}

impl Mesh {
    /// Bind the buffers and draw every triangle; a material must be bound first
    pub fn draw(&self, frame: &mut Frame) {
        let recorder = frame.recorder();
        recorder.bind_vertex_buffers(0, &[self.vertex_buffer.handle()], &[0]);
        recorder.bind_index_buffer(self.index_buffer.handle(), 0, vk::IndexType::UINT32);
        recorder.draw_indexed(self.index_count, 1, 0, 0, 0);
    }

    /// Axis-aligned bounds as `(min, max)`
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        self.bounds
    }

    /// Number of indices
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Number of unique vertices
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f32) -> Vertex {
        Vertex::new([x, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0])
    }

    #[test]
    fn test_valid_triangle() {
        let builder = MeshBuilder::from_vertices(vec![vertex(0.0), vertex(1.0), vertex(2.0)], vec![0, 1, 2]);
        let mesh = builder.load().unwrap();
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn test_rejects_bad_geometry() {
        let empty = MeshBuilder::from_vertices(Vec::new(), Vec::new());
        assert!(matches!(empty.load(), Err(FrameworkError::InvalidInput(_))));

        let partial = MeshBuilder::from_vertices(vec![vertex(0.0), vertex(1.0)], vec![0, 1]);
        assert!(partial.load().is_err());

        let out_of_range = MeshBuilder::from_vertices(vec![vertex(0.0), vertex(1.0), vertex(2.0)], vec![0, 1, 3]);
        assert!(out_of_range.load().is_err());
    }

    #[test]
    fn test_missing_obj_file() {
        let result = MeshBuilder::from_obj_file("missing/model.obj").load();
        assert!(matches!(result, Err(FrameworkError::Asset(_))));
    }
}
