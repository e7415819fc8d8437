//! Vertex format shared by meshes and pipelines

use ash::vk;
use bytemuck::{Pod, Zeroable};

/// Interleaved mesh vertex: position, normal, texture coordinate
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Object-space normal
    pub normal: [f32; 3],
    /// Texture coordinate, V pointing down
    pub tex_coord: [f32; 2],
}

impl Vertex {
    /// Create a vertex
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tex_coord,
        }
    }

    /// Input layout matching `layout(location = 0..2)` in the vertex shader
    pub fn layout() -> VertexLayout {
        VertexLayout::new(std::mem::size_of::<Vertex>() as u32)
            .with_attribute(0, vk::Format::R32G32B32_SFLOAT, 0)
            .with_attribute(1, vk::Format::R32G32B32_SFLOAT, 12)
            .with_attribute(2, vk::Format::R32G32_SFLOAT, 24)
    }
}

/// Single-binding vertex input description
#[derive(Debug, Clone)]
pub struct VertexLayout {
    binding: vk::VertexInputBindingDescription,
    attributes: Vec<vk::VertexInputAttributeDescription>,
}

impl VertexLayout {
    /// Per-vertex binding 0 with the given stride
    pub fn new(stride: u32) -> Self {
        Self {
            binding: vk::VertexInputBindingDescription {
                binding: 0,
                stride,
                input_rate: vk::VertexInputRate::VERTEX,
            },
            attributes: Vec::new(),
        }
    }

    /// Add an attribute read from binding 0
    pub fn with_attribute(mut self, location: u32, format: vk::Format, offset: u32) -> Self {
        self.attributes.push(vk::VertexInputAttributeDescription {
            binding: 0,
            location,
            format,
            offset,
        });
        self
    }

    /// Binding description
    pub fn binding(&self) -> &vk::VertexInputBindingDescription {
        &self.binding
    }

    /// Attribute descriptions
    pub fn attributes(&self) -> &[vk::VertexInputAttributeDescription] {
        &self.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
        let layout = Vertex::layout();
        assert_eq!(layout.binding().stride, 32);
        assert_eq!(layout.binding().input_rate, vk::VertexInputRate::VERTEX);
    }

    #[test]
    fn test_attribute_offsets_match_fields() {
        let layout = Vertex::layout();
        let offsets: Vec<u32> = layout.attributes().iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24]);

        let locations: Vec<u32> = layout.attributes().iter().map(|a| a.location).collect();
        assert_eq!(locations, vec![0, 1, 2]);
        assert_eq!(layout.attributes()[2].format, vk::Format::R32G32_SFLOAT);
    }

    #[test]
    fn test_vertex_bytes() {
        let vertex = Vertex::new([1.0, 2.0, 3.0], [0.0, 1.0, 0.0], [0.5, 0.25]);
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&vertex));
        assert_eq!(floats, &[1.0, 2.0, 3.0, 0.0, 1.0, 0.0, 0.5, 0.25]);
    }
}
