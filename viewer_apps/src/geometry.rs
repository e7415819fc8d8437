//! Procedural geometry and textures for viewers that load no files

use vulkan_framework::foundation::math::Vec3;
use vulkan_framework::vk_utils::{ImageData, ObjMesh, Vertex};

/// Cube centered at the origin with per-face normals and UVs, outward faces counter-clockwise
pub fn cube(half_extent: f32) -> ObjMesh {
    let faces = [
        (Vec3::x(), Vec3::y()),
        (-Vec3::x(), Vec3::y()),
        (Vec3::y(), -Vec3::z()),
        (-Vec3::y(), Vec3::z()),
        (Vec3::z(), Vec3::y()),
        (-Vec3::z(), Vec3::y()),
    ];

    let mut mesh = ObjMesh::default();
    for (normal, up) in faces {
        // right x up == normal keeps the winding counter-clockwise seen from outside.
        let right = up.cross(&normal);
        let center = normal * half_extent;
        let corners = [
            (-1.0, -1.0, [0.0, 1.0]),
            (1.0, -1.0, [1.0, 1.0]),
            (1.0, 1.0, [1.0, 0.0]),
            (-1.0, 1.0, [0.0, 0.0]),
        ];

        let base = mesh.vertices.len() as u32;
        for (u, v, tex_coord) in corners {
            let p = center + right * (u * half_extent) + up * (v * half_extent);
            mesh.vertices
                .push(Vertex::new([p.x, p.y, p.z], [normal.x, normal.y, normal.z], tex_coord));
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    mesh
}

/// Checkerboard with a colored border so texture orientation is visible
pub fn framed_checkerboard(size: u32) -> ImageData {
    let mut image = ImageData::checkerboard(size, (size / 8).max(1), [235, 235, 235, 255], [60, 60, 70, 255]);
    let border = (size / 32).max(1);
    for y in 0..size {
        for x in 0..size {
            if x < border || y < border || x >= size - border || y >= size - border {
                let offset = ((y * size + x) * 4) as usize;
                image.data[offset..offset + 4].copy_from_slice(&[200, 80, 40, 255]);
            }
        }
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(mesh: &ObjMesh, index: u32) -> Vec3 {
        Vec3::from(mesh.vertices[index as usize].position)
    }

    #[test]
    fn test_cube_counts() {
        let mesh = cube(0.5);
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        assert_eq!(mesh.bounds(), Some(([-0.5, -0.5, -0.5], [0.5, 0.5, 0.5])));
    }

    #[test]
    fn test_cube_faces_wind_outward() {
        let mesh = cube(1.0);
        for triangle in mesh.indices.chunks_exact(3) {
            let (a, b, c) = (
                position(&mesh, triangle[0]),
                position(&mesh, triangle[1]),
                position(&mesh, triangle[2]),
            );
            let geometric = (b - a).cross(&(c - a));
            let declared = Vec3::from(mesh.vertices[triangle[0] as usize].normal);
            assert!(geometric.dot(&declared) > 0.0, "triangle {:?} winds inward", triangle);
            assert!(declared.dot(&a) > 0.0, "normal of {:?} points inward", triangle);
        }
    }

    #[test]
    fn test_framed_checkerboard() {
        let image = framed_checkerboard(64);
        assert_eq!(image.width, 64);
        assert_eq!(image.pixel(0, 0), Some([200, 80, 40, 255]));
        assert_eq!(image.pixel(63, 10), Some([200, 80, 40, 255]));
        assert_eq!(image.pixel(4, 4), Some([235, 235, 235, 255]));
        assert_eq!(image.pixel(12, 4), Some([60, 60, 70, 255]));
    }
}
