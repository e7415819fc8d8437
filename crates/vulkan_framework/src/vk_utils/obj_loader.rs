//! Wavefront OBJ loading through `tobj`
//!
//! Every model in the file is merged into one indexed triangle list. Texture
//! coordinates get their V flipped so image row 0 maps to the top, missing normals
//! are rebuilt from face normals, and identical vertices are shared.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use super::tools::AssetError;
use super::vertex::Vertex;

/// Indexed triangle mesh on the CPU
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjMesh {
    /// Unique vertices
    pub vertices: Vec<Vertex>,
    /// Triangle list indices into `vertices`
    pub indices: Vec<u32>,
}

impl ObjMesh {
    /// Axis-aligned bounds as `(min, max)`, `None` for an empty mesh
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let first = self.vertices.first()?.position;
        let bounds = self.vertices.iter().fold((first, first), |(mut min, mut max), v| {
            for axis in 0..3 {
                min[axis] = min[axis].min(v.position[axis]);
                max[axis] = max[axis].max(v.position[axis]);
            }
            (min, max)
        });
        Some(bounds)
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// OBJ loader
pub struct ObjLoader;

impl ObjLoader {
    fn load_options() -> tobj::LoadOptions {
        tobj::LoadOptions {
            single_index: true,
            triangulate: true,
            ignore_points: true,
            ignore_lines: true,
            ..Default::default()
        }
    }

    /// Load and merge every model in an OBJ file; materials are ignored
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<ObjMesh, AssetError> {
        let path = path.as_ref();
        log::debug!("Loading OBJ from {:?}", path);

        let (models, _materials) = tobj::load_obj(path, &Self::load_options())?;
        let mesh = Self::convert(&models)?;

        log::info!(
            "Loaded {:?}: {} vertices, {} triangles",
            path,
            mesh.vertices.len(),
            mesh.triangle_count()
        );
        Ok(mesh)
    }

    /// Load OBJ text from any buffered reader; `mtllib` references are ignored
    pub fn load_reader<R: BufRead>(reader: &mut R) -> Result<ObjMesh, AssetError> {
        let (models, _materials) =
            tobj::load_obj_buf(reader, &Self::load_options(), |_| Err(tobj::LoadError::OpenFileFailed))?;
        Self::convert(&models)
    }

    fn convert(models: &[tobj::Model]) -> Result<ObjMesh, AssetError> {
        let mut mesh = ObjMesh::default();
        let mut unique: HashMap<[u32; 8], u32> = HashMap::new();
        // Vertices whose normals are accumulated from faces rather than read
        let mut computed = Vec::new();

        for model in models {
            let source = &model.mesh;
            let has_normals = !source.normals.is_empty();
            let has_uvs = !source.texcoords.is_empty();
            let first_index = mesh.indices.len();

            for &index in &source.indices {
                let i = index as usize;
                let position = read3(&source.positions, i).ok_or_else(|| {
                    AssetError::InvalidData(format!("{}: position index {} out of range", model.name, i))
                })?;
                let normal = if has_normals {
                    read3(&source.normals, i).unwrap_or([0.0; 3])
                } else {
                    [0.0; 3]
                };
                let tex_coord = if has_uvs {
                    match (source.texcoords.get(2 * i), source.texcoords.get(2 * i + 1)) {
                        (Some(&u), Some(&v)) => [u, 1.0 - v],
                        _ => [0.0; 2],
                    }
                } else {
                    [0.0; 2]
                };

                let vertex = Vertex::new(position, normal, tex_coord);
                let key = vertex_key(&vertex);
                let vertex_index = *unique.entry(key).or_insert_with(|| {
                    mesh.vertices.push(vertex);
                    computed.push(!has_normals);
                    (mesh.vertices.len() - 1) as u32
                });
                mesh.indices.push(vertex_index);
            }

            if !has_normals {
                accumulate_face_normals(&mut mesh, &computed, first_index);
            }
        }

        for (vertex, &is_computed) in mesh.vertices.iter_mut().zip(&computed) {
            if is_computed {
                vertex.normal = normalize_or_up(vertex.normal);
            }
        }

        if mesh.indices.len() % 3 != 0 {
            return Err(AssetError::InvalidData("index count is not a multiple of 3".to_string()));
        }
        Ok(mesh)
    }
}

fn read3(values: &[f32], index: usize) -> Option<[f32; 3]> {
    let slice = values.get(3 * index..3 * index + 3)?;
    Some([slice[0], slice[1], slice[2]])
}

fn vertex_key(vertex: &Vertex) -> [u32; 8] {
    let mut key = [0u32; 8];
    let floats = vertex
        .position
        .iter()
        .chain(vertex.normal.iter())
        .chain(vertex.tex_coord.iter());
    for (slot, value) in key.iter_mut().zip(floats) {
        // Treat -0.0 and 0.0 as the same vertex.
        *slot = if *value == 0.0 { 0 } else { value.to_bits() };
    }
    key
}

fn accumulate_face_normals(mesh: &mut ObjMesh, computed: &[bool], first_index: usize) {
    for triangle in mesh.indices[first_index..].chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| mesh.vertices[i as usize].position);
        let e1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
        let e2 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
        // Unnormalized: larger faces weigh more.
        let face = [
            e1[1] * e2[2] - e1[2] * e2[1],
            e1[2] * e2[0] - e1[0] * e2[2],
            e1[0] * e2[1] - e1[1] * e2[0],
        ];
        for &i in triangle {
            if computed[i as usize] {
                let normal = &mut mesh.vertices[i as usize].normal;
                for axis in 0..3 {
                    normal[axis] += face[axis];
                }
            }
        }
    }
}

fn normalize_or_up(v: [f32; 3]) -> [f32; 3] {
    let length = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if length > f32::EPSILON {
        [v[0] / length, v[1] / length, v[2] / length]
    } else {
        [0.0, 1.0, 0.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    const QUAD_WITH_UVS: &str = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1
f 1/1/1 3/3/1 4/4/1
";

    const TRIANGLE_NO_NORMALS: &str = "\
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
";

    fn load(text: &str) -> ObjMesh {
        ObjLoader::load_reader(&mut Cursor::new(text.as_bytes())).unwrap()
    }

    #[test]
    fn test_shared_vertices_are_deduplicated() {
        let mesh = load(QUAD_WITH_UVS);
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.indices[0], mesh.indices[3]);
        assert_eq!(mesh.indices[2], mesh.indices[4]);
    }

    #[test]
    fn test_v_coordinate_is_flipped() {
        let mesh = load(QUAD_WITH_UVS);
        let origin = mesh
            .vertices
            .iter()
            .find(|v| v.position == [0.0, 0.0, 0.0])
            .unwrap();
        assert_eq!(origin.tex_coord, [0.0, 1.0]);

        let top_right = mesh
            .vertices
            .iter()
            .find(|v| v.position == [1.0, 1.0, 0.0])
            .unwrap();
        assert_eq!(top_right.tex_coord, [1.0, 0.0]);
    }

    #[test]
    fn test_normals_are_read() {
        let mesh = load(QUAD_WITH_UVS);
        assert!(mesh.vertices.iter().all(|v| v.normal == [0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_missing_normals_are_computed() {
        let mesh = load(TRIANGLE_NO_NORMALS);
        assert_eq!(mesh.vertices.len(), 3);
        for vertex in &mesh.vertices {
            assert_relative_eq!(vertex.normal[0], 0.0);
            assert_relative_eq!(vertex.normal[1], 0.0);
            assert_relative_eq!(vertex.normal[2], 1.0);
            assert_eq!(vertex.tex_coord, [0.0, 0.0]);
        }
    }

    #[test]
    fn test_quads_are_triangulated() {
        let text = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let mesh = load(text);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.vertices.len(), 4);
    }

    #[test]
    fn test_bounds() {
        let mesh = load("v -1 2 0\nv 3 -4 1\nv 0 0 5\nf 1 2 3\n");
        assert_eq!(mesh.bounds(), Some(([-1.0, -4.0, 0.0], [3.0, 2.0, 5.0])));
        assert_eq!(ObjMesh::default().bounds(), None);
    }

    #[test]
    fn test_missing_file() {
        assert!(ObjLoader::load_file("no/such/model.obj").is_err());
    }
}
