use std::path::Path;

use crate::math::Vec3;
use crate::scene::Vertex;

use super::{MeshError, MeshImporter};

const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Wavefront OBJ importer. Faces are triangulated on load; every triangle is
/// emitted as three vertices.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjImporter;

impl ObjImporter {
    pub fn new() -> Self {
        Self
    }
}

impl MeshImporter for ObjImporter {
    fn load(&self, path: &Path) -> Result<Vec<Vertex>, MeshError> {
        let options = tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        };
        let (models, materials) = tobj::load_obj(path, &options).map_err(|source| MeshError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        if let Err(e) = materials {
            log::debug!("{}: materials ignored ({e})", path.display());
        }

        let mut vertices = Vec::new();
        for model in &models {
            append_triangles(&model.mesh, &mut vertices);
        }

        if vertices.is_empty() {
            return Err(MeshError::Empty {
                path: path.to_path_buf(),
            });
        }

        log::info!(
            "loaded {} ({} models, {} triangles)",
            path.display(),
            models.len(),
            vertices.len() / 3
        );
        Ok(vertices)
    }
}

fn read3(data: &[f32], index: u32) -> Option<[f32; 3]> {
    let i = index as usize * 3;
    Some([*data.get(i)?, *data.get(i + 1)?, *data.get(i + 2)?])
}

fn append_triangles(mesh: &tobj::Mesh, out: &mut Vec<Vertex>) {
    for tri in mesh.indices.chunks_exact(3) {
        let positions = [
            read3(&mesh.positions, tri[0]),
            read3(&mesh.positions, tri[1]),
            read3(&mesh.positions, tri[2]),
        ];
        let [Some(p0), Some(p1), Some(p2)] = positions else {
            continue;
        };

        let normals = [
            read3(&mesh.normals, tri[0]),
            read3(&mesh.normals, tri[1]),
            read3(&mesh.normals, tri[2]),
        ];
        let normals = match normals {
            [Some(n0), Some(n1), Some(n2)] => [n0, n1, n2],
            _ => {
                let n = face_normal(p0, p1, p2);
                [n, n, n]
            }
        };

        out.push(Vertex::new(p0, normals[0], WHITE));
        out.push(Vertex::new(p1, normals[1], WHITE));
        out.push(Vertex::new(p2, normals[2], WHITE));
    }
}

fn face_normal(p0: [f32; 3], p1: [f32; 3], p2: [f32; 3]) -> [f32; 3] {
    let a = Vec3::from_array(p0);
    let b = Vec3::from_array(p1);
    let c = Vec3::from_array(p2);
    (b - a).cross(c - a).normalize_or_zero().to_array()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_obj(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".obj").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn quad_is_triangulated_with_face_normals() {
        let obj = write_obj(
            "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n",
        );
        let verts = ObjImporter::new().load(obj.path()).unwrap();
        assert_eq!(verts.len(), 6);
        for v in &verts {
            assert_eq!(v.normal, [0.0, 0.0, 1.0]);
            assert_eq!(v.color, WHITE);
        }
    }

    #[test]
    fn file_normals_are_kept() {
        let obj = write_obj(
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 -1\nf 1//1 2//1 3//1\n",
        );
        let verts = ObjImporter::new().load(obj.path()).unwrap();
        assert_eq!(verts.len(), 3);
        assert!(verts.iter().all(|v| v.normal == [0.0, 0.0, -1.0]));
    }

    #[test]
    fn file_without_faces_is_empty() {
        let obj = write_obj("v 0 0 0\nv 1 0 0\n");
        let err = ObjImporter::new().load(obj.path()).unwrap_err();
        assert!(matches!(err, MeshError::Empty { .. }));
    }

    #[test]
    fn missing_file_fails_to_load() {
        let err = ObjImporter::new()
            .load(Path::new("/no/such/model.obj"))
            .unwrap_err();
        assert!(matches!(err, MeshError::Load { .. }));
    }
}
