use super::Vertex;

/// Indexed triangle list with 16-bit indices.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
}

fn color_from_pos(p: [f32; 3]) -> [f32; 4] {
    [(p[0] + 1.0) * 0.5, (p[1] + 1.0) * 0.5, (p[2] + 1.0) * 0.5, 1.0]
}

/// Unit cube spanning [-1, 1]^3: four vertices per face so each face keeps its
/// own normal, clockwise front faces, color derived from position.
pub fn build_box() -> MeshData {
    const FACES: [([f32; 3], [[f32; 3]; 4]); 6] = [
        ([0.0, 0.0, -1.0], [[-1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [1.0, 1.0, -1.0], [1.0, -1.0, -1.0]]),
        ([0.0, 0.0, 1.0], [[1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [-1.0, 1.0, 1.0], [-1.0, -1.0, 1.0]]),
        ([-1.0, 0.0, 0.0], [[-1.0, -1.0, 1.0], [-1.0, 1.0, 1.0], [-1.0, 1.0, -1.0], [-1.0, -1.0, -1.0]]),
        ([1.0, 0.0, 0.0], [[1.0, -1.0, -1.0], [1.0, 1.0, -1.0], [1.0, 1.0, 1.0], [1.0, -1.0, 1.0]]),
        ([0.0, 1.0, 0.0], [[-1.0, 1.0, -1.0], [-1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, -1.0]]),
        ([0.0, -1.0, 0.0], [[1.0, -1.0, -1.0], [1.0, -1.0, 1.0], [-1.0, -1.0, 1.0], [-1.0, -1.0, -1.0]]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, corners) in FACES {
        let base = vertices.len() as u16;
        vertices.extend(corners.iter().map(|&p| Vertex::new(p, normal, color_from_pos(p))));
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    MeshData { vertices, indices }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;

    #[test]
    fn box_has_24_vertices_and_36_indices() {
        let mesh = build_box();
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
    }

    #[test]
    fn colors_follow_position() {
        let mesh = build_box();
        let v = mesh.vertices[0];
        assert_eq!(v.pos, [-1.0, -1.0, -1.0]);
        assert_eq!(v.color, [0.0, 0.0, 0.0, 1.0]);
        assert!(mesh.vertices.iter().all(|v| v.color[3] == 1.0));
    }

    #[test]
    fn triangles_wind_clockwise_seen_from_outside() {
        let mesh = build_box();
        for tri in mesh.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vec3::from_array(mesh.vertices[i as usize].pos));
            let n = Vec3::from_array(mesh.vertices[tri[0] as usize].normal);
            // Clockwise in a left-handed frame: (b - a) x (c - a) points along the outward normal.
            assert!((b - a).cross(c - a).dot(n) > 0.0);
        }
    }
}
