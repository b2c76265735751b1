use crate::math::{Mat4, Vec3};
use crate::scene::Vertex;

/// Extents below this are treated as a degenerate (point-like) model.
const MIN_EXTENT: f32 = 1e-6;

/// Axis-aligned bounding box of a vertex set.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    /// `None` for an empty slice.
    pub fn from_vertices(vertices: &[Vertex]) -> Option<Self> {
        let first = Vec3::from_array(vertices.first()?.pos);
        let (min, max) = vertices.iter().fold((first, first), |(lo, hi), v| {
            let p = Vec3::from_array(v.pos);
            (lo.min(p), hi.max(p))
        });
        Some(Self { min, max })
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Uniform scale bringing the largest extent to 2 units.
    pub fn normalize_scale(&self) -> f32 {
        let max_dim = self.extent().max_element();
        if max_dim > MIN_EXTENT { 2.0 / max_dim } else { 1.0 }
    }

    /// `scale * translate(-center)`: recenters on the origin, then scales.
    pub fn normalizing_transform(&self) -> Mat4 {
        Mat4::scaling(Vec3::splat(self.normalize_scale())) * Mat4::translation(-self.center())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn v(x: f32, y: f32, z: f32) -> Vertex {
        Vertex::new([x, y, z], [0.0, 1.0, 0.0], [1.0; 4])
    }

    #[test]
    fn empty_has_no_bounds() {
        assert!(Bounds::from_vertices(&[]).is_none());
    }

    #[test]
    fn center_and_scale() {
        let b = Bounds::from_vertices(&[v(-2.0, 0.0, 1.0), v(6.0, 1.0, 3.0), v(0.0, -1.0, 2.0)]).unwrap();
        assert_eq!(b.center(), Vec3::new(2.0, 0.0, 2.0));
        assert_relative_eq!(b.normalize_scale(), 0.25);

        let p = b.normalizing_transform().transform_point(Vec3::new(6.0, 1.0, 3.0));
        assert_relative_eq!(p[0], 1.0);
        assert_relative_eq!(p[1], 0.25);
        assert_relative_eq!(p[2], 0.25);
    }

    #[test]
    fn degenerate_extent_keeps_unit_scale() {
        let b = Bounds::from_vertices(&[v(3.0, 3.0, 3.0)]).unwrap();
        assert_eq!(b.normalize_scale(), 1.0);
    }
}
