use core::ops::Mul;

use super::Vec3;

/// 4x4 matrix, column-major.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Mat4 {
    /// `cols[c][r]`.
    pub cols: [[f32; 4]; 4],
}

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4 {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    #[inline]
    pub const fn from_cols(cols: [[f32; 4]; 4]) -> Self {
        Self { cols }
    }

    #[inline]
    pub fn to_cols_array_2d(&self) -> [[f32; 4]; 4] {
        self.cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.cols[col][row]
    }

    pub fn translation(t: Vec3) -> Self {
        let mut m = Self::IDENTITY;
        m.cols[3] = [t.x, t.y, t.z, 1.0];
        m
    }

    pub fn scaling(s: Vec3) -> Self {
        let mut m = Self::IDENTITY;
        m.cols[0][0] = s.x;
        m.cols[1][1] = s.y;
        m.cols[2][2] = s.z;
        m
    }

    pub fn transpose(&self) -> Self {
        let mut out = [[0.0; 4]; 4];
        for (c, col) in out.iter_mut().enumerate() {
            for (r, v) in col.iter_mut().enumerate() {
                *v = self.cols[r][c];
            }
        }
        Self { cols: out }
    }

    /// Left-handed view matrix looking from `eye` toward `target`.
    pub fn look_at_lh(eye: Vec3, target: Vec3, up: Vec3) -> Self {
        let z = (target - eye).normalize_or_zero();
        let x = up.cross(z).normalize_or_zero();
        let y = z.cross(x);

        Self::from_cols([
            [x.x, y.x, z.x, 0.0],
            [x.y, y.y, z.y, 0.0],
            [x.z, y.z, z.z, 0.0],
            [-x.dot(eye), -y.dot(eye), -z.dot(eye), 1.0],
        ])
    }

    /// Left-handed perspective projection mapping `[near, far]` to clip depth `[0, 1]`.
    pub fn perspective_fov_lh(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let h = 1.0 / (0.5 * fov_y).tan();
        let w = h / aspect;
        let range = far / (far - near);

        Self::from_cols([
            [w, 0.0, 0.0, 0.0],
            [0.0, h, 0.0, 0.0],
            [0.0, 0.0, range, 1.0],
            [0.0, 0.0, -range * near, 0.0],
        ])
    }

    pub fn transform_point(&self, p: Vec3) -> [f32; 4] {
        let v = [p.x, p.y, p.z, 1.0];
        let mut out = [0.0; 4];
        for (r, o) in out.iter_mut().enumerate() {
            *o = (0..4).map(|c| self.cols[c][r] * v[c]).sum();
        }
        out
    }

    pub fn determinant(&self) -> f32 {
        let inv = self.adjugate();
        let m = &self.cols;
        m[0][0] * inv[0][0] + m[0][1] * inv[1][0] + m[0][2] * inv[2][0] + m[0][3] * inv[3][0]
    }

    /// General inverse; `None` for singular matrices.
    pub fn inverse(&self) -> Option<Self> {
        let adj = self.adjugate();
        let m = &self.cols;
        let det = m[0][0] * adj[0][0] + m[0][1] * adj[1][0] + m[0][2] * adj[2][0] + m[0][3] * adj[3][0];
        if det == 0.0 || !det.is_finite() {
            return None;
        }

        let inv_det = 1.0 / det;
        let mut out = adj;
        for col in out.iter_mut() {
            for v in col.iter_mut() {
                *v *= inv_det;
            }
        }
        Some(Self { cols: out })
    }

    // Cofactor expansion over the flat column-major array.
    fn adjugate(&self) -> [[f32; 4]; 4] {
        let m: [f32; 16] = bytemuck::cast(self.cols);
        let mut inv = [0.0f32; 16];

        inv[0] = m[5] * m[10] * m[15] - m[5] * m[11] * m[14] - m[9] * m[6] * m[15]
            + m[9] * m[7] * m[14] + m[13] * m[6] * m[11] - m[13] * m[7] * m[10];
        inv[4] = -m[4] * m[10] * m[15] + m[4] * m[11] * m[14] + m[8] * m[6] * m[15]
            - m[8] * m[7] * m[14] - m[12] * m[6] * m[11] + m[12] * m[7] * m[10];
        inv[8] = m[4] * m[9] * m[15] - m[4] * m[11] * m[13] - m[8] * m[5] * m[15]
            + m[8] * m[7] * m[13] + m[12] * m[5] * m[11] - m[12] * m[7] * m[9];
        inv[12] = -m[4] * m[9] * m[14] + m[4] * m[10] * m[13] + m[8] * m[5] * m[14]
            - m[8] * m[6] * m[13] - m[12] * m[5] * m[10] + m[12] * m[6] * m[9];
        inv[1] = -m[1] * m[10] * m[15] + m[1] * m[11] * m[14] + m[9] * m[2] * m[15]
            - m[9] * m[3] * m[14] - m[13] * m[2] * m[11] + m[13] * m[3] * m[10];
        inv[5] = m[0] * m[10] * m[15] - m[0] * m[11] * m[14] - m[8] * m[2] * m[15]
            + m[8] * m[3] * m[14] + m[12] * m[2] * m[11] - m[12] * m[3] * m[10];
        inv[9] = -m[0] * m[9] * m[15] + m[0] * m[11] * m[13] + m[8] * m[1] * m[15]
            - m[8] * m[3] * m[13] - m[12] * m[1] * m[11] + m[12] * m[3] * m[9];
        inv[13] = m[0] * m[9] * m[14] - m[0] * m[10] * m[13] - m[8] * m[1] * m[14]
            + m[8] * m[2] * m[13] + m[12] * m[1] * m[10] - m[12] * m[2] * m[9];
        inv[2] = m[1] * m[6] * m[15] - m[1] * m[7] * m[14] - m[5] * m[2] * m[15]
            + m[5] * m[3] * m[14] + m[13] * m[2] * m[7] - m[13] * m[3] * m[6];
        inv[6] = -m[0] * m[6] * m[15] + m[0] * m[7] * m[14] + m[4] * m[2] * m[15]
            - m[4] * m[3] * m[14] - m[12] * m[2] * m[7] + m[12] * m[3] * m[6];
        inv[10] = m[0] * m[5] * m[15] - m[0] * m[7] * m[13] - m[4] * m[1] * m[15]
            + m[4] * m[3] * m[13] + m[12] * m[1] * m[7] - m[12] * m[3] * m[5];
        inv[14] = -m[0] * m[5] * m[14] + m[0] * m[6] * m[13] + m[4] * m[1] * m[14]
            - m[4] * m[2] * m[13] - m[12] * m[1] * m[6] + m[12] * m[2] * m[5];
        inv[3] = -m[1] * m[6] * m[11] + m[1] * m[7] * m[10] + m[5] * m[2] * m[11]
            - m[5] * m[3] * m[10] - m[9] * m[2] * m[7] + m[9] * m[3] * m[6];
        inv[7] = m[0] * m[6] * m[11] - m[0] * m[7] * m[10] - m[4] * m[2] * m[11]
            + m[4] * m[3] * m[10] + m[8] * m[2] * m[7] - m[8] * m[3] * m[6];
        inv[11] = -m[0] * m[5] * m[11] + m[0] * m[7] * m[9] + m[4] * m[1] * m[11]
            - m[4] * m[3] * m[9] - m[8] * m[1] * m[7] + m[8] * m[3] * m[5];
        inv[15] = m[0] * m[5] * m[10] - m[0] * m[6] * m[9] - m[4] * m[1] * m[10]
            + m[4] * m[2] * m[9] + m[8] * m[1] * m[6] - m[8] * m[2] * m[5];

        bytemuck::cast(inv)
    }
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Mat4 {
    type Output = Mat4;

    fn mul(self, rhs: Mat4) -> Mat4 {
        let mut out = [[0.0; 4]; 4];
        for (c, col) in out.iter_mut().enumerate() {
            for (r, v) in col.iter_mut().enumerate() {
                *v = (0..4).map(|k| self.cols[k][r] * rhs.cols[c][k]).sum();
            }
        }
        Mat4 { cols: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_mat_eq(a: &Mat4, b: &Mat4) {
        for c in 0..4 {
            for r in 0..4 {
                assert_relative_eq!(a.cols[c][r], b.cols[c][r], epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn translation_moves_points() {
        let m = Mat4::translation(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(m.transform_point(Vec3::ZERO), [1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn scale_then_translate_composes_right_to_left() {
        let m = Mat4::scaling(Vec3::splat(2.0)) * Mat4::translation(Vec3::new(-1.0, 0.0, 0.0));
        // Translate first: (1,0,0) -> (0,0,0), then scale.
        assert_eq!(m.transform_point(Vec3::new(1.0, 1.0, 0.0)), [0.0, 2.0, 0.0, 1.0]);
    }

    #[test]
    fn inverse_of_affine_round_trips() {
        let m = Mat4::scaling(Vec3::new(2.0, 3.0, 4.0)) * Mat4::translation(Vec3::new(5.0, -1.0, 0.5));
        let inv = m.inverse().unwrap();
        assert_mat_eq(&(m * inv), &Mat4::IDENTITY);
        assert_mat_eq(&(inv * m), &Mat4::IDENTITY);
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        let m = Mat4::scaling(Vec3::new(1.0, 0.0, 1.0));
        assert!(m.inverse().is_none());
        assert_eq!(m.determinant(), 0.0);
    }

    #[test]
    fn look_at_puts_target_on_positive_z() {
        let view = Mat4::look_at_lh(Vec3::new(0.0, 0.0, -5.0), Vec3::ZERO, Vec3::Y);
        let p = view.transform_point(Vec3::ZERO);
        assert_relative_eq!(p[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(p[1], 0.0, epsilon = 1e-6);
        assert_relative_eq!(p[2], 5.0, epsilon = 1e-6);
    }

    #[test]
    fn perspective_maps_near_and_far_to_unit_depth() {
        let proj = Mat4::perspective_fov_lh(0.25 * std::f32::consts::PI, 16.0 / 9.0, 0.1, 1000.0);

        let near = proj.transform_point(Vec3::new(0.0, 0.0, 0.1));
        assert_relative_eq!(near[2] / near[3], 0.0, epsilon = 1e-5);

        let far = proj.transform_point(Vec3::new(0.0, 0.0, 1000.0));
        assert_relative_eq!(far[2] / far[3], 1.0, epsilon = 1e-5);
    }
}
