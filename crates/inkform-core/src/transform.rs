//! 2D affine transformation as a 3x3 homogeneous matrix.

use nalgebra::{Matrix3, Point2};
use serde::{Deserialize, Serialize};

use crate::GeomError;

/// Affine map of the plane: a 2x2 linear block plus a translation, stored as
/// a 3x3 homogeneous matrix with bottom row `(0, 0, 1)`.
///
/// `Transform` is a plain value type; composition and inversion return new
/// values and never mutate their operands.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    m: Matrix3<f64>,
}

impl Transform {
    fn from_affine(row0: [f64; 3], row1: [f64; 3]) -> Self {
        Self {
            m: Matrix3::new(
                row0[0], row0[1], row0[2], //
                row1[0], row1[1], row1[2], //
                0.0, 0.0, 1.0,
            ),
        }
    }

    pub fn identity() -> Self {
        Self::from_affine([1.0, 0.0, 0.0], [0.0, 1.0, 0.0])
    }

    pub fn translation(dx: f64, dy: f64) -> Self {
        Self::from_affine([1.0, 0.0, dx], [0.0, 1.0, dy])
    }

    /// Counterclockwise rotation by `angle` radians.
    pub fn rotation(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_affine([c, -s, 0.0], [s, c, 0.0])
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self::from_affine([sx, 0.0, 0.0], [0.0, sy, 0.0])
    }

    pub fn uniform_scale(s: f64) -> Self {
        Self::scale(s, s)
    }

    /// Shear given by the tangent of each axis angle.
    pub fn shear(x_angle: f64, y_angle: f64) -> Self {
        Self::from_affine([1.0, y_angle.tan(), 0.0], [x_angle.tan(), 1.0, 0.0])
    }

    /// Reflection across the line through the origin at `angle / 2`.
    pub fn mirror(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_affine([c, s, 0.0], [s, -c, 0.0])
    }

    /// Raw homogeneous matrix.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.m
    }

    /// The six affine parameters, row-major: `[a, b, tx, c, d, ty]`.
    pub fn parameters(&self) -> [f64; 6] {
        [
            self.m[(0, 0)],
            self.m[(0, 1)],
            self.m[(0, 2)],
            self.m[(1, 0)],
            self.m[(1, 1)],
            self.m[(1, 2)],
        ]
    }

    pub fn determinant(&self) -> f64 {
        self.m.determinant()
    }

    /// Compose two transforms; **`other` is applied first**.
    ///
    /// `a.compose(b).apply_point(p) == a.apply_point(b.apply_point(p))`,
    /// matching plain matrix multiplication `a.m * b.m`. Every chained
    /// transform in the normalization pipeline relies on this convention.
    pub fn compose(&self, other: &Transform) -> Transform {
        Transform { m: self.m * other.m }
    }

    /// Matrix inverse.
    ///
    /// Fails with [`GeomError::SingularTransform`] for non-invertible maps;
    /// this is a directly-requested operation whose failure the caller must
    /// observe, not a silent fallback.
    pub fn inverse(&self) -> Result<Transform, GeomError> {
        self.m
            .try_inverse()
            .map(|m| Transform { m })
            .ok_or(GeomError::SingularTransform)
    }

    #[inline]
    pub fn apply_point(&self, p: &Point2<f64>) -> Point2<f64> {
        Point2::new(
            self.m[(0, 0)] * p.x + self.m[(0, 1)] * p.y + self.m[(0, 2)],
            self.m[(1, 0)] * p.x + self.m[(1, 1)] * p.y + self.m[(1, 2)],
        )
    }

    /// Apply to a coordinate array, yielding a new array.
    pub fn apply_points(&self, points: &[Point2<f64>]) -> Vec<Point2<f64>> {
        points.iter().map(|p| self.apply_point(p)).collect()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}
