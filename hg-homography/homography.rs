use nalgebra::{Matrix3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Points whose projective weight falls below this are treated as at infinity.
const W_EPS: f64 = 1e-12;

/// Smallest-to-largest singular value ratio below which a map is rank-deficient.
pub const SINGULAR_EPS: f64 = 1e-12;

/// Projective map from object-image to scene-image coordinates.
///
/// Defined up to scale; constructors keep whatever scale they are given and
/// [`Homography::normalized`] brings it to unit Frobenius norm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography(Matrix3<f64>);

impl Homography {
    pub fn identity() -> Self {
        Self(Matrix3::identity())
    }

    pub fn from_matrix(m: Matrix3<f64>) -> Self {
        Self(m)
    }

    #[rustfmt::skip]
    pub fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        Self(Matrix3::new(
            rows[0][0], rows[0][1], rows[0][2],
            rows[1][0], rows[1][1], rows[1][2],
            rows[2][0], rows[2][1], rows[2][2],
        ))
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    pub fn to_rows(&self) -> [[f64; 3]; 3] {
        let m = &self.0;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }

    /// Map `p` through the homography; `None` when it lands at infinity.
    pub fn project(&self, p: [f64; 2]) -> Option<[f64; 2]> {
        let q = self.0 * Vector3::new(p[0], p[1], 1.0);
        if q[2].abs() < W_EPS || !q[2].is_finite() {
            return None;
        }
        Some([q[0] / q[2], q[1] / q[2]])
    }

    /// Euclidean distance between `project(src)` and `dst`; infinite when unprojectable.
    pub fn reprojection_error(&self, src: [f64; 2], dst: [f64; 2]) -> f64 {
        match self.project(src) {
            Some(p) => ((p[0] - dst[0]).powi(2) + (p[1] - dst[1]).powi(2)).sqrt(),
            None => f64::INFINITY,
        }
    }

    pub fn determinant(&self) -> f64 {
        self.0.determinant()
    }

    /// Same map scaled to unit Frobenius norm with a non-negative `h33`.
    pub fn normalized(&self) -> Self {
        let norm = self.0.norm();
        if norm == 0.0 || !norm.is_finite() {
            return *self;
        }
        let sign = if self.0[(2, 2)] < 0.0 { -1.0 } else { 1.0 };
        Self(self.0 * (sign / norm))
    }

    /// Same map scaled so `h33 == 1`, when that entry is not vanishing.
    pub fn with_unit_h33(&self) -> Self {
        let s = self.0[(2, 2)];
        if s.abs() < W_EPS {
            self.normalized()
        } else {
            Self(self.0 / s)
        }
    }

    /// Ratio of the smallest to the largest singular value; 0 for a zero or
    /// non-finite matrix.
    pub fn condition_ratio(&self) -> f64 {
        if self.0.iter().any(|v| !v.is_finite()) {
            return 0.0;
        }
        let sv = self.0.singular_values();
        let max = sv.max();
        if max > 0.0 {
            sv.min() / max
        } else {
            0.0
        }
    }

    /// Rank-deficient (or non-finite) up to [`SINGULAR_EPS`] on the singular value ratio.
    ///
    /// The ratio still depends on the pixel frame: a far translation inflates the
    /// largest singular value. Use [`Homography::conditioned`] to test a map in the
    /// normalized frame of the data it was fitted to.
    pub fn is_singular(&self) -> bool {
        self.condition_ratio() < SINGULAR_EPS
    }

    /// The same map expressed between conditioned frames, `T_dst · H · T_src⁻¹`.
    ///
    /// `t_src` / `t_dst` are the similarities from [`crate::solve::normalizing_transform`].
    pub fn conditioned(&self, t_src: &Matrix3<f64>, t_dst: &Matrix3<f64>) -> Option<Self> {
        let t_src_inv = t_src.try_inverse()?;
        Some(Self(t_dst * self.0 * t_src_inv))
    }

    pub fn inverse(&self) -> Option<Self> {
        self.0.try_inverse().map(Self)
    }

    /// Largest entry-wise difference relative to the largest entry, after both
    /// maps are brought to the same scale and sign.
    pub fn relative_difference(&self, other: &Homography) -> f64 {
        let a = self.normalized().0;
        let b = other.normalized().0;
        let scale = b.amax().max(f64::MIN_POSITIVE);
        (a - b).amax() / scale
    }
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<Matrix3<f64>> for Homography {
    fn from(m: Matrix3<f64>) -> Self {
        Self(m)
    }
}

#[cfg(feature = "serde")]
impl Serialize for Homography {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_rows().serialize(serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for Homography {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let rows = <[[f64; 3]; 3]>::deserialize(deserializer)?;
        Ok(Self::from_rows(rows))
    }
}

/// Corners of a `width` x `height` image in the order
/// top-left, top-right, bottom-right, bottom-left.
pub fn image_corners(width: f64, height: f64) -> [[f64; 2]; 4] {
    [[0.0, 0.0], [width, 0.0], [width, height], [0.0, height]]
}

/// Project a quadrilateral, keeping its vertex order.
pub fn project_quad(h: &Homography, quad: &[[f64; 2]; 4]) -> Option<[[f64; 2]; 4]> {
    let mut out = [[0.0; 2]; 4];
    for (dst, src) in out.iter_mut().zip(quad) {
        *dst = h.project(*src)?;
    }
    Some(out)
}
