//! Homography solvers: the exact 4-point solution used inside RANSAC and the
//! Hartley-normalized DLT used to refit on all inliers.

use nalgebra::{Matrix3, SMatrix, SVector, SymmetricEigen};

/// Relative tolerance of the collinearity test.
const COLLINEAR_EPS: f64 = 1e-6;

/// True when `a`, `b`, `c` lie on one line (coincident points included).
pub fn collinear(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> bool {
    let (ux, uy) = (b[0] - a[0], b[1] - a[1]);
    let (vx, vy) = (c[0] - a[0], c[1] - a[1]);
    let cross = (ux * vy - uy * vx).abs();
    let scale = (ux.hypot(uy) * vx.hypot(vy)).max(1.0);
    cross <= COLLINEAR_EPS * scale
}

/// True when any three of the four points are collinear.
pub fn quad_is_degenerate(pts: &[[f64; 2]; 4]) -> bool {
    const TRIPLES: [(usize, usize, usize); 4] = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
    TRIPLES
        .iter()
        .any(|&(i, j, k)| collinear(pts[i], pts[j], pts[k]))
}

/// Similarity that moves the centroid to the origin and scales the mean
/// distance to sqrt(2). `None` for an empty or fully coincident set.
pub fn normalizing_transform(pts: &[[f64; 2]]) -> Option<Matrix3<f64>> {
    if pts.is_empty() {
        return None;
    }
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p[1]).sum::<f64>() / n;
    let mean_dist = pts
        .iter()
        .map(|p| (p[0] - cx).hypot(p[1] - cy))
        .sum::<f64>()
        / n;
    if !(mean_dist > 1e-12) {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    Some(Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0))
}

#[inline]
fn apply(t: &Matrix3<f64>, p: [f64; 2]) -> [f64; 2] {
    // t is a similarity, so w stays 1
    [t[(0, 0)] * p[0] + t[(0, 2)], t[(1, 1)] * p[1] + t[(1, 2)]]
}

/// Undo the normalizations: `H = T_dst^-1 * H_n * T_src`.
fn denormalize(h_n: &Matrix3<f64>, t_src: &Matrix3<f64>, t_dst: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    let t_dst_inv = t_dst.try_inverse()?;
    let h = t_dst_inv * h_n * t_src;
    if h.iter().all(|v| v.is_finite()) {
        Some(h)
    } else {
        None
    }
}

/// Exact homography through four correspondences, fixing `h33 = 1`.
///
/// Solves the 8x8 linear system on normalized coordinates. Returns `None`
/// when the system is singular.
pub fn solve_four_point(src: &[[f64; 2]; 4], dst: &[[f64; 2]; 4]) -> Option<Matrix3<f64>> {
    let t_src = normalizing_transform(src)?;
    let t_dst = normalizing_transform(dst)?;

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for i in 0..4 {
        let [x, y] = apply(&t_src, src[i]);
        let [u, v] = apply(&t_dst, dst[i]);
        let r = 2 * i;
        a[(r, 0)] = x;
        a[(r, 1)] = y;
        a[(r, 2)] = 1.0;
        a[(r, 6)] = -u * x;
        a[(r, 7)] = -u * y;
        b[r] = u;

        a[(r + 1, 3)] = x;
        a[(r + 1, 4)] = y;
        a[(r + 1, 5)] = 1.0;
        a[(r + 1, 6)] = -v * x;
        a[(r + 1, 7)] = -v * y;
        b[r + 1] = v;
    }

    let lu = a.lu();
    if lu.determinant().abs() < 1e-12 {
        return None;
    }
    let h = lu.solve(&b)?;
    let h_n = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
    denormalize(&h_n, &t_src, &t_dst)
}

/// Least-squares homography from four or more correspondences (normalized DLT).
///
/// The solution is the eigenvector of `AᵀA` with the smallest eigenvalue,
/// with `A` the 2n x 9 constraint matrix of the normalized points.
pub fn fit_dlt(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Option<Matrix3<f64>> {
    if src.len() < 4 || src.len() != dst.len() {
        return None;
    }
    let t_src = normalizing_transform(src)?;
    let t_dst = normalizing_transform(dst)?;

    let mut ata = SMatrix::<f64, 9, 9>::zeros();
    for (s, d) in src.iter().zip(dst) {
        let [x, y] = apply(&t_src, *s);
        let [u, v] = apply(&t_dst, *d);
        let r1 = SVector::<f64, 9>::from_column_slice(&[x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, -u]);
        let r2 = SVector::<f64, 9>::from_column_slice(&[0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, -v]);
        ata += r1 * r1.transpose();
        ata += r2 * r2.transpose();
    }

    let eig = SymmetricEigen::new(ata);
    let (min_idx, _) = eig
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))?;
    let h = eig.eigenvectors.column(min_idx);
    let h_n = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);
    denormalize(&h_n, &t_src, &t_dst)
}
