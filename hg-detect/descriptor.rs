use hg_core::{Descriptor, LumaImage};

/// Samples per patch side.
const GRID: usize = 8;

/// Length of every descriptor this backend produces.
pub const DESCRIPTOR_DIM: usize = GRID * GRID;

/// Oriented intensity-patch descriptor.
///
/// Samples an 8x8 grid over the `patch_size` square centered on `(x, y)` and
/// rotated by `angle_deg`, then removes the mean and scales to unit length.
/// A flat patch yields the zero vector.
pub fn describe(img: &LumaImage, x: f32, y: f32, angle_deg: f32, patch_size: usize) -> Descriptor {
    let half = patch_size as f32 / 2.0;
    let step = patch_size as f32 / GRID as f32;
    let (s, c) = angle_deg.to_radians().sin_cos();

    let mut d = Vec::with_capacity(DESCRIPTOR_DIM);
    for gy in 0..GRID {
        let v = (gy as f32 + 0.5) * step - half;
        for gx in 0..GRID {
            let u = (gx as f32 + 0.5) * step - half;
            d.push(img.sample_bilinear(x + c * u - s * v, y + s * u + c * v));
        }
    }

    let mean = d.iter().sum::<f32>() / DESCRIPTOR_DIM as f32;
    d.iter_mut().for_each(|v| *v -= mean);
    let norm = d.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 1e-6 {
        d.iter_mut().for_each(|v| *v /= norm);
    } else {
        d.iter_mut().for_each(|v| *v = 0.0);
    }
    d
}
