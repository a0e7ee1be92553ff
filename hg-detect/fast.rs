use std::collections::HashMap;

use hg_core::LumaImage;
use rayon::prelude::*;

/// Bresenham circle of radius 3 around the candidate pixel.
#[rustfmt::skip]
const RING: [(i32, i32); 16] = [
    (-3, 0), (-3, 1), (-2, 2), (-1, 3),
    (0, 3), (1, 3), (2, 2), (3, 1),
    (3, 0), (3, -1), (2, -2), (1, -3),
    (0, -3), (-1, -3), (-2, -2), (-3, -1),
];

/// Contiguous ring pixels the segment test requires.
pub const ARC_LENGTH: usize = 12;

/// Corner at integer coordinates of one pyramid level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corner {
    pub x: usize,
    pub y: usize,
    /// Mean absolute contrast of the brighter (or darker) ring pixels
    pub response: f32,
}

/// True when `mask` has a circular run of at least `len` set bits.
pub fn has_arc(mask: u16, len: usize) -> bool {
    if len == 0 || len > 16 {
        return false;
    }
    let mut run = mask;
    for i in 1..len {
        run &= mask.rotate_left(i as u32);
        if run == 0 {
            return false;
        }
    }
    run != 0
}

/// FAST segment test at `(x, y)`. Returns the corner response when passed.
///
/// The caller keeps `(x, y)` at least 3 pixels away from every border.
pub fn segment_test(img: &LumaImage, x: usize, y: usize, threshold: f32) -> Option<f32> {
    let p = img.get(x, y) as f32;
    let mut bright = 0u16;
    let mut dark = 0u16;
    let mut bright_sum = 0.0f32;
    let mut dark_sum = 0.0f32;

    for (i, &(dx, dy)) in RING.iter().enumerate() {
        let q = img.get((x as i32 + dx) as usize, (y as i32 + dy) as usize) as f32;
        if q >= p + threshold {
            bright |= 1 << i;
            bright_sum += q - p;
        } else if q <= p - threshold {
            dark |= 1 << i;
            dark_sum += p - q;
        }
    }

    if has_arc(bright, ARC_LENGTH) {
        Some(bright_sum / bright.count_ones() as f32)
    } else if has_arc(dark, ARC_LENGTH) {
        Some(dark_sum / dark.count_ones() as f32)
    } else {
        None
    }
}

/// All segment-test corners at least `border` pixels inside the image, in (y, x) order.
pub fn detect_corners(img: &LumaImage, threshold: f32, border: usize) -> Vec<Corner> {
    let border = border.max(3);
    let (w, h) = img.dimensions();
    if w <= 2 * border || h <= 2 * border {
        return Vec::new();
    }

    (border..h - border)
        .into_par_iter()
        .flat_map_iter(|y| {
            (border..w - border).filter_map(move |x| {
                segment_test(img, x, y, threshold).map(|response| Corner { x, y, response })
            })
        })
        .collect()
}

/// Greedy non-maximum suppression: strongest first, dropping any corner closer
/// than `min_distance` to one already kept. Output is in (y, x) order.
pub fn suppress(corners: Vec<Corner>, min_distance: f32) -> Vec<Corner> {
    if min_distance <= 0.0 || corners.len() < 2 {
        return corners;
    }

    let mut sorted = corners;
    sorted.sort_by(|a, b| {
        b.response
            .total_cmp(&a.response)
            .then(a.y.cmp(&b.y))
            .then(a.x.cmp(&b.x))
    });

    let cell_of = |c: &Corner| {
        (
            (c.x as f32 / min_distance).floor() as i64,
            (c.y as f32 / min_distance).floor() as i64,
        )
    };
    let min_sq = min_distance * min_distance;
    let mut grid: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    let mut kept: Vec<Corner> = Vec::new();

    for c in sorted {
        let (cx, cy) = cell_of(&c);
        let crowded = (cx - 1..=cx + 1).any(|gx| {
            (cy - 1..=cy + 1).any(|gy| {
                grid.get(&(gx, gy)).map_or(false, |ids| {
                    ids.iter().any(|&k| {
                        let dx = kept[k].x as f32 - c.x as f32;
                        let dy = kept[k].y as f32 - c.y as f32;
                        dx * dx + dy * dy < min_sq
                    })
                })
            })
        });
        if !crowded {
            grid.entry((cx, cy)).or_default().push(kept.len());
            kept.push(c);
        }
    }

    kept.sort_by(|a, b| a.y.cmp(&b.y).then(a.x.cmp(&b.x)));
    kept
}

/// Intensity-centroid orientation over the square patch of radius `half`, in
/// degrees within `[0, 360)`.
pub fn intensity_centroid_angle(img: &LumaImage, x: usize, y: usize, half: usize) -> f32 {
    let half = half as i64;
    let (cx, cy) = (x as i64, y as i64);
    let mut m10 = 0i64;
    let mut m01 = 0i64;

    for dy in -half..=half {
        for dx in -half..=half {
            let val = img.get_clamped(cx + dx, cy + dy) as i64;
            m10 += dx * val;
            m01 += dy * val;
        }
    }

    if m10 == 0 && m01 == 0 {
        return 0.0;
    }
    let deg = (m01 as f32).atan2(m10 as f32).to_degrees();
    let deg = if deg < 0.0 { deg + 360.0 } else { deg };
    if deg >= 360.0 {
        0.0
    } else {
        deg
    }
}
