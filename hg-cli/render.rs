use std::collections::HashSet;

use hg_core::{Correspondence, KeypointSet, LumaImage};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};

const INLIER: Rgb<u8> = Rgb([0, 200, 255]);
const OUTLIER: Rgb<u8> = Rgb([255, 64, 64]);
const QUAD: Rgb<u8> = Rgb([0, 255, 0]);
const QUAD_WIDTH: f32 = 4.0;

/// What gets drawn on the side-by-side match image.
pub struct MatchDrawing<'a> {
    pub object: &'a LumaImage,
    pub scene: &'a LumaImage,
    pub object_keypoints: &'a KeypointSet,
    pub scene_keypoints: &'a KeypointSet,
    pub matches: &'a [Correspondence],
    pub inliers: &'a [Correspondence],
    /// Located object quad in scene coordinates
    pub quad: Option<[[f64; 2]; 4]>,
}

/// Object on the left, scene on the right, one line per match and the
/// located quad drawn over the scene.
pub fn render_matches(d: &MatchDrawing<'_>) -> RgbImage {
    let (ow, oh) = d.object.dimensions();
    let (sw, sh) = d.scene.dimensions();
    let mut canvas = RgbImage::new((ow + sw) as u32, oh.max(sh) as u32);
    blit(&mut canvas, d.object, 0);
    blit(&mut canvas, d.scene, ow);

    let offset = ow as f32;
    let inlier_pairs: HashSet<(usize, usize)> = d
        .inliers
        .iter()
        .map(|c| (c.object_index, c.scene_index))
        .collect();

    for m in d.matches {
        let (Ok(a), Ok(b)) = (
            d.object_keypoints.keypoint(m.object_index),
            d.scene_keypoints.keypoint(m.scene_index),
        ) else {
            continue;
        };
        let color = if inlier_pairs.contains(&(m.object_index, m.scene_index)) {
            INLIER
        } else {
            OUTLIER
        };
        let start = (a.x, a.y);
        let end = (b.x + offset, b.y);
        draw_line_segment_mut(&mut canvas, start, end, color);
        draw_hollow_circle_mut(&mut canvas, (start.0 as i32, start.1 as i32), 3, color);
        draw_hollow_circle_mut(&mut canvas, (end.0 as i32, end.1 as i32), 3, color);
    }

    if let Some(quad) = d.quad {
        for i in 0..4 {
            let p = quad[i];
            let q = quad[(i + 1) % 4];
            draw_thick_line(
                &mut canvas,
                (p[0] as f32 + offset, p[1] as f32),
                (q[0] as f32 + offset, q[1] as f32),
                QUAD_WIDTH,
                QUAD,
            );
        }
    }
    canvas
}

fn blit(canvas: &mut RgbImage, img: &LumaImage, x0: usize) {
    let (w, h) = img.dimensions();
    for y in 0..h {
        for x in 0..w {
            let v = img.get(x, y);
            canvas.put_pixel((x0 + x) as u32, y as u32, Rgb([v, v, v]));
        }
    }
}

/// Parallel one-pixel lines spread across `width`.
fn draw_thick_line(canvas: &mut RgbImage, a: (f32, f32), b: (f32, f32), width: f32, color: Rgb<u8>) {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len = (dx * dx + dy * dy).sqrt();
    if !len.is_finite() || len < f32::EPSILON {
        return;
    }
    let (nx, ny) = (-dy / len, dx / len);
    let strands = width.ceil().max(1.0) as usize;
    for k in 0..strands {
        let t = k as f32 - (strands as f32 - 1.0) / 2.0;
        draw_line_segment_mut(
            canvas,
            (a.0 + nx * t, a.1 + ny * t),
            (b.0 + nx * t, b.1 + ny * t),
            color,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hg_core::Keypoint;

    #[test]
    fn test_layout_and_quad() {
        let object = LumaImage::filled(20, 10, 10).unwrap();
        let scene = LumaImage::filled(40, 30, 100).unwrap();
        let kps = KeypointSet::new(vec![Keypoint::at(5.0, 5.0)], vec![vec![0.0]]).unwrap();
        let scene_kps = KeypointSet::new(vec![Keypoint::at(25.0, 20.0)], vec![vec![0.0]]).unwrap();
        let m = [Correspondence::new(0, 0, 0.0)];

        let img = render_matches(&MatchDrawing {
            object: &object,
            scene: &scene,
            object_keypoints: &kps,
            scene_keypoints: &scene_kps,
            matches: &m,
            inliers: &m,
            quad: Some([[2.0, 2.0], [30.0, 2.0], [30.0, 25.0], [2.0, 25.0]]),
        });

        assert_eq!(img.dimensions(), (60, 30));
        // untouched pixels from each half
        assert_eq!(*img.get_pixel(19, 0), Rgb([10, 10, 10]));
        assert_eq!(*img.get_pixel(59, 29), Rgb([100, 100, 100]));
        // object area below the object image stays black
        assert_eq!(*img.get_pixel(0, 29), Rgb([0, 0, 0]));
        // quad edge on the scene side
        assert_eq!(*img.get_pixel(20 + 15, 2), QUAD);
        // match line endpoint
        assert_eq!(*img.get_pixel(5, 5), INLIER);
    }
}
