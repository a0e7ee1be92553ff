use hg_core::LumaImage;

/// One level of a factor-2 image pyramid.
#[derive(Debug, Clone)]
pub struct Octave {
    pub level: usize,
    /// Size of one level pixel in base-image pixels
    pub scale: f32,
    pub image: LumaImage,
}

impl Octave {
    /// Map a level pixel center to base-image coordinates.
    #[inline]
    pub fn to_base(&self, x: f32, y: f32) -> (f32, f32) {
        ((x + 0.5) * self.scale - 0.5, (y + 0.5) * self.scale - 0.5)
    }
}

/// Build up to `n_octaves` levels, stopping early once a level would be
/// narrower than `min_size` pixels in either direction.
pub fn build_pyramid(base: &LumaImage, n_octaves: usize, min_size: usize) -> Vec<Octave> {
    let mut levels = Vec::with_capacity(n_octaves);
    if n_octaves == 0 || base.width() < min_size || base.height() < min_size {
        return levels;
    }
    levels.push(Octave {
        level: 0,
        scale: 1.0,
        image: base.clone(),
    });

    for level in 1..n_octaves {
        let next = match levels.last().and_then(|prev| prev.image.downsample_half()) {
            Some(img) if img.width() >= min_size && img.height() >= min_size => img,
            _ => break,
        };
        levels.push(Octave {
            level,
            scale: (1u32 << level) as f32,
            image: next,
        });
    }
    levels
}
