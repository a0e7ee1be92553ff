use crate::error::{CoreError, CoreResult};

/// Row-major 8-bit grayscale image with its dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct LumaImage {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl LumaImage {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> CoreResult<Self> {
        if width == 0 || height == 0 || data.len() != width * height {
            return Err(CoreError::InvalidImage {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    /// Uniform image, handy for fixtures.
    pub fn filled(width: usize, height: usize, value: u8) -> CoreResult<Self> {
        Self::new(width, height, vec![value; width * height])
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Debug builds panic for any `(x, y)` outside the image. Release builds
    /// only catch reads past the end of the buffer, so an `x` beyond the row
    /// reads the next row. Use [`LumaImage::get_clamped`] for coordinates that
    /// are not known to be inside.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        debug_assert!(
            x < self.width && y < self.height,
            "pixel ({}, {}) outside {}x{} image",
            x,
            y,
            self.width,
            self.height
        );
        self.data[y * self.width + x]
    }

    /// Clamped-border lookup.
    #[inline]
    pub fn get_clamped(&self, x: i64, y: i64) -> u8 {
        let xx = x.clamp(0, self.width as i64 - 1) as usize;
        let yy = y.clamp(0, self.height as i64 - 1) as usize;
        self.data[yy * self.width + xx]
    }

    /// Bilinear sample at fractional coordinates, clamped at the border.
    pub fn sample_bilinear(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let p11 = self.get_clamped(x0, y0) as f32;
        let p12 = self.get_clamped(x0 + 1, y0) as f32;
        let p21 = self.get_clamped(x0, y0 + 1) as f32;
        let p22 = self.get_clamped(x0 + 1, y0 + 1) as f32;

        let top = p11 * (1.0 - fx) + p12 * fx;
        let bottom = p21 * (1.0 - fx) + p22 * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// Half-resolution copy using 2x2 box averaging.
    pub fn downsample_half(&self) -> Option<Self> {
        let w = self.width / 2;
        let h = self.height / 2;
        if w == 0 || h == 0 {
            return None;
        }
        let mut data = vec![0u8; w * h];
        for y in 0..h {
            for x in 0..w {
                let sum = self.get(2 * x, 2 * y) as u32
                    + self.get(2 * x + 1, 2 * y) as u32
                    + self.get(2 * x, 2 * y + 1) as u32
                    + self.get(2 * x + 1, 2 * y + 1) as u32;
                data[y * w + x] = ((sum + 2) / 4) as u8;
            }
        }
        Some(Self {
            width: w,
            height: h,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_buffer() {
        assert!(matches!(
            LumaImage::new(4, 4, vec![0; 15]),
            Err(CoreError::InvalidImage { width: 4, height: 4, len: 15 })
        ));
        assert!(LumaImage::new(0, 4, Vec::new()).is_err());
    }

    #[test]
    fn test_bilinear_midpoint() {
        let img = LumaImage::new(2, 1, vec![0, 100]).unwrap();
        assert!((img.sample_bilinear(0.5, 0.0) - 50.0).abs() < 1e-4);
        // clamped past the right border
        assert!((img.sample_bilinear(3.0, 0.0) - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_downsample_half() {
        let img = LumaImage::new(4, 2, vec![0, 4, 8, 8, 0, 4, 8, 8]).unwrap();
        let half = img.downsample_half().unwrap();
        assert_eq!(half.dimensions(), (2, 1));
        assert_eq!(half.as_raw(), &[2, 8]);
        assert!(LumaImage::filled(1, 1, 0).unwrap().downsample_half().is_none());
    }

    #[test]
    #[should_panic]
    fn test_get_past_last_row_panics() {
        let img = LumaImage::filled(4, 3, 0).unwrap();
        let _ = img.get(0, 3);
    }

    #[test]
    fn test_clamped_access_at_borders() {
        let img = LumaImage::new(2, 2, vec![1, 2, 3, 4]).unwrap();
        assert_eq!(img.get_clamped(-5, -5), 1);
        assert_eq!(img.get_clamped(9, 0), 2);
        assert_eq!(img.get_clamped(1, 9), 4);
    }
}
