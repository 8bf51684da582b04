use std::ops::Index;

use crate::error::{Chip8Error, Result};

/// Framebuffer is the pixel store the interpreter draws into. Alternative
/// implementations (e.g. ones that track dirty regions for a frontend) only
/// need to provide pixel storage; sprite blitting comes for free.
pub trait Framebuffer {
    /// build a blank framebuffer; both dimensions must be positive
    fn create(width: usize, height: usize, wrap: bool) -> Result<Self>
    where
        Self: Sized;

    fn width(&self) -> usize;

    fn height(&self) -> usize;

    /// whether out-of-range coordinates wrap around rather than being dropped
    fn wrap(&self) -> bool;

    /// turn every pixel off
    fn clear_screen(&mut self);

    /// current state of a pixel; off for anything outside the screen
    fn pixel(&self, x: usize, y: usize) -> bool;

    /// XOR a pixel with `value`, returning true if it was switched off
    fn xor_pixel(&mut self, x: usize, y: usize, value: bool) -> bool;

    fn size(&self) -> (usize, usize) {
        (self.width(), self.height())
    }

    /// map coordinates onto the screen, or None if they fall off a
    /// non-wrapping one
    fn normalize(&self, x: usize, y: usize) -> Option<(usize, usize)> {
        if self.wrap() {
            Some((x % self.width(), y % self.height()))
        } else if x < self.width() && y < self.height() {
            Some((x, y))
        } else {
            None
        }
    }

    /// XOR `num_bytes` rows of 8-pixel sprite data, read from `source` from
    /// `offset` onward, with the top left corner at (x0, y0). Returns the
    /// collision flag: true if any pixel was switched off.
    fn draw_sprite(
        &mut self,
        x0: usize,
        y0: usize,
        source: &[u8],
        num_bytes: usize,
        offset: usize,
    ) -> Result<bool> {
        let rows = source
            .get(offset..offset.saturating_add(num_bytes))
            .ok_or(Chip8Error::MemoryBoundsViolation {
                address: offset,
                len: num_bytes,
                size: source.len(),
            })?;

        let mut switched_off = false;
        for (r, row) in rows.iter().enumerate() {
            for col in 0..8 {
                let bit = row & (0x80 >> col) != 0;
                switched_off |= self.xor_pixel(x0 + col, y0 + r, bit);
            }
        }
        Ok(switched_off)
    }

    /// draw every byte of `sprite` as one row
    fn blit(&mut self, x0: usize, y0: usize, sprite: &[u8]) -> bool {
        // the whole of `sprite` is always in range
        self.draw_sprite(x0, y0, sprite, sprite.len(), 0).unwrap_or(false)
    }
}

/// row-major boolean pixel grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRam {
    width: usize,
    height: usize,
    wrap: bool,
    pixels: Vec<bool>,
}

impl VideoRam {
    pub fn new(width: usize, height: usize, wrap: bool) -> Result<VideoRam> {
        if width == 0 || height == 0 {
            return Err(Chip8Error::InvalidDimensions { width, height });
        }
        Ok(VideoRam {
            width,
            height,
            wrap,
            pixels: vec![false; width * height],
        })
    }

    /// raw pixel storage, row-major
    pub fn pixels(&self) -> &[bool] {
        &self.pixels
    }
}

impl Framebuffer for VideoRam {
    fn create(width: usize, height: usize, wrap: bool) -> Result<Self> {
        VideoRam::new(width, height, wrap)
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn wrap(&self) -> bool {
        self.wrap
    }

    fn clear_screen(&mut self) {
        self.pixels.iter_mut().for_each(|p| *p = false);
    }

    fn pixel(&self, x: usize, y: usize) -> bool {
        self[(x, y)]
    }

    fn xor_pixel(&mut self, x: usize, y: usize, value: bool) -> bool {
        if !value {
            return false;
        }
        match self.normalize(x, y) {
            Some((x, y)) => {
                let p = &mut self.pixels[y * self.width + x];
                *p = !*p;
                !*p
            }
            None => false,
        }
    }
}

impl Index<(usize, usize)> for VideoRam {
    type Output = bool;

    fn index(&self, (x, y): (usize, usize)) -> &bool {
        match self.normalize(x, y) {
            Some((x, y)) => &self.pixels[y * self.width + x],
            None => &false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_coordinates(v: &VideoRam) -> impl Iterator<Item = (usize, usize)> {
        let (w, h) = v.size();
        (0..w).flat_map(move |x| (0..h).map(move |y| (x, y)))
    }

    fn fill(v: &mut VideoRam) {
        v.pixels.iter_mut().for_each(|p| *p = true);
    }

    #[test]
    fn test_new_sets_values() -> Result<()> {
        for (w, h, wrap) in [(1, 1, true), (3, 20, false), (20, 3, true)] {
            let v = VideoRam::new(w, h, wrap)?;
            assert_eq!(v.size(), (w, h));
            assert_eq!(v.wrap(), wrap);
        }
        Ok(())
    }

    #[test]
    fn test_new_rejects_zero_dimensions() {
        for (w, h) in [(0, 1), (1, 0), (0, 0)] {
            assert!(matches!(
                VideoRam::new(w, h, false),
                Err(Chip8Error::InvalidDimensions { .. })
            ));
        }
    }

    #[test]
    fn test_starts_blank() -> Result<()> {
        let v = VideoRam::new(400, 400, false)?;
        assert!(all_coordinates(&v).all(|(x, y)| !v[(x, y)]));
        Ok(())
    }

    #[test]
    fn test_xor_pixel_toggles_and_signals_switch_off() -> Result<()> {
        let mut v = VideoRam::new(3, 5, false)?;
        assert!(!v.xor_pixel(2, 4, true));
        assert!(v.pixels[14]);
        assert!(v.xor_pixel(2, 4, true));
        assert!(!v.pixels[14]);
        Ok(())
    }

    #[test]
    fn test_xor_pixel_false_is_noop() -> Result<()> {
        let mut v = VideoRam::new(2, 2, false)?;
        fill(&mut v);
        assert!(!v.xor_pixel(1, 1, false));
        assert!(v[(1, 1)]);
        Ok(())
    }

    #[test]
    fn test_wrapping_when_set() -> Result<()> {
        let mut v = VideoRam::new(2, 2, true)?;
        assert!(!v.xor_pixel(2, 2, true));
        assert!(v[(0, 0)]);
        assert!(!v[(1, 0)]);
        assert!(!v[(0, 1)]);
        assert!(!v[(1, 1)]);
        Ok(())
    }

    #[test]
    fn test_no_wrapping_when_unset() -> Result<()> {
        let mut v = VideoRam::new(1, 1, false)?;
        assert!(!v.xor_pixel(1, 1, true));
        assert!(!v[(0, 0)]);
        assert!(!v[(5, 5)]);
        Ok(())
    }

    #[test]
    fn test_clear_turns_off_pixels() -> Result<()> {
        let mut v = VideoRam::new(21, 21, false)?;
        for (i, p) in v.pixels.iter_mut().enumerate() {
            *p = i % 2 == 1;
        }
        v.clear_screen();
        assert!(all_coordinates(&v).all(|(x, y)| !v[(x, y)]));
        Ok(())
    }

    #[test]
    fn test_draw_checkerboard() -> Result<()> {
        let mut v = VideoRam::new(8, 16, false)?;
        let sprite = [0xAA, 0x55].repeat(8);
        assert!(!v.draw_sprite(0, 0, &sprite, sprite.len(), 0)?);
        for (x, y) in all_coordinates(&v) {
            assert_eq!(v[(x, y)], (x + y) % 2 == 0, "pixel {},{}", x, y);
        }
        Ok(())
    }

    #[test]
    fn test_drawing_blank_sprite_changes_nothing() -> Result<()> {
        let mut v = VideoRam::new(8, 8, false)?;
        fill(&mut v);
        assert!(!v.draw_sprite(0, 0, &[0; 8], 8, 0)?);
        assert!(v.pixels.iter().all(|p| *p));
        Ok(())
    }

    #[test]
    fn test_redraw_reports_collision() -> Result<()> {
        let mut v = VideoRam::new(64, 32, false)?;
        assert!(!v.blit(3, 3, &[0x80]));
        assert!(v.blit(3, 3, &[0x80]));
        assert!(!v[(3, 3)]);
        Ok(())
    }

    #[test]
    fn test_offset_works() -> Result<()> {
        let mut v = VideoRam::new(8, 1, false)?;
        v.draw_sprite(0, 0, &[0x00, 0xD0, 0x00], 1, 1)?;
        let lit: Vec<usize> = (0..8).filter(|x| v[(*x, 0)]).collect();
        assert_eq!(lit, vec![0, 1, 3]);
        Ok(())
    }

    #[test]
    fn test_num_bytes_limits_rows() -> Result<()> {
        let mut v = VideoRam::new(8, 3, false)?;
        v.draw_sprite(0, 1, &[0xA0, 0xFF], 1, 0)?;
        assert!(!v[(0, 0)] && !v[(0, 2)]);
        assert!(v[(0, 1)] && !v[(1, 1)] && v[(2, 1)]);
        Ok(())
    }

    #[test]
    fn test_draw_past_source_fails() -> Result<()> {
        let mut v = VideoRam::new(8, 8, false)?;
        assert!(matches!(
            v.draw_sprite(0, 0, &[0xFF; 4], 3, 2),
            Err(Chip8Error::MemoryBoundsViolation { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_sprite_clipped_at_edge_without_wrap() -> Result<()> {
        let mut v = VideoRam::new(64, 32, false)?;
        assert!(!v.blit(60, 31, &[0xFF, 0xFF]));
        assert_eq!((60..64).filter(|x| v[(*x, 31)]).count(), 4);
        assert!(!v[(0, 31)] && !v[(0, 0)]);
        Ok(())
    }

    #[test]
    fn test_sprite_wraps_at_edge() -> Result<()> {
        let mut v = VideoRam::new(64, 32, true)?;
        v.blit(60, 31, &[0xFF, 0xFF]);
        assert!(v[(0, 31)] && v[(3, 31)] && !v[(4, 31)]);
        assert!(v[(60, 0)] && v[(3, 0)]);
        Ok(())
    }
}
