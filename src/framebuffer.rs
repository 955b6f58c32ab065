use crate::{Float, Spectrum};
use parking_lot::Mutex;

pub const WRITER_CAPACITY: usize = 4096;
pub const WRITER_SOFT_CAPACITY: usize = 3840;

/// Shared accumulation target. Every radiance contribution from every
/// thread and iteration is summed here; the image only becomes meaningful
/// after [`Framebuffer::normalize`] divides by the total iteration count.
pub struct Framebuffer {
    width: u32,
    height: u32,
    pixels: Mutex<Vec<Spectrum>>,
}

impl Framebuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: Mutex::new(vec![Spectrum::black(); (width * height) as usize]),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn writer(&self) -> FramebufferWriter<'_> {
        FramebufferWriter {
            target: self,
            samples: Vec::with_capacity(WRITER_CAPACITY),
        }
    }

    pub fn normalize(&mut self, scale: Float) {
        for pixel in self.pixels.get_mut().iter_mut() {
            *pixel *= scale;
        }
    }

    pub fn pixels(&self) -> Vec<Spectrum> {
        self.pixels.lock().clone()
    }

    pub fn to_rgb(&self) -> Vec<[Float; 3]> {
        self.pixels.lock().iter().map(|p| p.to_rgb()).collect()
    }
}

/// Thread-local batching front end for a [`Framebuffer`]. Contributions
/// buffer locally; at the soft capacity a flush is attempted only if the
/// shared lock is free, at the hard capacity it blocks. Callers must
/// [`FramebufferWriter::flush`] before dropping the writer.
pub struct FramebufferWriter<'a> {
    target: &'a Framebuffer,
    samples: Vec<(u32, Spectrum)>,
}

impl FramebufferWriter<'_> {
    pub fn write(&mut self, index: u32, value: Spectrum) {
        debug_assert!(!value.has_nans(), "NaN contribution at pixel {}", index);
        self.samples.push((index, value.finite_or_zero()));

        if self.samples.len() >= WRITER_CAPACITY {
            self.flush();
        } else if self.samples.len() >= WRITER_SOFT_CAPACITY {
            if let Some(mut pixels) = self.target.pixels.try_lock() {
                for (index, value) in self.samples.drain(..) {
                    pixels[index as usize] += value;
                }
            }
        }
    }

    pub fn flush(&mut self) {
        if self.samples.is_empty() {
            return;
        }
        let mut pixels = self.target.pixels.lock();
        for (index, value) in self.samples.drain(..) {
            pixels[index as usize] += value;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_write_accumulates_after_flush() {
        let fb = Framebuffer::new(2, 2);
        let mut writer = fb.writer();

        writer.write(1, Spectrum::uniform(0.5));
        writer.write(1, Spectrum::uniform(0.25));
        writer.write(3, Spectrum::uniform(1.0));
        writer.flush();

        let pixels = fb.pixels();
        assert_eq!(pixels[0], Spectrum::black());
        assert_eq!(pixels[1], Spectrum::uniform(0.75));
        assert_eq!(pixels[3], Spectrum::uniform(1.0));
    }

    #[test]
    fn test_hard_capacity_forces_flush() {
        let fb = Framebuffer::new(1, 1);
        let mut writer = fb.writer();

        for _ in 0..WRITER_CAPACITY {
            writer.write(0, Spectrum::uniform(1.0));
        }

        // the blocking flush emptied the buffer without an explicit call
        assert!(writer.samples.is_empty());
        assert_abs_diff_eq!(fb.pixels()[0][0], WRITER_CAPACITY as Float);
    }

    #[test]
    fn test_soft_capacity_skips_contended_lock() {
        let fb = Framebuffer::new(1, 1);
        let mut writer = fb.writer();

        {
            let _guard = fb.pixels.lock();
            for _ in 0..WRITER_SOFT_CAPACITY + 10 {
                writer.write(0, Spectrum::uniform(1.0));
            }
            // soft flushes were attempted but the lock was held
            assert_eq!(writer.samples.len(), WRITER_SOFT_CAPACITY + 10);
        }

        writer.flush();
        assert_abs_diff_eq!(fb.pixels()[0][0], (WRITER_SOFT_CAPACITY + 10) as Float);
    }

    #[test]
    fn test_degenerate_contributions_clamped() {
        let fb = Framebuffer::new(1, 1);
        let mut writer = fb.writer();

        writer.write(0, Spectrum::from([f32::INFINITY, -2.0, 0.5]));
        writer.flush();

        assert_eq!(fb.pixels()[0], Spectrum::from([0.0, 0.0, 0.5]));
    }

    #[test]
    fn test_normalize_scales_pixels() {
        let mut fb = Framebuffer::new(1, 2);
        let mut writer = fb.writer();
        writer.write(0, Spectrum::uniform(4.0));
        writer.write(1, Spectrum::uniform(2.0));
        writer.flush();

        fb.normalize(0.25);
        let pixels = fb.pixels();
        assert_eq!(pixels[0], Spectrum::uniform(1.0));
        assert_eq!(pixels[1], Spectrum::uniform(0.5));
    }
}
