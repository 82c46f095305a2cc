//! Final framebuffer encoding and the textual run report.

use crate::stats::SimStats;
use image::{ImageBuffer, Rgb, RgbImage};
use std::io;
use std::path::Path;

/// An RGB framebuffer accumulated by resolved ray hits.
pub struct Framebuffer {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 3]>,
}

impl Framebuffer {
    /// Creates a black framebuffer of the given dimensions.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0, 0, 0]; (width as usize) * (height as usize)],
        }
    }

    /// Writes one pixel's color.
    ///
    /// # Panics
    /// Panics if `(x, y)` is outside the framebuffer bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        assert!(x < self.width && y < self.height, "pixel out of bounds");
        self.pixels[(y * self.width + x) as usize] = color;
    }

    /// Encodes a hit primitive id into a pixel color: a simple hash so
    /// distinct primitives are visually distinguishable, full opacity
    /// implied by a fully specified RGB triple.
    #[must_use]
    pub fn hash_color(primitive_id: u32) -> [u8; 3] {
        let h = primitive_id.wrapping_mul(2_654_435_761);
        [(h >> 16) as u8, (h >> 8) as u8, h as u8]
    }

    /// Encodes the framebuffer as a PNG to `path`.
    pub fn write_png(&self, path: &Path) -> io::Result<()> {
        let mut img: RgbImage = ImageBuffer::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let [r, g, b] = self.pixels[(y * self.width + x) as usize];
                img.put_pixel(x, y, Rgb([r, g, b]));
            }
        }
        img.save(path).map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

/// Per-treelet access counts bucketed by depth, for the textual report's
/// "per-treelet access histogram".
#[derive(Clone, Debug, Default)]
pub struct TreeletAccessHistogram {
    /// Index `i` holds the access count for depth `i`.
    pub accesses_by_depth: Vec<u64>,
}

impl TreeletAccessHistogram {
    /// Records one access to a segment at `depth`.
    pub fn record(&mut self, depth: u32) {
        let depth = depth as usize;
        if depth >= self.accesses_by_depth.len() {
            self.accesses_by_depth.resize(depth + 1, 0);
        }
        self.accesses_by_depth[depth] += 1;
    }
}

/// Prints the full textual report: cycles, throughput, energy, power,
/// per-cache rates (delegated to [`SimStats::print`]), and the per-treelet
/// access histogram.
pub fn print_report(stats: &SimStats, histogram: &TreeletAccessHistogram, run_seconds: f64) {
    stats.print();
    let mrays_per_sec = if run_seconds > 0.0 {
        stats.rays_launched as f64 / run_seconds / 1.0e6
    } else {
        0.0
    };
    println!("\nMRays/s: {mrays_per_sec:.2}");
    println!("\nTreelet accesses by depth:");
    for (depth, count) in histogram.accesses_by_depth.iter().enumerate() {
        if *count > 0 {
            println!("  depth {depth}: {count}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Framebuffer, TreeletAccessHistogram};

    #[test]
    fn set_pixel_updates_the_requested_coordinate() {
        let mut fb = Framebuffer::new(4, 4);
        fb.set_pixel(2, 1, [10, 20, 30]);
        assert_eq!(fb.pixels[1 * 4 + 2], [10, 20, 30]);
    }

    #[test]
    fn hash_color_is_deterministic_for_a_given_id() {
        assert_eq!(Framebuffer::hash_color(7), Framebuffer::hash_color(7));
    }

    #[test]
    fn histogram_grows_to_fit_recorded_depths() {
        let mut hist = TreeletAccessHistogram::default();
        hist.record(0);
        hist.record(3);
        hist.record(3);
        assert_eq!(hist.accesses_by_depth, vec![1, 0, 0, 2]);
    }
}
