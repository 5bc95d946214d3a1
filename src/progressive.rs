//! Progressive accumulation: every call renders one patch of pixel samples
//! in parallel and folds them into per-pixel running means.

use std::ops::Range;

use fastrand::Rng;
use log::trace;
use rayon::prelude::*;

use crate::camera::Viewport;
use crate::config::{Estimator, TraceSettings};
use crate::picture::{Color, RGBA8};
use crate::scene::Scene;

/// `count += 1; mean += (sample - mean) / count`.
pub fn running_mean(mean: &mut Color, count: &mut u32, sample: Color) {
    *count += 1;
    *mean += (sample - *mean) / *count as f32;
}

/// Seed of the random stream used for one sample of one pixel.
fn sample_seed(session: u64, index: usize, count: u32) -> u64 {
    let key = ((index as u64) << 32) | count as u64;
    // splitmix64 finalizer
    let mut z = session ^ key.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// The wrapped run `start..start + len` of pixel indices as at most two plain ranges.
fn patch_ranges(start: usize, len: usize, pixels: usize) -> (Range<usize>, Range<usize>) {
    let end = start + len;
    if end <= pixels {
        (start..end, 0..0)
    } else {
        (start..pixels, 0..end - pixels)
    }
}

pub struct ProgressiveRenderer<'a> {
    scene: &'a Scene,
    viewport: Viewport,
    estimator: Estimator,
    settings: TraceSettings,
    width: usize,
    height: usize,
    means: Vec<Color>,
    counts: Vec<u32>,
    patch_size: usize,
    cursor: usize,
    seed: u64,
    passes: u64,
}

impl<'a> ProgressiveRenderer<'a> {
    /// `patch_size` is clamped to the pixel count, so a patch never visits a pixel twice.
    pub fn new(scene: &'a Scene, viewport: Viewport, estimator: Estimator, settings: TraceSettings, patch_size: usize, seed: u64) -> Self {
        let width = viewport.image_width as usize;
        let height = viewport.image_height as usize;
        let pixels = width * height;
        ProgressiveRenderer {
            scene,
            viewport,
            estimator,
            settings,
            width,
            height,
            means: vec![Color::BLACK; pixels],
            counts: vec![0; pixels],
            patch_size: patch_size.clamp(1, pixels.max(1)),
            cursor: 0,
            seed,
            passes: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn patch_size(&self) -> usize {
        self.patch_size
    }

    /// Number of patches rendered since creation or the last reset.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Current estimate and sample count of a pixel.
    pub fn pixel(&self, x: usize, y: usize) -> (Color, u32) {
        let index = y * self.width + x;
        (self.means[index], self.counts[index])
    }

    pub fn reset(&mut self) {
        self.means.fill(Color::BLACK);
        self.counts.fill(0);
        self.cursor = 0;
        self.passes = 0;
    }

    /// Takes one sample for each pixel of the next patch and returns the
    /// pixel indices it covered.
    pub fn render_patch(&mut self) -> (Range<usize>, Range<usize>) {
        let pixels = self.means.len();
        if pixels == 0 {
            return (0..0, 0..0);
        }
        let (head, tail) = patch_ranges(self.cursor, self.patch_size, pixels);
        trace!(target: "app", "Rendering patch: {:?} {:?}", head, tail);

        self.sample_range(head.clone());
        self.sample_range(tail.clone());

        self.cursor = (self.cursor + self.patch_size) % pixels;
        self.passes += 1;
        (head, tail)
    }

    fn sample_range(&mut self, range: Range<usize>) {
        let scene = self.scene;
        let viewport = &self.viewport;
        let settings = &self.settings;
        let estimator = self.estimator;
        let (width, height, seed) = (self.width, self.height, self.seed);
        let start = range.start;

        self.means[range.clone()].par_iter_mut()
            .zip(self.counts[range].par_iter_mut())
            .enumerate()
            .for_each(|(offset, (mean, count))| {
                let index = start + offset;
                let mut rng = Rng::with_seed(sample_seed(seed, index, *count));
                let (x, y) = (index % width, index / width);
                let u = (x as f32 + rng.f32()) / width as f32;
                let v = (y as f32 + rng.f32()) / height as f32;
                let ray = viewport.emit_ray(u, v);
                let sample = estimator.radiance(scene, &ray, settings, &mut rng);
                running_mean(mean, count, sample);
            });
    }

    /// Tone-maps every running mean into `pixels`.
    pub fn resolve(&self, pixels: &mut [RGBA8]) {
        pixels.par_iter_mut()
            .zip(self.means.par_iter())
            .for_each(|(pixel, mean)| *pixel = RGBA8::from(*mean));
    }
}
