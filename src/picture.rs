use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Sub};

use bytemuck_derive::{AnyBitPattern, NoUninit};
use wgpu::TextureFormat;

/// Linear radiance or reflectance. Unbounded; clamped only when converted to [`RGBA8`].
#[derive(Default, Debug, Copy, Clone, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub const fn gray(value: f32) -> Self {
        Self::new(value, value, value)
    }

    pub fn mean(&self) -> f32 {
        (self.r + self.g + self.b) / 3.0
    }

    /// True if at least one channel is non-zero.
    pub fn any(&self) -> bool {
        self.r != 0.0 || self.g != 0.0 || self.b != 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite()
    }
}

impl Sum for Color {
    fn sum<I: Iterator<Item=Self>>(iter: I) -> Self {
        iter.fold(Color::BLACK, |acc, color| acc + color)
    }
}

impl Add for Color {
    type Output = Color;

    fn add(self, rhs: Self) -> Self::Output {
        Color::new(self.r + rhs.r, self.g + rhs.g, self.b + rhs.b)
    }
}

impl AddAssign for Color {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Color {
    type Output = Color;

    fn sub(self, rhs: Self) -> Self::Output {
        Color::new(self.r - rhs.r, self.g - rhs.g, self.b - rhs.b)
    }
}

impl Mul for Color {
    type Output = Color;

    fn mul(self, rhs: Self) -> Self::Output {
        Color::new(self.r * rhs.r, self.g * rhs.g, self.b * rhs.b)
    }
}

impl MulAssign for Color {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl Mul<f32> for Color {
    type Output = Color;

    fn mul(self, rhs: f32) -> Self::Output {
        Color::new(self.r * rhs, self.g * rhs, self.b * rhs)
    }
}

impl Mul<Color> for f32 {
    type Output = Color;

    fn mul(self, rhs: Color) -> Self::Output {
        rhs * self
    }
}

impl Div<f32> for Color {
    type Output = Color;

    fn div(self, rhs: f32) -> Self::Output {
        Color::new(self.r / rhs, self.g / rhs, self.b / rhs)
    }
}

impl DivAssign<f32> for Color {
    fn div_assign(&mut self, rhs: f32) {
        *self = *self / rhs;
    }
}

pub const DISPLAY_GAMMA: f32 = 2.2;

#[derive(Default, Debug, Copy, Clone, PartialEq, AnyBitPattern, NoUninit)]
#[repr(C)]
pub struct RGBA8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Clamps to `[0, 1]`, gamma-encodes and quantizes one channel.
fn encode(value: f32) -> u8 {
    (value.clamp(0.0, 1.0).powf(1.0 / DISPLAY_GAMMA) * 255.0).round() as u8
}

impl From<Color> for RGBA8 {
    fn from(value: Color) -> Self {
        RGBA8::new(encode(value.r), encode(value.g), encode(value.b), u8::MAX)
    }
}

impl RGBA8 {
    pub const TEXTURE_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
    pub const BLACK: RGBA8 = RGBA8::new(0, 0, 0, 0xFF);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        RGBA8 { r, g, b, a }
    }
}

/// A row-major view over a pixel buffer.
pub struct Picture<P> {
    pixels: P,
    size: (u32, u32),
}

impl<P> Picture<P> {
    pub fn new(pixels: P, size: (u32, u32)) -> Self {
        Picture { pixels, size }
    }

    pub fn width(&self) -> u32 {
        self.size.0
    }

    pub fn height(&self) -> u32 {
        self.size.1
    }

    fn to_index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width() as usize + x as usize
    }
}

impl<'a, T> Picture<&'a [T]> {
    pub fn pixel(&self, x: u32, y: u32) -> &T {
        &self.pixels[self.to_index(x, y)]
    }
}

impl<'a, T> Picture<&'a mut [T]> {
    pub fn pixel_mut(&mut self, x: u32, y: u32) -> &mut T {
        let index = self.to_index(x, y);
        &mut self.pixels[index]
    }

    pub fn buffer_mut(&mut self) -> &mut [T] {
        self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_any() {
        assert!((Color::new(0.3, 0.6, 0.9).mean() - 0.6).abs() < 1e-6);
        assert!(Color::new(0.0, 0.0, 0.1).any());
        assert!(!Color::BLACK.any());
    }

    #[test]
    fn tone_mapping_clamps_and_gamma_encodes() {
        assert_eq!(RGBA8::from(Color::new(-1.0, 0.0, 4.0)), RGBA8::new(0, 0, 255, 255));
        // 0.5^(1/2.2) = 0.7297
        assert_eq!(RGBA8::from(Color::gray(0.5)).r, 186);
    }

    #[test]
    fn picture_indexing_is_row_major() {
        let mut pixels = vec![0u32; 6];
        let mut picture = Picture::new(pixels.as_mut_slice(), (3, 2));
        *picture.pixel_mut(2, 1) = 7;
        assert_eq!(pixels[5], 7);

        let picture = Picture::new(pixels.as_slice(), (3, 2));
        assert_eq!(*picture.pixel(2, 1), 7);
    }
}
