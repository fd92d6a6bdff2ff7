//! RGBA channel layout and per-pixel helpers shared by the kernels.

use ndarray::ArrayViewMut1;

pub const RED: usize = 0;
pub const GREEN: usize = 1;
pub const BLUE: usize = 2;
pub const ALPHA: usize = 3;

/// ITU-R BT.709 luminosity coefficients
pub const LUMA_R: f32 = 0.2126;
pub const LUMA_G: f32 = 0.7152;
pub const LUMA_B: f32 = 0.0722;

#[inline]
pub fn inverted(px: &ArrayViewMut1<'_, u8>, channel: usize) -> u8 {
    255 - px[channel]
}

/// Integer mean of the three color channels.
#[inline]
pub fn average(px: &ArrayViewMut1<'_, u8>) -> u8 {
    ((px[RED] as u32 + px[GREEN] as u32 + px[BLUE] as u32) / 3) as u8
}

#[inline]
pub fn weighted(px: &ArrayViewMut1<'_, u8>, r_w: f32, g_w: f32, b_w: f32) -> f32 {
    px[RED] as f32 * r_w + px[GREEN] as f32 * g_w + px[BLUE] as f32 * b_w
}

/// Write the same value into R, G and B.
#[inline]
pub fn set_gray(px: &mut ArrayViewMut1<'_, u8>, value: u8) {
    px[RED] = value;
    px[GREEN] = value;
    px[BLUE] = value;
}
