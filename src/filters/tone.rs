//! Tonal kernels: grayscale, sepia and the inversion family.
//!
//! Every kernel leaves alpha untouched.

use ndarray::ArrayViewMut1;

use super::color::{self, BLUE, GREEN, LUMA_B, LUMA_G, LUMA_R, RED};

/// R=G=B=mean of the color channels.
pub fn grayscale(px: &mut ArrayViewMut1<'_, u8>) {
    let avg = color::average(px);
    color::set_gray(px, avg);
}

/// R=G=B=BT.709 luminosity.
pub fn luminance(px: &mut ArrayViewMut1<'_, u8>) {
    let gray = color::weighted(px, LUMA_R, LUMA_G, LUMA_B) as u8;
    color::set_gray(px, gray);
}

/// Warm brown tint: red and green lifted above the weighted gray, blue kept.
pub fn sepia(px: &mut ArrayViewMut1<'_, u8>) {
    let weight = color::weighted(px, 0.3, 0.59, 0.11);

    let new_red = if weight as u32 + 100 < 255 {
        weight as u8 + 100
    } else {
        255
    };
    let new_green = if weight as u32 + 50 < 255 {
        weight as u8 + 50
    } else {
        255
    };

    px[RED] = new_red;
    px[GREEN] = new_green;
}

fn invert_channels(px: &mut ArrayViewMut1<'_, u8>, channels: &[usize]) {
    for &c in channels {
        px[c] = color::inverted(px, c);
    }
}

pub fn invert(px: &mut ArrayViewMut1<'_, u8>) {
    invert_channels(px, &[RED, GREEN, BLUE]);
}

pub fn redden(px: &mut ArrayViewMut1<'_, u8>) {
    invert_channels(px, &[RED]);
}

pub fn neue(px: &mut ArrayViewMut1<'_, u8>) {
    invert_channels(px, &[BLUE]);
}

pub fn lix(px: &mut ArrayViewMut1<'_, u8>) {
    invert_channels(px, &[RED, GREEN]);
}

pub fn ryo(px: &mut ArrayViewMut1<'_, u8>) {
    invert_channels(px, &[RED, BLUE]);
}
