//! Channel kernels: remove, swap and single-channel grayscale.

use ndarray::ArrayViewMut1;

use super::color::{self, ALPHA, BLUE, GREEN, RED};

pub fn remove_red(px: &mut ArrayViewMut1<'_, u8>) {
    px[RED] = 0;
}

pub fn remove_green(px: &mut ArrayViewMut1<'_, u8>) {
    px[GREEN] = 0;
}

pub fn remove_blue(px: &mut ArrayViewMut1<'_, u8>) {
    px[BLUE] = 0;
}

pub fn swap_red_blue(px: &mut ArrayViewMut1<'_, u8>) {
    px.swap(RED, BLUE);
}

pub fn swap_red_green(px: &mut ArrayViewMut1<'_, u8>) {
    px.swap(RED, GREEN);
}

pub fn swap_blue_green(px: &mut ArrayViewMut1<'_, u8>) {
    px.swap(BLUE, GREEN);
}

pub fn swap_alpha_red(px: &mut ArrayViewMut1<'_, u8>) {
    px.swap(ALPHA, RED);
}

pub fn swap_alpha_green(px: &mut ArrayViewMut1<'_, u8>) {
    px.swap(ALPHA, GREEN);
}

pub fn swap_alpha_blue(px: &mut ArrayViewMut1<'_, u8>) {
    px.swap(ALPHA, BLUE);
}

pub fn red_grayscale(px: &mut ArrayViewMut1<'_, u8>) {
    let v = px[RED];
    color::set_gray(px, v);
}

pub fn green_grayscale(px: &mut ArrayViewMut1<'_, u8>) {
    let v = px[GREEN];
    color::set_gray(px, v);
}

pub fn blue_grayscale(px: &mut ArrayViewMut1<'_, u8>) {
    let v = px[BLUE];
    color::set_gray(px, v);
}
