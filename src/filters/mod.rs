//! The filter module: named per-pixel RGBA kernels.
//!
//! Backends only ever see a [`FilterTable`]. Filter names are an open
//! vocabulary resolved at call time, so callers can register their own
//! kernels next to the built-in ones.
//!
//! ## Built-in filters
//!
//! | Name | Effect |
//! |------|--------|
//! | `grayscale` | R=G=B=mean(R, G, B) |
//! | `luminance` | R=G=B=BT.709 luma |
//! | `sepia` | Red/green lifted over weighted gray |
//! | `invert` | Invert RGB, alpha preserved |
//! | `redden`, `neue`, `lix`, `ryo` | Invert R / B / RG / RB |
//! | `removeRed`, `removeGreen`, `removeBlue` | Zero one channel |
//! | `swapRedBlue`, `swapRedGreen`, `swapBlueGreen` | Swap two colors |
//! | `swapAlphaRed`, `swapAlphaGreen`, `swapAlphaBlue` | Swap alpha with a color |
//! | `redGrayscale`, `greenGrayscale`, `blueGrayscale` | R=G=B=one channel |

use std::collections::BTreeMap;

use ndarray::ArrayViewMut1;

pub mod channel;
pub mod color;
pub mod tone;

/// Transform applied independently to every pixel (a lane of 4 bytes).
pub type PixelKernel = fn(&mut ArrayViewMut1<'_, u8>);

#[derive(Clone, Default)]
pub struct FilterTable {
    kernels: BTreeMap<String, PixelKernel>,
}

impl FilterTable {
    /// Table with no filters. Backends refuse to initialize from it.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut table = Self::empty();

        table.register("grayscale", tone::grayscale);
        table.register("luminance", tone::luminance);
        table.register("sepia", tone::sepia);
        table.register("invert", tone::invert);
        table.register("redden", tone::redden);
        table.register("neue", tone::neue);
        table.register("lix", tone::lix);
        table.register("ryo", tone::ryo);

        table.register("removeRed", channel::remove_red);
        table.register("removeGreen", channel::remove_green);
        table.register("removeBlue", channel::remove_blue);
        table.register("swapRedBlue", channel::swap_red_blue);
        table.register("swapRedGreen", channel::swap_red_green);
        table.register("swapBlueGreen", channel::swap_blue_green);
        table.register("swapAlphaRed", channel::swap_alpha_red);
        table.register("swapAlphaGreen", channel::swap_alpha_green);
        table.register("swapAlphaBlue", channel::swap_alpha_blue);
        table.register("redGrayscale", channel::red_grayscale);
        table.register("greenGrayscale", channel::green_grayscale);
        table.register("blueGrayscale", channel::blue_grayscale);

        table
    }

    /// Add a kernel, replacing any previous one under the same name.
    pub fn register(&mut self, name: impl Into<String>, kernel: PixelKernel) -> &mut Self {
        self.kernels.insert(name.into(), kernel);
        self
    }

    pub fn get(&self, name: &str) -> Option<PixelKernel> {
        self.kernels.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kernels.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.kernels.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }
}

impl std::fmt::Debug for FilterTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.kernels.keys()).finish()
    }
}
