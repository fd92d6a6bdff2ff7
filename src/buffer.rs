//! Move-only RGBA pixel buffers.
//!
//! A [`PixelBuffer`] deliberately does not implement `Clone`: handing one to
//! a backend or across the service channel moves the allocation, so large
//! images are never duplicated on the way in or out.

use ndarray::{Array3, ArrayView3};

use crate::error::{DispatchError, DispatchResult};

/// Bytes per RGBA pixel.
pub const CHANNELS: usize = 4;

/// Canvas size that gives a flat buffer its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of bytes an RGBA buffer of this size occupies, `None` when it
    /// does not fit in `usize`.
    pub fn checked_byte_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(CHANNELS)
    }

    /// Like [`Dimensions::checked_byte_len`], saturating at `usize::MAX`.
    ///
    /// No real buffer reaches `usize::MAX` bytes, so a saturated length never
    /// matches one.
    pub fn byte_len(&self) -> usize {
        self.checked_byte_len().unwrap_or(usize::MAX)
    }

    /// Shape as `(height, width, channels)`, the layout ndarray filters use.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.height as usize, self.width as usize, CHANNELS)
    }

    pub(crate) fn check(&self, actual: usize) -> DispatchResult<()> {
        match self.checked_byte_len() {
            Some(expected) if expected == actual => Ok(()),
            expected => Err(DispatchError::InvalidDimensions {
                width: self.width,
                height: self.height,
                expected: expected.unwrap_or(usize::MAX),
                actual,
            }),
        }
    }
}

/// Owned RGBA bytes.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PixelBuffer {
    bytes: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Buffer of `dims` filled with a single RGBA color.
    pub fn solid(dims: Dimensions, rgba: [u8; 4]) -> Self {
        let pixels = dims.byte_len() / CHANNELS;
        Self {
            bytes: rgba.repeat(pixels),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Give up the allocation without copying.
    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

impl From<Vec<u8>> for PixelBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl AsRef<[u8]> for PixelBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Copy an `(H, W, 4)` view into a flat buffer in row-major order.
///
/// Strided and non-contiguous views are read in logical order. Fails with
/// [`DispatchError::InvalidShape`] when the channel axis is not 4 or a side
/// does not fit in `u32`.
pub fn from_rgba_array(view: ArrayView3<'_, u8>) -> DispatchResult<(PixelBuffer, Dimensions)> {
    let (height, width, channels) = view.dim();
    let invalid = || DispatchError::InvalidShape {
        height,
        width,
        channels,
    };
    if channels != CHANNELS {
        return Err(invalid());
    }
    let width = u32::try_from(width).map_err(|_| invalid())?;
    let height = u32::try_from(height).map_err(|_| invalid())?;

    let bytes = match view.as_slice() {
        Some(slice) => slice.to_vec(),
        None => view.iter().copied().collect(),
    };
    Ok((PixelBuffer::new(bytes), Dimensions::new(width, height)))
}

/// Reshape a flat buffer back into an `(H, W, 4)` array without copying.
pub fn into_rgba_array(buffer: PixelBuffer, dims: Dimensions) -> DispatchResult<Array3<u8>> {
    dims.check(buffer.len())?;
    let actual = buffer.len();
    Array3::from_shape_vec(dims.shape(), buffer.into_vec()).map_err(|_| {
        DispatchError::InvalidDimensions {
            width: dims.width,
            height: dims.height,
            expected: dims.byte_len(),
            actual,
        }
    })
}
