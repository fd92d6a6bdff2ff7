//! Execution backends.
//!
//! A backend turns a raw buffer into an [`ImageHandle`], runs a named
//! kernel over it and hands the pixels back. Two implementations exist:
//!
//! - [`SingleBackend`]: kernels run on the calling thread.
//! - [`ParallelBackend`]: kernels fan out over a dedicated rayon pool and
//!   join before `invoke` returns, so callers never see the parallelism.

use std::fmt;
use std::str::FromStr;

use ndarray::Array3;

use crate::buffer::{Dimensions, PixelBuffer};
use crate::error::{DispatchError, DispatchResult};
use crate::filters::{FilterTable, PixelKernel};

pub mod parallel;
pub mod single;

pub use parallel::ParallelBackend;
pub use single::SingleBackend;

/// Name under which a backend is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BackendKind {
    Single,
    Parallel,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Single => "single",
            BackendKind::Parallel => "parallel",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(BackendKind::Single),
            "parallel" => Ok(BackendKind::Parallel),
            other => Err(DispatchError::unavailable(other, "no such backend")),
        }
    }
}

/// Pixels of one in-flight request, owned by the backend that opened them.
#[derive(Debug)]
pub struct ImageHandle {
    pixels: Array3<u8>,
    owner: BackendKind,
}

impl ImageHandle {
    fn open(owner: BackendKind, buffer: PixelBuffer, dims: Dimensions) -> DispatchResult<Self> {
        let actual = buffer.len();
        dims.check(actual)?;
        let pixels = Array3::from_shape_vec(dims.shape(), buffer.into_vec()).map_err(|_| {
            DispatchError::InvalidDimensions {
                width: dims.width,
                height: dims.height,
                expected: dims.byte_len(),
                actual,
            }
        })?;
        Ok(Self { pixels, owner })
    }

    pub fn owner(&self) -> BackendKind {
        self.owner
    }

    pub fn dims(&self) -> Dimensions {
        let (height, width, _) = self.pixels.dim();
        Dimensions::new(width as u32, height as u32)
    }

    fn claim(&self, backend: BackendKind) -> DispatchResult<()> {
        if self.owner != backend {
            return Err(DispatchError::ForeignHandle {
                owner: self.owner,
                backend,
            });
        }
        Ok(())
    }

    fn pixels_mut(&mut self) -> &mut Array3<u8> {
        &mut self.pixels
    }

    fn into_buffer(self) -> PixelBuffer {
        // from_shape_vec gives standard layout, so the raw vec is already in RGBA order.
        let (bytes, _) = self.pixels.into_raw_vec_and_offset();
        PixelBuffer::new(bytes)
    }
}

/// Contract shared by the single-threaded and worker-pool backends.
///
/// All three operations block until done, whatever the backend does
/// internally.
pub trait ExecutionBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Names of the transforms this backend can invoke.
    fn filters(&self) -> Vec<String>;

    /// Take ownership of `buffer` and wrap it in a handle.
    fn open(&self, buffer: PixelBuffer, dims: Dimensions) -> DispatchResult<ImageHandle> {
        ImageHandle::open(self.kind(), buffer, dims)
    }

    /// Apply `filter` to `handle` in place.
    fn invoke(&self, filter: &str, handle: &mut ImageHandle) -> DispatchResult<()>;

    /// Consume the handle and return its pixels.
    fn read_back(&self, handle: ImageHandle) -> DispatchResult<PixelBuffer> {
        handle.claim(self.kind())?;
        Ok(handle.into_buffer())
    }
}

impl fmt::Debug for dyn ExecutionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Backend", self.kind())
    }
}

/// Check handle ownership and look up the kernel; nothing is mutated on failure.
fn resolve(
    filters: &FilterTable,
    backend: BackendKind,
    filter: &str,
    handle: &ImageHandle,
) -> DispatchResult<PixelKernel> {
    handle.claim(backend)?;
    filters
        .get(filter)
        .ok_or_else(|| DispatchError::unknown_filter(backend, filter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_name() {
        for kind in [BackendKind::Single, BackendKind::Parallel] {
            assert_eq!(kind.as_str().parse::<BackendKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind_is_unavailable() {
        let err = "gpu".parse::<BackendKind>().unwrap_err();
        assert!(matches!(err, DispatchError::BackendUnavailable { ref backend, .. } if backend == "gpu"));
    }

    #[test]
    fn test_handle_reports_dims() {
        let dims = Dimensions::new(3, 2);
        let handle =
            ImageHandle::open(BackendKind::Single, PixelBuffer::new(vec![0; 24]), dims).unwrap();
        assert_eq!(handle.dims(), dims);
        assert_eq!(handle.owner(), BackendKind::Single);
    }

    #[test]
    fn test_handle_rejects_short_buffer() {
        let err = ImageHandle::open(
            BackendKind::Single,
            PixelBuffer::new(vec![0; 10]),
            Dimensions::new(2, 2),
        )
        .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidDimensions { actual: 10, .. }));
    }

    #[test]
    fn test_into_buffer_preserves_order() {
        let bytes: Vec<u8> = (0..16).collect();
        let handle = ImageHandle::open(
            BackendKind::Parallel,
            PixelBuffer::new(bytes.clone()),
            Dimensions::new(2, 2),
        )
        .unwrap();
        assert_eq!(handle.into_buffer().into_vec(), bytes);
    }
}
