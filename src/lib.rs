//! ImageStag filter dispatch
//!
//! Runs named RGBA pixel filters on either a single-threaded backend or a
//! worker-pool backend, picked at runtime from what the host supports, and
//! reports how long the transform itself took.
//!
//! ## Image Format
//! Buffers are flat RGBA8 (`width * height * 4` bytes). Backends view them as
//! `(height, width, 4)` ndarray arrays while a filter runs.
//!
//! ## Architecture
//! - [`probe`]: one-shot capability check for shared-memory worker threads
//! - [`backend`]: `single` and `parallel` execution backends
//! - [`dispatch`]: registration table, capability query, timed runs
//! - [`boundary`]: service thread + client proxy, buffers moved not copied
//! - [`filters`]: the built-in kernel table
//!
//! ```no_run
//! use imagestag_dispatch::{Dimensions, DispatchConfig, DispatchService, HostProbe, PixelBuffer, Request};
//!
//! let service = DispatchService::spawn(DispatchConfig::default(), HostProbe)?;
//! let client = service.client();
//! let dims = Dimensions::new(4, 4);
//! let request = Request::new(PixelBuffer::solid(dims, [255, 0, 0, 255]), dims, "invert");
//! let response = if client.supports_parallel().wait()? {
//!     client.run_parallel(request).wait()?
//! } else {
//!     client.run_single(request).wait()?
//! };
//! println!("{:.2} ms", response.elapsed_ms);
//! # Ok::<(), imagestag_dispatch::DispatchError>(())
//! ```

pub mod backend;
pub mod boundary;
pub mod buffer;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod filters;
pub mod probe;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use backend::{BackendKind, ExecutionBackend, ImageHandle, ParallelBackend, SingleBackend};
pub use boundary::{DispatchClient, DispatchService, Pending};
pub use buffer::{from_rgba_array, into_rgba_array, Dimensions, PixelBuffer};
pub use config::DispatchConfig;
pub use dispatch::{Dispatcher, Registration, Request, Response};
pub use error::{DispatchError, DispatchResult, InitError};
pub use filters::{FilterTable, PixelKernel};
pub use probe::{CapabilityProbe, HostProbe};

// Python bindings (only when python feature is enabled)
#[cfg(feature = "python")]
mod python {
    use numpy::{IntoPyArray, PyArray3, PyReadonlyArray3};
    use pyo3::exceptions::{PyRuntimeError, PyValueError};
    use pyo3::prelude::*;

    use crate::buffer::{from_rgba_array, into_rgba_array};
    use crate::{
        BackendKind, DispatchClient, DispatchConfig, DispatchError, DispatchService, HostProbe,
        Request,
    };

    fn to_py_err(err: DispatchError) -> PyErr {
        match err {
            DispatchError::UnknownFilter { .. }
            | DispatchError::InvalidDimensions { .. }
            | DispatchError::InvalidShape { .. } => PyValueError::new_err(err.to_string()),
            other => PyRuntimeError::new_err(other.to_string()),
        }
    }

    // ========================================================================
    // Dispatcher
    // ========================================================================

    /// Filter dispatcher backed by a service thread.
    #[pyclass(name = "Dispatcher")]
    pub struct PyDispatcher {
        client: DispatchClient,
        _service: DispatchService,
    }

    impl PyDispatcher {
        fn run<'py>(
            &self,
            py: Python<'py>,
            backend: BackendKind,
            image: PyReadonlyArray3<'py, u8>,
            filter: &str,
        ) -> PyResult<(Bound<'py, PyArray3<u8>>, f64)> {
            let (buffer, dims) = from_rgba_array(image.as_array()).map_err(to_py_err)?;
            let request = Request::new(buffer, dims, filter);

            let client = self.client.clone();
            let response = py
                .allow_threads(move || client.run(backend.as_str(), request).wait())
                .map_err(to_py_err)?;

            let output = into_rgba_array(response.buffer, dims).map_err(to_py_err)?;
            Ok((output.into_pyarray(py), response.elapsed_ms))
        }
    }

    #[pymethods]
    impl PyDispatcher {
        /// Start the dispatch service.
        ///
        /// # Arguments
        /// * `worker_threads` - Parallel pool size (default: hardware concurrency)
        /// * `parallel` - Allow the parallel backend (default: True)
        #[new]
        #[pyo3(signature = (worker_threads=None, parallel=true))]
        fn new(worker_threads: Option<usize>, parallel: bool) -> PyResult<Self> {
            let mut config = DispatchConfig::default().with_parallel(parallel);
            config.worker_threads = worker_threads;
            let service = DispatchService::spawn(config, HostProbe).map_err(to_py_err)?;
            Ok(Self {
                client: service.client(),
                _service: service,
            })
        }

        /// # Returns
        /// True when `run_parallel` can succeed; fixed once the service is up
        fn supports_parallel(&self, py: Python<'_>) -> PyResult<bool> {
            let client = self.client.clone();
            py.allow_threads(move || client.supports_parallel().wait())
                .map_err(to_py_err)
        }

        /// # Returns
        /// Sorted list of filter names
        fn filters(&self, py: Python<'_>) -> PyResult<Vec<String>> {
            let client = self.client.clone();
            py.allow_threads(move || client.filters(BackendKind::Single.as_str()).wait())
                .map_err(to_py_err)
        }

        /// Apply `filter` on the single-threaded backend.
        ///
        /// # Arguments
        /// * `image` - RGBA uint8 array of shape (H, W, 4)
        /// * `filter` - Filter name, e.g. "invert"
        ///
        /// # Returns
        /// The filtered (H, W, 4) uint8 image and the elapsed milliseconds
        fn run_single<'py>(
            &self,
            py: Python<'py>,
            image: PyReadonlyArray3<'py, u8>,
            filter: &str,
        ) -> PyResult<(Bound<'py, PyArray3<u8>>, f64)> {
            self.run(py, BackendKind::Single, image, filter)
        }

        /// Apply `filter` on the worker-pool backend.
        ///
        /// # Arguments
        /// * `image` - RGBA uint8 array of shape (H, W, 4)
        /// * `filter` - Filter name, e.g. "invert"
        ///
        /// # Returns
        /// The filtered (H, W, 4) uint8 image and the elapsed milliseconds
        fn run_parallel<'py>(
            &self,
            py: Python<'py>,
            image: PyReadonlyArray3<'py, u8>,
            filter: &str,
        ) -> PyResult<(Bound<'py, PyArray3<u8>>, f64)> {
            self.run(py, BackendKind::Parallel, image, filter)
        }
    }

    // ========================================================================
    // Module
    // ========================================================================

    /// ImageStag dispatch extension module
    #[pymodule]
    pub fn imagestag_dispatch(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_class::<PyDispatcher>()?;
        Ok(())
    }
}

#[cfg(feature = "python")]
pub use python::imagestag_dispatch;
