//! WebAssembly exports for the filter dispatcher.
//!
//! Meant to run inside a web worker: the worker itself is the boundary, so
//! the dispatcher is driven directly instead of through a service thread.
//!
//! Pixel data moves in as an owned `Vec<u8>` (a copy out of the JS
//! `Uint8ClampedArray` made by wasm-bindgen) and moves out again through
//! [`WasmResponse::take_data`].
//!
//! With the `wasm-threads` feature the parallel backend runs on the rayon
//! pool that JS provisions before constructing the dispatcher:
//!
//! ```js
//! await initThreadPool(navigator.hardwareConcurrency);
//! const dispatcher = new WasmDispatcher(true);
//! ```

use wasm_bindgen::prelude::*;

use crate::{
    BackendKind, Dimensions, DispatchConfig, Dispatcher, HostProbe, PixelBuffer, Request,
};

#[cfg(all(feature = "wasm-threads", target_arch = "wasm32"))]
pub use wasm_bindgen_rayon::init_thread_pool;

// ============================================================================
// Response
// ============================================================================

/// Filtered pixels plus the time the transform took.
#[wasm_bindgen]
pub struct WasmResponse {
    data: Vec<u8>,
    elapsed_ms: f64,
}

#[wasm_bindgen]
impl WasmResponse {
    /// Move the RGBA bytes out.
    ///
    /// # Returns
    /// Flat array of RGBA bytes on the first call, an empty array afterwards
    #[wasm_bindgen(js_name = takeData)]
    pub fn take_data(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }

    /// # Returns
    /// Milliseconds spent inside the filter, excluding transfer
    #[wasm_bindgen(getter, js_name = elapsedMs)]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

#[wasm_bindgen]
pub struct WasmDispatcher {
    dispatcher: Dispatcher,
}

#[wasm_bindgen]
impl WasmDispatcher {
    /// Bring up the backends once.
    ///
    /// # Arguments
    /// * `threads_ready` - `true` once `initThreadPool` has resolved; the
    ///   parallel backend then shares that pool. With `false` the host is
    ///   asked instead, which on wasm32 leaves only the single backend.
    #[wasm_bindgen(constructor)]
    pub fn new(threads_ready: bool) -> WasmDispatcher {
        let config = DispatchConfig::default().with_shared_pool(threads_ready);
        let dispatcher = if threads_ready {
            Dispatcher::start(config, &|| true)
        } else {
            Dispatcher::start(config, &HostProbe)
        };
        WasmDispatcher { dispatcher }
    }

    /// # Returns
    /// Whether `runParallel` can succeed; fixed for the dispatcher's lifetime
    #[wasm_bindgen(js_name = supportsParallel)]
    pub fn supports_parallel(&self) -> bool {
        self.dispatcher.supports_parallel()
    }

    /// # Arguments
    /// * `backend` - `"single"` or `"parallel"`
    ///
    /// # Returns
    /// Names of the filters the backend exposes
    pub fn filters(&self, backend: &str) -> Result<Vec<String>, JsError> {
        Ok(self.dispatcher.filters(backend)?)
    }

    /// Run `filter` on the named backend.
    ///
    /// # Arguments
    /// * `backend` - `"single"` or `"parallel"`
    /// * `data` - Flat array of RGBA bytes (length = width * height * 4)
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    /// * `filter` - Filter name, e.g. `"invert"`
    ///
    /// # Returns
    /// The filtered pixels and elapsed time, or an `Error` naming the failure
    pub fn run(
        &self,
        backend: &str,
        data: Vec<u8>,
        width: u32,
        height: u32,
        filter: &str,
    ) -> Result<WasmResponse, JsError> {
        let dims = Dimensions::new(width, height);
        let request = Request::new(PixelBuffer::new(data), dims, filter);
        let response = self.dispatcher.run(backend, request)?;
        Ok(WasmResponse {
            data: response.buffer.into_vec(),
            elapsed_ms: response.elapsed_ms,
        })
    }

    /// Run `filter` on the calling thread.
    ///
    /// # Arguments
    /// * `data` - Flat array of RGBA bytes (length = width * height * 4)
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    /// * `filter` - Filter name
    ///
    /// # Returns
    /// The filtered pixels and elapsed time
    #[wasm_bindgen(js_name = runSingle)]
    pub fn run_single(
        &self,
        data: Vec<u8>,
        width: u32,
        height: u32,
        filter: &str,
    ) -> Result<WasmResponse, JsError> {
        self.run(BackendKind::Single.as_str(), data, width, height, filter)
    }

    /// Run `filter` across the worker pool.
    ///
    /// # Arguments
    /// * `data` - Flat array of RGBA bytes (length = width * height * 4)
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    /// * `filter` - Filter name
    ///
    /// # Returns
    /// The filtered pixels and elapsed time; fails when `supportsParallel` is false
    #[wasm_bindgen(js_name = runParallel)]
    pub fn run_parallel(
        &self,
        data: Vec<u8>,
        width: u32,
        height: u32,
        filter: &str,
    ) -> Result<WasmResponse, JsError> {
        self.run(BackendKind::Parallel.as_str(), data, width, height, filter)
    }
}

impl Default for WasmDispatcher {
    fn default() -> Self {
        Self::new(false)
    }
}

// Error paths build a `JsError`, which needs a JS host; only the success
// paths run natively.
#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    fn red(pixels: usize) -> Vec<u8> {
        [255u8, 0, 0, 255].repeat(pixels)
    }

    #[test]
    fn test_single_only_without_thread_pool() {
        let dispatcher = WasmDispatcher::default();

        let mut response = dispatcher.run_single(red(6), 3, 2, "invert").ok().unwrap();
        assert!(response.elapsed_ms() >= 0.0);

        let data = response.take_data();
        assert_eq!(data.len(), 24);
        assert!(data.chunks(4).all(|px| px == [0, 255, 255, 255]));
        assert!(response.take_data().is_empty());
    }

    #[test]
    fn test_parallel_on_shared_pool() {
        let dispatcher = WasmDispatcher::new(true);
        assert!(dispatcher.supports_parallel());

        let mut response = dispatcher
            .run_parallel(red(16), 4, 4, "swapRedBlue")
            .ok()
            .unwrap();
        assert!(response.take_data().chunks(4).all(|px| px == [0, 0, 255, 255]));
    }

    #[test]
    fn test_filters_lists_builtins() {
        let dispatcher = WasmDispatcher::new(true);
        let names = dispatcher.filters("parallel").ok().unwrap();
        assert!(names.iter().any(|n| n == "sepia"));
    }
}
