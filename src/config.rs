//! Startup configuration for the dispatcher and its backends.

use crate::filters::FilterTable;

/// Built once at startup and handed to [`crate::Dispatcher::start`] or
/// [`crate::DispatchService::spawn`].
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Filter module shared by both backends.
    pub filters: FilterTable,
    /// Worker pool size for the parallel backend; `None` uses hardware concurrency.
    pub worker_threads: Option<usize>,
    /// Set to `false` to never register the parallel backend.
    pub parallel: bool,
    /// Prefix for pool and service thread names.
    pub thread_name: String,
    /// Run the parallel backend on rayon's global pool instead of building
    /// its own. Needed on wasm32, where the global pool is the one
    /// `initThreadPool` provisions from JS and no other threads can spawn.
    pub shared_pool: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            filters: FilterTable::builtin(),
            worker_threads: None,
            parallel: true,
            thread_name: "imagestag".to_string(),
            shared_pool: false,
        }
    }
}

impl DispatchConfig {
    pub fn with_filters(mut self, filters: FilterTable) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_shared_pool(mut self, shared: bool) -> Self {
        self.shared_pool = shared;
        self
    }
}
