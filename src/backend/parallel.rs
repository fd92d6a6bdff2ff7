//! Worker-pool backend.
//!
//! Owns a rayon pool sized to the host's hardware concurrency (or the
//! configured override), or borrows rayon's global pool when
//! [`DispatchConfig::shared_pool`] is set. `invoke` runs the pixel loop on
//! that pool and only returns once every worker has finished its share.

use ndarray::{Axis, Zip};

use super::{resolve, BackendKind, ExecutionBackend, ImageHandle};
use crate::config::DispatchConfig;
use crate::error::{DispatchResult, InitError};
use crate::filters::FilterTable;
use crate::probe::hardware_concurrency;

#[derive(Debug)]
enum WorkerPool {
    Owned(rayon::ThreadPool),
    Global,
}

#[derive(Debug)]
pub struct ParallelBackend {
    filters: FilterTable,
    pool: WorkerPool,
}

impl ParallelBackend {
    /// Build the backend and its worker pool.
    ///
    /// `supported` is the capability probe's answer; the pool is never
    /// provisioned when it is `false`.
    pub fn initialize(config: &DispatchConfig, supported: bool) -> Result<Self, InitError> {
        if !supported {
            return Err(InitError::Unsupported);
        }
        if config.filters.is_empty() {
            return Err(InitError::EmptyModule);
        }

        let pool = match config.worker_threads {
            Some(0) => return Err(InitError::PoolSize),
            _ if config.shared_pool => WorkerPool::Global,
            Some(n) => build_pool(n, &config.thread_name)?,
            None => build_pool(hardware_concurrency(), &config.thread_name)?,
        };

        let backend = Self {
            filters: config.filters.clone(),
            pool,
        };
        tracing::info!(
            threads = backend.threads(),
            shared = config.shared_pool,
            "parallel backend worker pool ready"
        );
        Ok(backend)
    }

    /// Number of workers in the pool.
    pub fn threads(&self) -> usize {
        match &self.pool {
            WorkerPool::Owned(pool) => pool.current_num_threads(),
            WorkerPool::Global => rayon::current_num_threads(),
        }
    }
}

fn build_pool(threads: usize, prefix: &str) -> Result<WorkerPool, InitError> {
    let prefix = prefix.to_string();
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(move |i| format!("{prefix}-worker-{i}"))
        .build()
        .map(WorkerPool::Owned)
        .map_err(|e| InitError::Pool(e.to_string()))
}

impl ExecutionBackend for ParallelBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Parallel
    }

    fn filters(&self) -> Vec<String> {
        self.filters.names()
    }

    fn invoke(&self, filter: &str, handle: &mut ImageHandle) -> DispatchResult<()> {
        let kernel = resolve(&self.filters, BackendKind::Parallel, filter, handle)?;
        let lanes = Zip::from(handle.pixels_mut().lanes_mut(Axis(2)));
        match &self.pool {
            WorkerPool::Owned(pool) => {
                pool.install(|| lanes.par_for_each(|mut px| kernel(&mut px)))
            }
            WorkerPool::Global => lanes.par_for_each(|mut px| kernel(&mut px)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SingleBackend;
    use crate::buffer::{Dimensions, PixelBuffer};
    use crate::error::DispatchError;

    fn gradient(dims: Dimensions) -> Vec<u8> {
        (0..dims.byte_len()).map(|i| (i * 7 % 256) as u8).collect()
    }

    #[test]
    fn test_unsupported_host_fails_init() {
        let err = ParallelBackend::initialize(&DispatchConfig::default(), false).unwrap_err();
        assert_eq!(err, InitError::Unsupported);
    }

    #[test]
    fn test_zero_threads_fails_init() {
        let config = DispatchConfig::default().with_worker_threads(0);
        let err = ParallelBackend::initialize(&config, true).unwrap_err();
        assert_eq!(err, InitError::PoolSize);
    }

    #[test]
    fn test_pool_uses_configured_size() {
        let config = DispatchConfig::default().with_worker_threads(3);
        let backend = ParallelBackend::initialize(&config, true).unwrap();
        assert_eq!(backend.threads(), 3);
    }

    #[test]
    fn test_shared_pool_uses_global_workers() {
        let config = DispatchConfig::default().with_shared_pool(true);
        let backend = ParallelBackend::initialize(&config, true).unwrap();
        assert_eq!(backend.threads(), rayon::current_num_threads());

        let dims = Dimensions::new(5, 3);
        let mut handle = backend
            .open(PixelBuffer::solid(dims, [255, 0, 0, 255]), dims)
            .unwrap();
        backend.invoke("invert", &mut handle).unwrap();
        let out = backend.read_back(handle).unwrap();
        assert!(out.as_slice().chunks(4).all(|px| px == [0, 255, 255, 255]));
    }

    #[test]
    fn test_matches_single_backend_for_every_filter() {
        let config = DispatchConfig::default().with_worker_threads(4);
        let parallel = ParallelBackend::initialize(&config, true).unwrap();
        let single = SingleBackend::initialize(&config).unwrap();
        let dims = Dimensions::new(17, 9);

        for filter in single.filters() {
            let mut a = single.open(PixelBuffer::new(gradient(dims)), dims).unwrap();
            let mut b = parallel.open(PixelBuffer::new(gradient(dims)), dims).unwrap();
            single.invoke(&filter, &mut a).unwrap();
            parallel.invoke(&filter, &mut b).unwrap();
            assert_eq!(
                single.read_back(a).unwrap(),
                parallel.read_back(b).unwrap(),
                "filter {filter} diverged"
            );
        }
    }

    #[test]
    fn test_rejects_handle_from_other_backend() {
        let config = DispatchConfig::default().with_worker_threads(2);
        let parallel = ParallelBackend::initialize(&config, true).unwrap();
        let single = SingleBackend::initialize(&config).unwrap();

        let mut handle = single
            .open(PixelBuffer::new(vec![0; 4]), Dimensions::new(1, 1))
            .unwrap();
        let err = parallel.invoke("invert", &mut handle).unwrap_err();
        assert_eq!(
            err,
            DispatchError::ForeignHandle {
                owner: BackendKind::Single,
                backend: BackendKind::Parallel,
            }
        );
        assert!(parallel.read_back(handle).is_err());
    }
}
