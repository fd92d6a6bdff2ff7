//! The dispatcher: backend registration, capability query and timed runs.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use web_time::Instant;

use crate::backend::{BackendKind, ExecutionBackend, ParallelBackend, SingleBackend};
use crate::buffer::{Dimensions, PixelBuffer};
use crate::config::DispatchConfig;
use crate::error::{DispatchError, DispatchResult, InitError};
use crate::probe::CapabilityProbe;

/// One filter invocation: the pixels (moved in), their canvas size and the
/// transform name.
#[derive(Debug)]
pub struct Request {
    pub buffer: PixelBuffer,
    pub dims: Dimensions,
    pub filter: String,
}

impl Request {
    pub fn new(buffer: PixelBuffer, dims: Dimensions, filter: impl Into<String>) -> Self {
        Self {
            buffer,
            dims,
            filter: filter.into(),
        }
    }
}

/// Transformed pixels plus the time spent inside the transform alone.
#[derive(Debug)]
pub struct Response {
    pub buffer: PixelBuffer,
    pub elapsed_ms: f64,
}

/// State of one entry in the registration table.
#[derive(Debug)]
pub enum Registration {
    Ready(Box<dyn ExecutionBackend>),
    Failed(InitError),
}

/// Routes requests to the registered backends.
///
/// The registration table is filled by [`Dispatcher::start`] and never
/// changes afterwards, so `run` can be called from any number of threads.
#[derive(Debug)]
pub struct Dispatcher {
    backends: HashMap<BackendKind, Registration>,
    supports_parallel: bool,
}

impl Dispatcher {
    /// Probe the host once and bring up every backend it allows.
    pub fn start(config: DispatchConfig, probe: &impl CapabilityProbe) -> Self {
        let probed = config.parallel && probe.probe();
        if !probed {
            tracing::warn!(
                enabled = config.parallel,
                "parallel execution unavailable, only the single backend will serve requests"
            );
        }

        let mut backends = HashMap::new();
        backends.insert(
            BackendKind::Single,
            register(BackendKind::Single, SingleBackend::initialize(&config)),
        );
        if probed {
            backends.insert(
                BackendKind::Parallel,
                register(
                    BackendKind::Parallel,
                    ParallelBackend::initialize(&config, probed),
                ),
            );
        }

        let supports_parallel = matches!(
            backends.get(&BackendKind::Parallel),
            Some(Registration::Ready(_))
        );

        Self {
            backends,
            supports_parallel,
        }
    }

    /// Whether `run("parallel", ..)` can succeed. Fixed at startup.
    pub fn supports_parallel(&self) -> bool {
        self.supports_parallel
    }

    fn backend(&self, name: &str) -> DispatchResult<&dyn ExecutionBackend> {
        let kind: BackendKind = name.parse()?;
        match self.backends.get(&kind) {
            Some(Registration::Ready(backend)) => Ok(&**backend),
            Some(Registration::Failed(err)) => Err(DispatchError::unavailable(
                name,
                format!("initialization failed: {err}"),
            )),
            None => Err(DispatchError::unavailable(
                name,
                "parallel execution is not supported on this host",
            )),
        }
    }

    /// Filter names the given backend exposes.
    pub fn filters(&self, backend: &str) -> DispatchResult<Vec<String>> {
        Ok(self.backend(backend)?.filters())
    }

    /// Run `request` on the backend called `backend`.
    ///
    /// Only the `invoke` call is timed; opening and reading back the handle
    /// are excluded so timings compare across backends. A panicking kernel
    /// is reported as [`DispatchError::Panicked`] and its buffer is dropped.
    pub fn run(&self, backend: &str, request: Request) -> DispatchResult<Response> {
        let exec = self.backend(backend)?;
        let Request {
            buffer,
            dims,
            filter,
        } = request;

        let mut handle = exec.open(buffer, dims)?;

        let start = Instant::now();
        panic::catch_unwind(AssertUnwindSafe(|| exec.invoke(&filter, &mut handle)))
            .map_err(|payload| {
                let err = DispatchError::from_panic(payload);
                tracing::error!(backend = %exec.kind(), filter = %filter, error = %err, "filter panicked");
                err
            })??;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let handle_dims = handle.dims();
        tracing::debug!(
            backend = %handle.owner(),
            filter = %filter,
            width = handle_dims.width,
            height = handle_dims.height,
            elapsed_ms,
            "filter applied"
        );

        let buffer = exec.read_back(handle)?;
        Ok(Response { buffer, elapsed_ms })
    }

    pub fn run_single(&self, request: Request) -> DispatchResult<Response> {
        self.run(BackendKind::Single.as_str(), request)
    }

    pub fn run_parallel(&self, request: Request) -> DispatchResult<Response> {
        self.run(BackendKind::Parallel.as_str(), request)
    }
}

fn register<B>(kind: BackendKind, init: Result<B, InitError>) -> Registration
where
    B: ExecutionBackend + 'static,
{
    match init {
        Ok(backend) => {
            tracing::info!(backend = %kind, "backend registered");
            Registration::Ready(Box::new(backend))
        }
        Err(err) => {
            tracing::warn!(backend = %kind, error = %err, "backend failed to initialize");
            Registration::Failed(err)
        }
    }
}
