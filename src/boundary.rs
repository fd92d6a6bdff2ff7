//! Message-passing boundary between callers and the dispatcher.
//!
//! [`DispatchService::spawn`] starts a service thread that owns the
//! [`Dispatcher`]. Callers talk to it through a cloneable [`DispatchClient`]
//! whose methods mirror the dispatcher's but return a [`Pending`] reply
//! right away. Request and response buffers travel through the channel by
//! move, so pixels are never copied on either side.
//!
//! Backends are initialized on the service thread before the first call is
//! read from the channel: anything sent earlier simply waits, so every
//! caller sees the same initialization completion point.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::backend::BackendKind;
use crate::config::DispatchConfig;
use crate::dispatch::{Dispatcher, Request, Response};
use crate::error::{DispatchError, DispatchResult, InitError};
use crate::probe::CapabilityProbe;

type Reply<T> = Sender<DispatchResult<T>>;

enum Call {
    SupportsParallel(Reply<bool>),
    Filters {
        backend: String,
        reply: Reply<Vec<String>>,
    },
    Run {
        backend: String,
        request: Request,
        reply: Reply<Response>,
    },
    Shutdown,
}

/// Reply to a call that may not have been answered yet.
#[derive(Debug)]
pub struct Pending<T> {
    rx: Receiver<DispatchResult<T>>,
}

impl<T> Pending<T> {
    /// Block until the service answers.
    pub fn wait(self) -> DispatchResult<T> {
        self.rx.recv().map_err(|_| DispatchError::Disconnected)?
    }

    /// Non-blocking poll; `None` while the call is still in flight.
    pub fn try_wait(&self) -> Option<DispatchResult<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(DispatchError::Disconnected)),
        }
    }
}

/// Caller-side proxy for the dispatcher running on the service thread.
#[derive(Debug, Clone)]
pub struct DispatchClient {
    tx: Sender<Call>,
}

impl DispatchClient {
    fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Call) -> Pending<T> {
        let (reply, rx) = mpsc::channel();
        // A failed send drops the call and its reply sender, so `rx`
        // reports the disconnect to the waiter.
        if self.tx.send(make(reply)).is_err() {
            tracing::trace!("dispatch service gone, call dropped");
        }
        Pending { rx }
    }

    /// Resolves once backends are initialized.
    pub fn supports_parallel(&self) -> Pending<bool> {
        self.call(Call::SupportsParallel)
    }

    pub fn filters(&self, backend: &str) -> Pending<Vec<String>> {
        let backend = backend.to_string();
        self.call(|reply| Call::Filters { backend, reply })
    }

    /// Send `request` to the named backend. The buffer moves into the call.
    pub fn run(&self, backend: &str, request: Request) -> Pending<Response> {
        let backend = backend.to_string();
        self.call(|reply| Call::Run {
            backend,
            request,
            reply,
        })
    }

    pub fn run_single(&self, request: Request) -> Pending<Response> {
        self.run(BackendKind::Single.as_str(), request)
    }

    pub fn run_parallel(&self, request: Request) -> Pending<Response> {
        self.run(BackendKind::Parallel.as_str(), request)
    }
}

/// Owns the service thread. Dropping it shuts the service down.
#[derive(Debug)]
pub struct DispatchService {
    client: DispatchClient,
    thread: Option<JoinHandle<()>>,
}

impl DispatchService {
    pub fn spawn<P>(config: DispatchConfig, probe: P) -> DispatchResult<Self>
    where
        P: CapabilityProbe + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let name = format!("{}-dispatch", config.thread_name);
        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || serve(config, probe, rx))
            .map_err(|e| InitError::Spawn(e.to_string()))?;

        Ok(Self {
            client: DispatchClient { tx },
            thread: Some(thread),
        })
    }

    pub fn client(&self) -> DispatchClient {
        self.client.clone()
    }

    /// Stop reading calls and join the service thread. Runs already handed
    /// to workers still deliver their replies.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.client.tx.send(Call::Shutdown);
        if thread.join().is_err() {
            tracing::error!("dispatch service thread panicked");
        }
    }
}

impl Drop for DispatchService {
    fn drop(&mut self) {
        self.stop();
    }
}

fn serve<P: CapabilityProbe>(config: DispatchConfig, probe: P, calls: Receiver<Call>) {
    let dispatcher = Arc::new(Dispatcher::start(config, &probe));
    tracing::info!(
        supports_parallel = dispatcher.supports_parallel(),
        "dispatch service ready"
    );

    for call in calls.iter() {
        match call {
            Call::SupportsParallel(reply) => {
                let _ = reply.send(Ok(dispatcher.supports_parallel()));
            }
            Call::Filters { backend, reply } => {
                let _ = reply.send(dispatcher.filters(&backend));
            }
            Call::Run {
                backend,
                request,
                reply,
            } => {
                tracing::trace!(%backend, filter = %request.filter, "run call received");
                let dispatcher = Arc::clone(&dispatcher);
                // rayon aborts the process on a panic escaping a spawned job.
                rayon::spawn(move || {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        dispatcher.run(&backend, request)
                    }))
                    .unwrap_or_else(|payload| Err(DispatchError::from_panic(payload)));
                    if reply.send(result).is_err() {
                        tracing::trace!(%backend, "caller dropped pending run");
                    }
                });
            }
            Call::Shutdown => break,
        }
    }

    tracing::info!("dispatch service stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{Dimensions, PixelBuffer};
    use crate::filters::FilterTable;
    use ndarray::ArrayViewMut1;

    fn red_4x4(filter: &str) -> Request {
        let dims = Dimensions::new(4, 4);
        Request::new(PixelBuffer::solid(dims, [255, 0, 0, 255]), dims, filter)
    }

    #[test]
    fn test_handshake_then_single_run() {
        let service = DispatchService::spawn(DispatchConfig::default(), || false).unwrap();
        let client = service.client();

        assert!(!client.supports_parallel().wait().unwrap());

        let response = client.run_single(red_4x4("invert")).wait().unwrap();
        for px in response.buffer.as_slice().chunks(4) {
            assert_eq!(px, &[0, 255, 255, 255]);
        }
        assert!(response.elapsed_ms >= 0.0);
    }

    #[test]
    fn test_calls_queued_before_init_are_served() {
        let service = DispatchService::spawn(DispatchConfig::default(), || true).unwrap();
        let client = service.client();

        // Sent without waiting for the handshake.
        let run = client.run_single(red_4x4("grayscale"));
        let caps = client.supports_parallel();

        assert!(run.wait().is_ok());
        assert!(caps.wait().is_ok());
    }

    #[test]
    fn test_parallel_rejected_without_support() {
        let service = DispatchService::spawn(DispatchConfig::default(), || false).unwrap();
        let err = service.client().run_parallel(red_4x4("invert")).wait().unwrap_err();
        assert!(matches!(err, DispatchError::BackendUnavailable { .. }));
    }

    #[test]
    fn test_unknown_filter_is_rejected() {
        let service = DispatchService::spawn(DispatchConfig::default(), || false).unwrap();
        let err = service.client().run_single(red_4x4("melt")).wait().unwrap_err();
        assert!(matches!(err, DispatchError::UnknownFilter { .. }));
    }

    #[test]
    fn test_parallel_run_across_boundary() {
        let config = DispatchConfig::default().with_worker_threads(2);
        let service = DispatchService::spawn(config, || true).unwrap();
        let client = service.client();

        assert!(client.supports_parallel().wait().unwrap());
        let response = client.run_parallel(red_4x4("removeRed")).wait().unwrap();
        for px in response.buffer.as_slice().chunks(4) {
            assert_eq!(px, &[0, 0, 0, 255]);
        }
    }

    #[test]
    fn test_buffer_moves_without_copy() {
        let service = DispatchService::spawn(DispatchConfig::default(), || false).unwrap();
        let dims = Dimensions::new(8, 8);
        let bytes = vec![7u8; dims.byte_len()];
        let ptr = bytes.as_ptr();

        let request = Request::new(PixelBuffer::new(bytes), dims, "invert");
        let response = service.client().run_single(request).wait().unwrap();

        assert_eq!(response.buffer.as_slice().as_ptr(), ptr);
        assert!(response.buffer.as_slice().iter().all(|&b| b == 248 || b == 7));
    }

    #[test]
    fn test_concurrent_clients() {
        let service = DispatchService::spawn(DispatchConfig::default(), || false).unwrap();
        let dims = Dimensions::new(16, 16);

        let pending: Vec<_> = [[1u8, 2, 3, 255], [100, 150, 200, 10]]
            .into_iter()
            .map(|rgba| {
                let client = service.client();
                let request = Request::new(PixelBuffer::solid(dims, rgba), dims, "swapRedBlue");
                (rgba, client.run_single(request))
            })
            .collect();

        for (rgba, reply) in pending {
            let response = reply.wait().unwrap();
            for px in response.buffer.as_slice().chunks(4) {
                assert_eq!(px, &[rgba[2], rgba[1], rgba[0], rgba[3]]);
            }
        }
    }

    #[test]
    fn test_filters_across_boundary() {
        let service = DispatchService::spawn(DispatchConfig::default(), || false).unwrap();
        let names = service.client().filters("single").wait().unwrap();
        assert!(names.contains(&"invert".to_string()));
        assert!(service.client().filters("parallel").wait().is_err());
    }

    fn explode(_px: &mut ArrayViewMut1<'_, u8>) {
        panic!("kernel exploded");
    }

    #[test]
    fn test_panicking_kernel_leaves_service_running() {
        let mut filters = FilterTable::builtin();
        filters.register("explode", explode);
        let config = DispatchConfig::default()
            .with_filters(filters)
            .with_worker_threads(2);
        let service = DispatchService::spawn(config, || true).unwrap();
        let client = service.client();

        for backend in ["single", "parallel"] {
            match client.run(backend, red_4x4("explode")).wait() {
                Err(DispatchError::Panicked(msg)) => assert!(msg.contains("kernel exploded")),
                other => panic!("unexpected result on {backend}: {other:?}"),
            }
        }

        let response = client.run_single(red_4x4("invert")).wait().unwrap();
        for px in response.buffer.as_slice().chunks(4) {
            assert_eq!(px, &[0, 255, 255, 255]);
        }
        assert!(client.supports_parallel().wait().unwrap());
    }

    #[test]
    fn test_huge_dims_across_boundary() {
        let service = DispatchService::spawn(DispatchConfig::default(), || false).unwrap();
        let request = Request::new(
            PixelBuffer::new(vec![0; 4]),
            Dimensions::new(u32::MAX, u32::MAX),
            "invert",
        );
        let err = service.client().run_single(request).wait().unwrap_err();
        assert!(matches!(err, DispatchError::InvalidDimensions { .. }));
    }

    #[test]
    fn test_calls_after_shutdown_disconnect() {
        let service = DispatchService::spawn(DispatchConfig::default(), || false).unwrap();
        let client = service.client();
        service.shutdown();

        assert_eq!(
            client.supports_parallel().wait().unwrap_err(),
            DispatchError::Disconnected
        );
        let pending = client.run_single(red_4x4("invert"));
        assert_eq!(
            pending.try_wait().map(|r| r.is_err()),
            Some(true)
        );
    }
}
