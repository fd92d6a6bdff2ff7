//! Runtime detection of shared-memory worker parallelism.

use std::num::NonZeroUsize;
use std::thread;

/// One-shot predicate deciding whether the parallel backend may be built.
///
/// Implementations must not panic; any detection failure answers `false`.
pub trait CapabilityProbe {
    fn probe(&self) -> bool;
}

impl<F> CapabilityProbe for F
where
    F: Fn() -> bool,
{
    fn probe(&self) -> bool {
        self()
    }
}

/// Probes the current host by spawning and joining a single thread.
///
/// On wasm32 `std::thread::spawn` is never available, even with atomics:
/// workers there come from JS, so the host answer is always `false` and the
/// embedder passes its own predicate once the pool is up.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostProbe;

impl CapabilityProbe for HostProbe {
    #[cfg(target_arch = "wasm32")]
    fn probe(&self) -> bool {
        false
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn probe(&self) -> bool {
        let spawned = thread::Builder::new()
            .name("imagestag-probe".into())
            .spawn(|| ());
        match spawned {
            Ok(handle) => handle.join().is_ok(),
            Err(err) => {
                tracing::warn!(error = %err, "worker thread probe failed");
                false
            }
        }
    }
}

/// Reported hardware concurrency, 1 when the host cannot tell.
pub fn hardware_concurrency() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
