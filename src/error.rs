//! Error types for backend initialization and dispatch.
//!
//! Initialization failures are fatal for the backend they hit: the
//! dispatcher records them and answers later calls against that backend
//! with [`DispatchError::BackendUnavailable`].

use std::any::Any;

use crate::backend::BackendKind;

pub type DispatchResult<T> = Result<T, DispatchError>;

/// Why a backend could not be brought up.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    #[error("filter module exposes no transforms")]
    EmptyModule,

    #[error("host does not support shared-memory worker threads")]
    Unsupported,

    #[error("worker pool size must be >= 1 when set")]
    PoolSize,

    #[error("failed to build worker pool: {0}")]
    Pool(String),

    #[error("failed to spawn service thread: {0}")]
    Spawn(String),
}

/// Every failure a caller can observe from [`crate::Dispatcher::run`] or
/// across the service boundary.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("backend '{backend}' unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    #[error("unknown filter '{filter}' on {backend} backend")]
    UnknownFilter { backend: BackendKind, filter: String },

    #[error("buffer of {actual} bytes does not match {width}x{height} RGBA ({expected} bytes)")]
    InvalidDimensions {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("image handle opened by {owner} backend used on {backend} backend")]
    ForeignHandle {
        owner: BackendKind,
        backend: BackendKind,
    },

    #[error("initialization error: {0}")]
    Init(#[from] InitError),

    #[error("dispatch service disconnected")]
    Disconnected,

    #[error("filter panicked: {0}")]
    Panicked(String),

    #[error("image of {height}x{width}x{channels} is not an RGBA (H, W, 4) array")]
    InvalidShape {
        height: usize,
        width: usize,
        channels: usize,
    },
}

impl DispatchError {
    pub fn unavailable(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    pub fn unknown_filter(backend: BackendKind, filter: impl Into<String>) -> Self {
        Self::UnknownFilter {
            backend,
            filter: filter.into(),
        }
    }

    /// Turn a payload caught by `catch_unwind` into [`DispatchError::Panicked`].
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panicked(message)
    }
}
