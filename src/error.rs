// src/error.rs
//! Crate-wide error type aggregating the per-layer errors

use thiserror::Error;

use crate::acquisition::{ControllerError, RingBufferError};
use crate::config::loader::ConfigError;
use crate::hal::traits::HalError;
use crate::protocol::ProtocolError;

/// Top-level error for applications that mix driver layers
#[derive(Debug, Error)]
pub enum DaqError {
    /// Acquisition controller failure
    #[error(transparent)]
    Controller(#[from] ControllerError),
    /// Register protocol failure
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// Hardware abstraction failure
    #[error(transparent)]
    Hal(#[from] HalError),
    /// Ring buffer failure
    #[error(transparent)]
    Buffer(#[from] RingBufferError),
    /// Configuration loading failure
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Convenience result alias over [`DaqError`]
pub type DaqResult<T> = Result<T, DaqError>;
