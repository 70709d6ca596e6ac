// src/hal/traits.rs
//! Collaborator seams the acquisition core is driven through
//!
//! The core never touches hardware directly; everything platform-specific
//! (SPI transport, chip-select and conversion-run lines, the data-ready edge
//! interrupt) arrives through these traits. `hal::loopback` provides
//! in-memory implementations, `hal::embedded` maps `embedded-hal` types onto
//! them.

use thiserror::Error;

/// Longest bus frame the driver produces: command byte plus the widest
/// (four-channel combined) scan payload.
pub const MAX_FRAME_LEN: usize = 9;

/// Errors surfaced by collaborator implementations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HalError {
    /// Bus transfer failed
    #[error("bus transfer failed: {0}")]
    Bus(String),
    /// Chip-select line could not be driven
    #[error("chip-select line failed: {0}")]
    ChipSelect(String),
    /// GPIO line could not be driven
    #[error("gpio line failed: {0}")]
    Gpio(String),
    /// Interrupt registration failed
    #[error("interrupt line failed: {0}")]
    Interrupt(String),
}

/// Callback bound to the data-ready falling edge
pub type SampleCallback = Box<dyn FnMut() + Send>;

/// Half-duplex serial bus exchanging whole frames
pub trait BusTransport: Send {
    /// Exchange `tx.len()` bytes; `rx` must be the same length and receives
    /// the bytes clocked back during the exchange.
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), HalError>;

    /// Write-only shorthand, discarding whatever comes back
    fn write(&mut self, tx: &[u8]) -> Result<(), HalError> {
        let mut scratch = [0u8; MAX_FRAME_LEN];
        if tx.len() > scratch.len() {
            return Err(HalError::Bus(format!(
                "{}-byte frame exceeds the {}-byte transport scratch",
                tx.len(),
                scratch.len()
            )));
        }
        self.transfer(tx, &mut scratch[..tx.len()])
    }

    /// Read-only shorthand, clocking out zeros
    fn read(&mut self, rx: &mut [u8]) -> Result<(), HalError> {
        let tx = [0u8; MAX_FRAME_LEN];
        if rx.len() > tx.len() {
            return Err(HalError::Bus(format!(
                "{}-byte frame exceeds the {}-byte transport scratch",
                rx.len(),
                tx.len()
            )));
        }
        let n = rx.len();
        self.transfer(&tx[..n], rx)
    }
}

/// Chip-select bracketing around one atomic bus transaction
pub trait ChipSelect: Send {
    /// Assert the select line (electrically low on this device)
    fn assert_select(&mut self) -> Result<(), HalError>;

    /// Release the select line
    fn release_select(&mut self) -> Result<(), HalError>;
}

/// Conversion-run GPIO line; high starts continuous conversion
pub trait ConvRunLine: Send {
    /// Drive the line level
    fn set_level(&mut self, high: bool) -> Result<(), HalError>;
}

/// Registration seam for the data-ready falling-edge interrupt
pub trait SampleReadyLine: Send {
    /// Bind `callback` to the edge, replacing any previous binding
    fn attach(&mut self, callback: SampleCallback) -> Result<(), HalError>;

    /// Remove the current binding; a no-op when nothing is bound
    fn detach(&mut self) -> Result<(), HalError>;
}
