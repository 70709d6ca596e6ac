//! DAQ-Core: data-acquisition driver for the MAX11043 delta-sigma converter
//!
//! This library drives a four-channel, simultaneously sampling delta-sigma
//! ADC over a half-duplex register bus. It features:
//!
//! - Hardware abstraction traits with a loopback implementation for tests
//! - Variable-width register protocol with write verification
//! - Busy-polled, deadline-bounded flash memory access
//! - Lock-free single-producer ring buffer fed from interrupt context
//! - TOML configuration with per-channel analog front-end settings
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use daq_core::acquisition::AcquisitionController;
//! use daq_core::config::AcquisitionConfig;
//! use daq_core::hal::loopback::{LoopbackBus, SoftChipSelect, SoftRunLine, SoftSampleReady};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = LoopbackBus::new();
//!     let config = AcquisitionConfig::default();
//!     let mut controller = AcquisitionController::new(
//!         bus,
//!         SoftChipSelect::new(),
//!         SoftRunLine::new(),
//!         SoftSampleReady::new(),
//!         config,
//!     );
//!
//!     controller.init()?;
//!     controller.attach_interrupt()?;
//!     controller.start_continuous()?;
//!     let samples = controller.read_samples(16)?;
//!     println!("captured {} scans", samples.len());
//!     controller.teardown()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod acquisition;
pub mod config;
pub mod error;
pub mod hal;
pub mod protocol;
pub mod registers;
pub mod utils;

// Re-export commonly used types for convenience
pub use acquisition::{
    split_scan, AcquisitionController, AcquisitionState, ControllerError, RingBuffer,
    RingBufferError, ScanWord,
};
pub use config::{AcquisitionConfig, BitMode, Channel, ChannelMask, ClockDivision};
pub use error::{DaqError, DaqResult};
pub use hal::traits::{BusTransport, ChipSelect, ConvRunLine, HalError, SampleReadyLine};
pub use protocol::{ProtocolError, RegisterProtocol};
pub use registers::Register;
pub use utils::time::{current_timestamp_nanos, TimeProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert!(!VERSION.is_empty());
        assert!(!NAME.is_empty());
    }
}
