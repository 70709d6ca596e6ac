// src/acquisition/controller.rs
//! Acquisition controller: configuration, conversion control and the
//! interrupt-context sample producer
//!
//! The controller owns the register protocol, the scan ring buffer and the
//! shared sample counter. The data-ready callback holds non-owning `Arc`
//! handles to the shared pieces, never the controller itself, and is the only
//! producer; application-context calls are the only consumer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::utils::Backoff;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::acquisition::ring_buffer::{RingBuffer, RingBufferError};
use crate::config::{AcquisitionConfig, BitMode, Channel, ChannelMask};
use crate::hal::traits::{
    BusTransport, ChipSelect, ConvRunLine, HalError, SampleCallback, SampleReadyLine,
};
use crate::protocol::{ProtocolError, RegisterProtocol};
use crate::registers::Register;
use crate::utils::time::{SystemTimeProvider, TimeProvider};

/// One raw scan read: every active lane, most significant first
pub type ScanWord = u64;

/// Controller life-cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    /// Created, device untouched
    Idle,
    /// Device configured, buffer allocated
    Configured,
    /// Continuous conversion running
    Running,
    /// Conversion halted after running; start-capable like `Configured`
    Stopped,
}

/// Acquisition controller error types
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Channel mask selects no channel
    #[error("channel mask selects no active channel")]
    NoActiveChannel,
    /// A configuration register read back a different value than written
    #[error("register write verification failed for {0:?}")]
    RegisterWriteFailed(Register),
    /// Operation not legal in the current state
    #[error("operation requires {required} state, controller is {actual:?}")]
    InvalidState {
        /// State the operation needs
        required: &'static str,
        /// State the controller is in
        actual: AcquisitionState,
    },
    /// The combined scan result would not fit one bus frame
    #[error("scan of {lanes} lanes at {bytes} bytes per sample exceeds one frame")]
    ScanTooWide {
        /// Lanes one scan read covers
        lanes: usize,
        /// Bytes per lane in the configured bit mode
        bytes: usize,
    },
    /// Sample-count wait exceeded its bound
    #[error("waited {0:?} without reaching the requested sample count")]
    Timeout(Duration),
    /// Ring buffer failure
    #[error(transparent)]
    Buffer(#[from] RingBufferError),
    /// Register protocol failure
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// Collaborator failure
    #[error(transparent)]
    Hal(#[from] HalError),
}

/// Data-acquisition driver for one converter
pub struct AcquisitionController<B, C, R, I>
where
    B: BusTransport + 'static,
    C: ChipSelect + 'static,
    R: ConvRunLine,
    I: SampleReadyLine,
{
    protocol: Arc<Mutex<RegisterProtocol<B, C>>>,
    run_line: R,
    sample_ready: I,
    config: AcquisitionConfig,
    clock: Arc<dyn TimeProvider>,
    state: AcquisitionState,
    buffer: Option<Arc<RingBuffer<ScanWord>>>,
    sample_count: Arc<AtomicU64>,
    dropped_samples: Arc<AtomicU64>,
    scan_register: Register,
    scan_width: usize,
    attached: bool,
}

impl<B, C, R, I> AcquisitionController<B, C, R, I>
where
    // The boxed sample callback owns Arc handles to the protocol, so the bus
    // and select types must outlive any borrow they might carry.
    B: BusTransport + 'static,
    C: ChipSelect + 'static,
    R: ConvRunLine,
    I: SampleReadyLine,
{
    /// Create an idle controller over the given collaborators
    pub fn new(bus: B, select: C, run_line: R, sample_ready: I, config: AcquisitionConfig) -> Self {
        let protocol = RegisterProtocol::new(bus, select)
            .with_flash_poll_timeout(config.flash_poll_timeout());
        Self {
            protocol: Arc::new(Mutex::new(protocol)),
            run_line,
            sample_ready,
            scan_register: config.channels.scan_register(),
            scan_width: config.scan_width(),
            config,
            clock: Arc::new(SystemTimeProvider),
            state: AcquisitionState::Idle,
            buffer: None,
            sample_count: Arc::new(AtomicU64::new(0)),
            dropped_samples: Arc::new(AtomicU64::new(0)),
            attached: false,
        }
    }

    /// Replace the deadline clock (tests inject a mock here)
    pub fn with_clock(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.protocol.lock().set_clock(Arc::clone(&clock));
        self.clock = clock;
        self
    }

    /// Configure the device and allocate the sample buffer
    ///
    /// Writes then verifies every active channel's configuration register,
    /// aborting on the first mismatch; registers already written stay applied
    /// and resetting the device is the caller's responsibility. The global
    /// configuration register is written last.
    pub fn init(&mut self) -> Result<(), ControllerError> {
        if self.state != AcquisitionState::Idle {
            return Err(ControllerError::InvalidState {
                required: "Idle",
                actual: self.state,
            });
        }
        let channels = self.config.channels;
        if channels.is_empty() {
            return Err(ControllerError::NoActiveChannel);
        }
        let scan_width = self.config.scan_width();
        if scan_width + 1 > crate::hal::traits::MAX_FRAME_LEN {
            let (_, lanes) = channels.scan_lanes();
            return Err(ControllerError::ScanTooWide {
                lanes,
                bytes: self.config.bit_mode.bytes_per_sample(),
            });
        }

        let channel_value = u64::from(self.config.channel_settings.register_value());
        let global_value = u64::from(self.config.global_config_value());
        {
            let mut protocol = self.protocol.lock();
            for channel in channels.iter() {
                let reg = channel.config_register();
                protocol.write(reg, channel_value)?;
                if !protocol.verify_write(reg, channel_value)? {
                    return Err(ControllerError::RegisterWriteFailed(reg));
                }
            }
            protocol.write(Register::Config, global_value)?;
        }

        let buffer = RingBuffer::new(self.config.sample_capacity)?;
        self.buffer = Some(Arc::new(buffer));
        self.scan_register = channels.scan_register();
        self.scan_width = scan_width;
        self.sample_count.store(0, Ordering::Release);
        self.state = AcquisitionState::Configured;
        debug!(
            channels = channels.bits(),
            scan_register = ?self.scan_register,
            capacity = self.config.sample_capacity,
            "acquisition configured"
        );
        Ok(())
    }

    /// Drive the conversion-run line high and enter `Running`
    pub fn start_continuous(&mut self) -> Result<(), ControllerError> {
        match self.state {
            AcquisitionState::Configured | AcquisitionState::Stopped => {}
            actual => {
                return Err(ControllerError::InvalidState {
                    required: "Configured or Stopped",
                    actual,
                })
            }
        }
        self.run_line.set_level(true)?;
        self.state = AcquisitionState::Running;
        debug!("continuous conversion started");
        Ok(())
    }

    /// Drive the conversion-run line low and enter `Stopped`
    pub fn stop(&mut self) -> Result<(), ControllerError> {
        if self.state != AcquisitionState::Running {
            return Err(ControllerError::InvalidState {
                required: "Running",
                actual: self.state,
            });
        }
        self.run_line.set_level(false)?;
        self.state = AcquisitionState::Stopped;
        debug!("continuous conversion stopped");
        Ok(())
    }

    /// Bind the sample-ready callback; a no-op when already bound
    ///
    /// The callback runs in interrupt context: one scan-register read pushed
    /// straight into the ring buffer, one counter increment, nothing that
    /// blocks or allocates. A contended protocol lock means application code
    /// is on the bus against the documented discipline; the tick is counted
    /// as dropped instead of waited out.
    pub fn attach_interrupt(&mut self) -> Result<(), ControllerError> {
        if self.attached {
            return Ok(());
        }
        let buffer = self.buffer.clone().ok_or(ControllerError::InvalidState {
            required: "Configured",
            actual: self.state,
        })?;
        let protocol = Arc::clone(&self.protocol);
        let counter = Arc::clone(&self.sample_count);
        let dropped = Arc::clone(&self.dropped_samples);
        let scan_register = self.scan_register;
        let scan_width = self.scan_width;

        let callback: SampleCallback = Box::new(move || {
            let Some(mut protocol) = protocol.try_lock() else {
                dropped.fetch_add(1, Ordering::Relaxed);
                return;
            };
            match protocol.read_scan(scan_register, scan_width) {
                Ok(word) => {
                    buffer.push(word);
                    counter.fetch_add(1, Ordering::Release);
                }
                Err(_) => {
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        });
        self.sample_ready.attach(callback)?;
        self.attached = true;
        Ok(())
    }

    /// Unbind the sample-ready callback; a no-op when not bound
    pub fn detach_interrupt(&mut self) -> Result<(), ControllerError> {
        if !self.attached {
            return Ok(());
        }
        self.sample_ready.detach()?;
        self.attached = false;
        Ok(())
    }

    /// Block until `count` samples arrived, stop conversion and drain them
    ///
    /// Busy-waits on the shared counter with a `count >= n` completion guard;
    /// samples arriving past `count` before the stop takes effect cannot
    /// write outside the buffer (every slot index is mask-bounded) and are
    /// discarded along with the counter reset. Bounded by the configured read
    /// timeout; on timeout conversion is stopped and the samples so far stay
    /// buffered.
    pub fn read_samples(&mut self, count: usize) -> Result<Vec<ScanWord>, ControllerError> {
        if self.state != AcquisitionState::Running {
            return Err(ControllerError::InvalidState {
                required: "Running",
                actual: self.state,
            });
        }
        let deadline = self
            .clock
            .now_nanos()
            .saturating_add(self.config.read_timeout().as_nanos() as u64);
        let backoff = Backoff::new();
        while (self.sample_count.load(Ordering::Acquire) as usize) < count {
            if self.clock.now_nanos() >= deadline {
                warn!(count, "sample-count wait timed out");
                self.stop()?;
                return Err(ControllerError::Timeout(self.config.read_timeout()));
            }
            backoff.snooze();
        }
        self.stop()?;
        self.sample_count.store(0, Ordering::Release);

        let buffer = self.buffer.as_ref().ok_or(ControllerError::InvalidState {
            required: "Configured",
            actual: self.state,
        })?;
        let mut samples = vec![0 as ScanWord; count];
        let drained = buffer.pop_many(&mut samples);
        samples.truncate(drained);
        Ok(samples)
    }

    /// Start free-running acquisition, binding the callback if necessary
    pub fn read_samples_continuous(&mut self) -> Result<(), ControllerError> {
        self.attach_interrupt()?;
        self.start_continuous()
    }

    /// Halt free-running acquisition; buffered samples stay available
    pub fn stop_reading(&mut self) -> Result<(), ControllerError> {
        self.stop()
    }

    /// Drain up to `out.len()` buffered scan words (consumer side)
    pub fn drain(&mut self, out: &mut [ScanWord]) -> usize {
        match &self.buffer {
            Some(buffer) => buffer.pop_many(out),
            None => 0,
        }
    }

    /// Take a single buffered scan word (consumer side)
    pub fn take_sample(&mut self) -> Result<ScanWord, ControllerError> {
        let buffer = self.buffer.as_ref().ok_or(ControllerError::InvalidState {
            required: "Configured",
            actual: self.state,
        })?;
        Ok(buffer.pop()?)
    }

    /// Samples produced since the counter was last reset
    pub fn sample_count(&self) -> u64 {
        self.sample_count.load(Ordering::Acquire)
    }

    /// Sample-ready ticks that produced no stored sample
    pub fn dropped_samples(&self) -> u64 {
        self.dropped_samples.load(Ordering::Relaxed)
    }

    /// Current life-cycle state
    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    /// Diagnostic register read, any state
    pub fn register_read(&mut self, reg: Register) -> Result<u64, ControllerError> {
        Ok(self.protocol.lock().read(reg)?)
    }

    /// Diagnostic register write, any state
    pub fn register_write(&mut self, reg: Register, value: u64) -> Result<(), ControllerError> {
        Ok(self.protocol.lock().write(reg, value)?)
    }

    /// Diagnostic flash word read
    pub fn flash_read(&mut self, address: u16) -> Result<u16, ControllerError> {
        Ok(self.protocol.lock().flash_read(address)?)
    }

    /// Diagnostic flash word write
    pub fn flash_write(&mut self, address: u16, data: u16) -> Result<(), ControllerError> {
        Ok(self.protocol.lock().flash_write(address, data)?)
    }

    /// Detach, halt conversion, release the buffer and return to `Idle`
    ///
    /// The only path back to `Idle`; a following [`init`](Self::init)
    /// reconfigures from scratch.
    pub fn teardown(&mut self) -> Result<(), ControllerError> {
        self.detach_interrupt()?;
        if self.state == AcquisitionState::Running {
            self.run_line.set_level(false)?;
        }
        self.buffer = None;
        self.sample_count.store(0, Ordering::Release);
        self.state = AcquisitionState::Idle;
        debug!("acquisition torn down");
        Ok(())
    }
}

/// Split one scan word into per-channel lane values
///
/// Lanes follow the scan register's layout for `channels`, most significant
/// first; channels outside the mask come back `None`. In 24-bit mode each
/// lane is three bytes wide; a lane whose window does not fit the 64-bit
/// word (four 24-bit lanes need 96 bits, a combination
/// [`init`](AcquisitionController::init) rejects) also comes back `None`.
pub fn split_scan(word: ScanWord, channels: ChannelMask, bit_mode: BitMode) -> [Option<u32>; 4] {
    let (lanes, lane_count) = channels.scan_lanes();
    let bytes = bit_mode.bytes_per_sample();
    let lane_bits = (bytes * 8) as u32;
    let lane_mask = (1u64 << lane_bits) - 1;

    let mut values: [Option<u32>; 4] = [None; 4];
    for (index, &lane) in lanes[..lane_count].iter().enumerate() {
        if !channels.contains(lane) {
            continue;
        }
        let shift = lane_bits * (lane_count - 1 - index) as u32;
        if shift + lane_bits > ScanWord::BITS {
            continue;
        }
        let value = (word >> shift) & lane_mask;
        let slot = match lane {
            Channel::A => 0,
            Channel::B => 1,
            Channel::C => 2,
            Channel::D => 3,
        };
        values[slot] = Some(value as u32);
    }
    values
}
