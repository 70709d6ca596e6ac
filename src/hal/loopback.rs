// src/hal/loopback.rs
//! In-memory HAL implementations for tests and demos
//!
//! [`LoopbackBus`] behaves like a device that latches every written register
//! and echoes it back on reads, including a small flash-controller model with
//! a programmable busy countdown. The `Soft*` lines record what the driver
//! does to them. All handles are cheap clones over shared state so a test can
//! keep inspecting the bus after moving it into the controller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::hal::traits::{
    BusTransport, ChipSelect, ConvRunLine, HalError, SampleCallback, SampleReadyLine,
};
use crate::registers::{flash_mode, status, Register, READ_FLAG};

fn decode_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

fn encode_be(value: u64, width: usize, out: &mut [u8]) {
    let be = value.to_be_bytes();
    out[..width].copy_from_slice(&be[8 - width..]);
}

#[derive(Default)]
struct BusState {
    regs: HashMap<u8, Vec<u8>>,
    read_overrides: HashMap<u8, Vec<u8>>,
    write_log: Vec<(u8, u64)>,
    flash_cells: HashMap<u64, u64>,
    busy_polls_left: u32,
    busy_polls_per_command: u32,
    busy_forever: bool,
}

/// Echoing bus: reads return the last value written to the same address
#[derive(Clone, Default)]
pub struct LoopbackBus {
    inner: Arc<Mutex<BusState>>,
}

impl LoopbackBus {
    /// Create a bus with empty registers and an idle flash controller
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the flash-busy status bit for `polls` reads after every flash
    /// mode-select command
    pub fn with_flash_busy_polls(self, polls: u32) -> Self {
        self.inner.lock().busy_polls_per_command = polls;
        self
    }

    /// Keep the flash-busy bit set forever (timeout testing)
    pub fn with_flash_stuck_busy(self) -> Self {
        self.inner.lock().busy_forever = true;
        self
    }

    /// Preload a register so subsequent reads observe `value`
    pub fn set_register(&self, reg: Register, value: u64) {
        let mut bytes = vec![0u8; reg.width()];
        encode_be(value, reg.width(), &mut bytes);
        self.inner.lock().regs.insert(reg.addr(), bytes);
    }

    /// Force reads of `reg` to observe `value` no matter what was written
    pub fn override_read(&self, reg: Register, value: u64) {
        let mut bytes = vec![0u8; reg.width()];
        encode_be(value, reg.width(), &mut bytes);
        self.inner.lock().read_overrides.insert(reg.addr(), bytes);
    }

    /// Every write issued so far as `(address, value)` pairs, oldest first
    pub fn writes(&self) -> Vec<(u8, u64)> {
        self.inner.lock().write_log.clone()
    }

    /// Last value written to `reg`, if any
    pub fn last_written(&self, reg: Register) -> Option<u64> {
        self.inner
            .lock()
            .regs
            .get(&reg.addr())
            .map(|bytes| decode_be(bytes))
    }
}

impl BusState {
    fn respond(&mut self, addr: u8, rx: &mut [u8]) {
        rx.fill(0);
        if addr == Register::Status.addr() {
            let busy = self.busy_forever || self.busy_polls_left > 0;
            self.busy_polls_left = self.busy_polls_left.saturating_sub(1);
            if busy {
                rx[0] = status::FLASH_BUSY;
            }
            return;
        }
        let source = self.read_overrides.get(&addr).or_else(|| self.regs.get(&addr));
        if let Some(bytes) = source {
            let n = rx.len().min(bytes.len());
            rx[..n].copy_from_slice(&bytes[..n]);
        }
    }

    fn latch(&mut self, addr: u8, payload: &[u8]) {
        let value = decode_be(payload);
        self.regs.insert(addr, payload.to_vec());
        self.write_log.push((addr, value));

        if addr == Register::FlashModeSelect.addr() {
            let address = self
                .regs
                .get(&Register::FlashAddress.addr())
                .map(|b| decode_be(b))
                .unwrap_or(0);
            match payload.first().copied().unwrap_or(0) {
                flash_mode::PROGRAM_FROM_INPUT => {
                    let data = self
                        .regs
                        .get(&Register::FlashDataIn.addr())
                        .map(|b| decode_be(b))
                        .unwrap_or(0);
                    self.flash_cells.insert(address, data);
                }
                flash_mode::COPY_TO_OUTPUT => {
                    let data = self.flash_cells.get(&address).copied().unwrap_or(0);
                    let mut bytes = vec![0u8; Register::FlashDataOut.width()];
                    encode_be(data, bytes.len(), &mut bytes);
                    self.regs.insert(Register::FlashDataOut.addr(), bytes);
                }
                _ => {}
            }
            self.busy_polls_left = self.busy_polls_per_command;
        }
    }
}

impl BusTransport for LoopbackBus {
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), HalError> {
        if tx.len() != rx.len() {
            return Err(HalError::Bus(format!(
                "tx/rx length mismatch: {} vs {}",
                tx.len(),
                rx.len()
            )));
        }
        let Some((&command, payload)) = tx.split_first() else {
            return Err(HalError::Bus("empty frame".into()));
        };
        let addr = command & !(READ_FLAG | 0x01);
        let mut state = self.inner.lock();
        if command & READ_FLAG != 0 {
            rx[0] = 0;
            state.respond(addr, &mut rx[1..]);
        } else {
            state.latch(addr, payload);
            rx.fill(0);
        }
        Ok(())
    }
}

/// Chip-select line recording its level and assert/release cycle count
#[derive(Clone, Default)]
pub struct SoftChipSelect {
    asserted: Arc<AtomicBool>,
    cycles: Arc<AtomicUsize>,
}

impl SoftChipSelect {
    /// Create a released select line
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the line is currently asserted
    pub fn is_asserted(&self) -> bool {
        self.asserted.load(Ordering::Acquire)
    }

    /// Completed assert/release cycles
    pub fn cycles(&self) -> usize {
        self.cycles.load(Ordering::Acquire)
    }
}

impl ChipSelect for SoftChipSelect {
    fn assert_select(&mut self) -> Result<(), HalError> {
        self.asserted.store(true, Ordering::Release);
        Ok(())
    }

    fn release_select(&mut self) -> Result<(), HalError> {
        if self.asserted.swap(false, Ordering::AcqRel) {
            self.cycles.fetch_add(1, Ordering::AcqRel);
        }
        Ok(())
    }
}

/// Conversion-run line recording its last driven level
#[derive(Clone, Default)]
pub struct SoftRunLine {
    high: Arc<AtomicBool>,
}

impl SoftRunLine {
    /// Create a low run line
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the line is currently driven high
    pub fn is_high(&self) -> bool {
        self.high.load(Ordering::Acquire)
    }
}

impl ConvRunLine for SoftRunLine {
    fn set_level(&mut self, high: bool) -> Result<(), HalError> {
        self.high.store(high, Ordering::Release);
        Ok(())
    }
}

/// Data-ready line whose edges are fired by the test
#[derive(Clone, Default)]
pub struct SoftSampleReady {
    callback: Arc<Mutex<Option<SampleCallback>>>,
}

impl SoftSampleReady {
    /// Create an unbound line
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate one falling edge, invoking the bound callback if any
    pub fn fire(&self) {
        if let Some(callback) = self.callback.lock().as_mut() {
            callback();
        }
    }

    /// Whether a callback is currently bound
    pub fn is_bound(&self) -> bool {
        self.callback.lock().is_some()
    }
}

impl SampleReadyLine for SoftSampleReady {
    fn attach(&mut self, callback: SampleCallback) -> Result<(), HalError> {
        *self.callback.lock() = Some(callback);
        Ok(())
    }

    fn detach(&mut self) -> Result<(), HalError> {
        *self.callback.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latches_writes_and_echoes_reads() {
        let mut bus = LoopbackBus::new();
        let frame = [Register::Config.addr(), 0x12, 0x34];
        let mut sink = [0u8; 3];
        bus.transfer(&frame, &mut sink).unwrap();

        let tx = [Register::Config.addr() | READ_FLAG, 0, 0];
        let mut rx = [0u8; 3];
        bus.transfer(&tx, &mut rx).unwrap();
        assert_eq!(&rx[1..], &[0x12, 0x34]);
        assert_eq!(bus.last_written(Register::Config), Some(0x1234));
    }

    #[test]
    fn status_busy_counts_down() {
        let mut bus = LoopbackBus::new().with_flash_busy_polls(2);
        let mode = [Register::FlashModeSelect.addr(), flash_mode::COPY_TO_OUTPUT];
        let mut sink = [0u8; 2];
        bus.transfer(&mode, &mut sink).unwrap();

        let tx = [Register::Status.addr() | READ_FLAG, 0];
        let mut rx = [0u8; 2];
        bus.transfer(&tx, &mut rx).unwrap();
        assert_eq!(rx[1], status::FLASH_BUSY);
        bus.transfer(&tx, &mut rx).unwrap();
        assert_eq!(rx[1], status::FLASH_BUSY);
        bus.transfer(&tx, &mut rx).unwrap();
        assert_eq!(rx[1], 0);
    }

    #[test]
    fn soft_lines_record_levels() {
        let mut run = SoftRunLine::new();
        let observer = run.clone();
        run.set_level(true).unwrap();
        assert!(observer.is_high());
        run.set_level(false).unwrap();
        assert!(!observer.is_high());

        let mut cs = SoftChipSelect::new();
        cs.assert_select().unwrap();
        assert!(cs.is_asserted());
        cs.release_select().unwrap();
        assert!(!cs.is_asserted());
        assert_eq!(cs.cycles(), 1);
    }

    #[test]
    fn sample_ready_fires_bound_callback() {
        let mut line = SoftSampleReady::new();
        let trigger = line.clone();
        let hits = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&hits);
        line.attach(Box::new(move || {
            counted.fetch_add(1, Ordering::Relaxed);
        }))
        .unwrap();

        trigger.fire();
        trigger.fire();
        assert_eq!(hits.load(Ordering::Relaxed), 2);

        line.detach().unwrap();
        trigger.fire();
        assert_eq!(hits.load(Ordering::Relaxed), 2);
    }
}
