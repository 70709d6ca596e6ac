// demos/loopback_acquire.rs
//! Full acquisition cycle against the in-memory loopback bus
//!
//! Run with `cargo run --example loopback_acquire`. A background thread plays
//! the part of the converter's data-ready line while the main thread
//! configures the device, captures a block of scans and unpacks them per
//! channel.

use std::thread;
use std::time::Duration;

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use daq_core::acquisition::{split_scan, AcquisitionController};
use daq_core::config::{AcquisitionConfig, BitMode, ChannelMask};
use daq_core::hal::loopback::{LoopbackBus, SoftChipSelect, SoftRunLine, SoftSampleReady};
use daq_core::registers::Register;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = AcquisitionConfig {
        channels: ChannelMask::A | ChannelMask::B,
        sample_capacity: 256,
        ..AcquisitionConfig::default()
    };
    let channels = config.channels;
    let bit_mode = config.bit_mode;

    let bus = LoopbackBus::new();
    let ready = SoftSampleReady::new();
    let mut controller = AcquisitionController::new(
        bus.clone(),
        SoftChipSelect::new(),
        SoftRunLine::new(),
        ready.clone(),
        config,
    );

    controller.init()?;
    controller.attach_interrupt()?;
    controller.start_continuous()?;
    info!("acquisition running, synthesizing data-ready edges");

    // Stand-in for the converter: refresh the pair result register and pulse
    // the data-ready line at a steady cadence.
    let producer = thread::spawn(move || {
        for i in 0..16u64 {
            let a = 0x1000 + i;
            let b = 0x2000 + i;
            bus.set_register(Register::AdcAbResult, (a << 16) | b);
            ready.fire();
            thread::sleep(Duration::from_millis(2));
        }
    });

    let samples = controller.read_samples(16)?;
    producer.join().expect("producer thread panicked");
    info!(count = samples.len(), "capture complete");

    for (i, &word) in samples.iter().enumerate() {
        let lanes = split_scan(word, channels, bit_mode);
        println!(
            "scan {i:2}: A={:#06x} B={:#06x}",
            lanes[0].unwrap_or(0),
            lanes[1].unwrap_or(0)
        );
    }

    controller.teardown()?;
    info!("torn down");
    Ok(())
}
