// src/acquisition/mod.rs
//! Sample acquisition: lock-free buffering and the acquisition controller

pub mod controller;
pub mod ring_buffer;

pub use controller::{
    split_scan, AcquisitionController, AcquisitionState, ControllerError, ScanWord,
};
pub use ring_buffer::{RingBuffer, RingBufferError};
