// src/hal/mod.rs
//! Hardware abstraction layer for the acquisition core

pub mod loopback;
pub mod traits;

#[cfg(feature = "embedded-hal")]
pub mod embedded;

pub use traits::*;
