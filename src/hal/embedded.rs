// src/hal/embedded.rs
//! Adapters mapping `embedded-hal` traits onto the driver's HAL seams
//!
//! Edge-interrupt registration has no portable `embedded-hal` trait, so a
//! platform still provides its own [`SampleReadyLine`] implementation.
//!
//! [`SampleReadyLine`]: crate::hal::traits::SampleReadyLine

use core::fmt::Debug;

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use crate::hal::traits::{BusTransport, ChipSelect, ConvRunLine, HalError};

/// [`BusTransport`] over any blocking `embedded-hal` SPI bus
pub struct SpiBusTransport<B>(pub B);

impl<B> BusTransport for SpiBusTransport<B>
where
    B: SpiBus<u8> + Send,
    B::Error: Debug,
{
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), HalError> {
        self.0
            .transfer(rx, tx)
            .map_err(|e| HalError::Bus(format!("{e:?}")))?;
        self.0.flush().map_err(|e| HalError::Bus(format!("{e:?}")))
    }
}

/// Active-low [`ChipSelect`] over an `embedded-hal` output pin
pub struct ActiveLowSelect<P>(pub P);

impl<P> ChipSelect for ActiveLowSelect<P>
where
    P: OutputPin + Send,
    P::Error: Debug,
{
    fn assert_select(&mut self) -> Result<(), HalError> {
        self.0
            .set_low()
            .map_err(|e| HalError::ChipSelect(format!("{e:?}")))
    }

    fn release_select(&mut self) -> Result<(), HalError> {
        self.0
            .set_high()
            .map_err(|e| HalError::ChipSelect(format!("{e:?}")))
    }
}

/// [`ConvRunLine`] over an `embedded-hal` output pin
pub struct RunPin<P>(pub P);

impl<P> ConvRunLine for RunPin<P>
where
    P: OutputPin + Send,
    P::Error: Debug,
{
    fn set_level(&mut self, high: bool) -> Result<(), HalError> {
        let outcome = if high {
            self.0.set_high()
        } else {
            self.0.set_low()
        };
        outcome.map_err(|e| HalError::Gpio(format!("{e:?}")))
    }
}
