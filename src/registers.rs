// src/registers.rs
//! MAX11043 register map and bit-field constants
//!
//! Command bytes carry the register address in the upper six bits and the
//! access flag in bit 1, so every address here is pre-shifted and the low two
//! bits are always clear.

/// Command-byte flag selecting a register read
pub const READ_FLAG: u8 = 0x02;
/// Command-byte flag selecting a register write
pub const WRITE_FLAG: u8 = 0x00;

/// Register access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Readable only (result, status and output-window registers)
    Read,
    /// Writable only (data-in and mode-select registers)
    Write,
    /// Readable and writable
    ReadWrite,
}

impl Access {
    /// Whether a read transaction is legal for this mode
    pub const fn readable(self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    /// Whether a write transaction is legal for this mode
    pub const fn writable(self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

/// MAX11043 register set
///
/// Widths are the 16-bit-conversion-mode transaction sizes; the combined
/// scan-result registers concatenate their lanes most-significant first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    /// Channel A conversion result
    AdcAResult = 0x00,
    /// Channel B conversion result
    AdcBResult = 0x04,
    /// Channel C conversion result
    AdcCResult = 0x08,
    /// Channel D conversion result
    AdcDResult = 0x0C,
    /// Channels A and B, one transaction
    AdcAbResult = 0x10,
    /// Channels C and D, one transaction
    AdcCdResult = 0x14,
    /// All four channels, one transaction
    AdcAbcdResult = 0x18,
    /// Status flags (flash busy, boot, per-channel overflow)
    Status = 0x1C,
    /// Global configuration
    Config = 0x20,
    /// Fine DAC value
    FineDacValue = 0x24,
    /// DAC step size
    DacStepSize = 0x28,
    /// Coarse DAC high/low byte pair
    CoarseDacHl = 0x2C,
    /// Channel A configuration
    AdcAConfig = 0x30,
    /// Channel B configuration
    AdcBConfig = 0x34,
    /// Channel C configuration
    AdcCConfig = 0x38,
    /// Channel D configuration
    AdcDConfig = 0x3C,
    /// Reference and buffer configuration
    RefAndBufConfig = 0x40,
    /// Channel A gain trim
    GainA = 0x44,
    /// Channel B gain trim
    GainB = 0x48,
    /// Channel C gain trim
    GainC = 0x4C,
    /// Channel D gain trim
    GainD = 0x50,
    /// Filter coefficient RAM address pointer
    FilterCoeffAddress = 0x54,
    /// Filter coefficient RAM data window
    CramDataOut = 0x58,
    /// Filter coefficient staging register
    FilterCoeffIn = 0x5C,
    /// Flash mode select command register
    FlashModeSelect = 0x60,
    /// Flash page/word address
    FlashAddress = 0x64,
    /// Flash programming data in
    FlashDataIn = 0x68,
    /// Flash data output window
    FlashDataOut = 0x6C,
}

impl Register {
    /// Pre-shifted address byte (low two bits clear)
    pub const fn addr(self) -> u8 {
        self as u8
    }

    /// Transaction payload width in bytes
    pub const fn width(self) -> usize {
        match self {
            Register::Status | Register::FilterCoeffAddress | Register::FlashModeSelect => 1,
            Register::AdcAbResult | Register::AdcCdResult => 4,
            Register::AdcAbcdResult => 8,
            Register::CramDataOut | Register::FilterCoeffIn => 4,
            _ => 2,
        }
    }

    /// Access mode for this register
    pub const fn access(self) -> Access {
        match self {
            Register::AdcAResult
            | Register::AdcBResult
            | Register::AdcCResult
            | Register::AdcDResult
            | Register::AdcAbResult
            | Register::AdcCdResult
            | Register::AdcAbcdResult
            | Register::Status
            | Register::CramDataOut
            | Register::FlashDataOut => Access::Read,
            Register::FlashModeSelect | Register::FlashDataIn => Access::Write,
            _ => Access::ReadWrite,
        }
    }
}

/// Status register flags
pub mod status {
    /// Flash controller mid-operation
    pub const FLASH_BUSY: u8 = 0x20;
    /// Boot sequence in progress
    pub const BOOT: u8 = 0x10;
    /// Channel A modulator overflow
    pub const OVERFLOW_A: u8 = 0x08;
    /// Channel B modulator overflow
    pub const OVERFLOW_B: u8 = 0x04;
    /// Channel C modulator overflow
    pub const OVERFLOW_C: u8 = 0x02;
    /// Channel D modulator overflow
    pub const OVERFLOW_D: u8 = 0x01;
}

/// Global configuration register fields
pub mod config_bits {
    /// External clock input instead of the crystal resonator
    pub const EXT_CLK_CLOCK: u16 = 1 << 15;
    /// Clock-division field position, two bits
    pub const CLK_DIV_SHIFT: u16 = 13;
    /// Low-power conversion mode
    pub const POWER_MODE_LOW: u16 = 1 << 12;
    /// Channel A power-down
    pub const CHANNEL_A_POWER_DOWN: u16 = 1 << 11;
    /// Channel B power-down
    pub const CHANNEL_B_POWER_DOWN: u16 = 1 << 10;
    /// Channel C power-down
    pub const CHANNEL_C_POWER_DOWN: u16 = 1 << 9;
    /// Channel D power-down
    pub const CHANNEL_D_POWER_DOWN: u16 = 1 << 8;
    /// Bias DAC power-down
    pub const DAC_POWER_DOWN: u16 = 1 << 7;
    /// Internal oscillator power-down
    pub const OSC_POWER_DOWN: u16 = 1 << 6;
    /// 24-bit conversion results instead of 16-bit
    pub const ADC_24_BITS: u16 = 1 << 5;
    /// Include channel A in scan mode
    pub const SCAN_A: u16 = 1 << 4;
    /// Include channel B in scan mode
    pub const SCAN_B: u16 = 1 << 3;
    /// Include channel C in scan mode
    pub const SCAN_C: u16 = 1 << 2;
    /// Include channel D in scan mode
    pub const SCAN_D: u16 = 1 << 1;
}

/// Per-channel ADC configuration register fields
pub mod adc_config_bits {
    /// Bias DAC level field position, four bits
    pub const BIAS_SHIFT: u16 = 12;
    /// Input PGA power-down
    pub const PGA_POWER_DOWN: u16 = 1 << 11;
    /// PGA gain select field position, two bits
    pub const GAIN_SHIFT: u16 = 8;
    /// Route the equalizer filter stage into the signal path
    pub const FILTER_EQ_ENABLE: u16 = 1 << 1;
    /// Low-pass decimation filter enable
    pub const FILTER_LOWPASS: u16 = 1 << 0;
}

/// Flash mode-select commands
pub mod flash_mode {
    /// Program the addressed word from FLASH_DATA_IN
    pub const PROGRAM_FROM_INPUT: u8 = 0x01;
    /// Copy the addressed word into FLASH_DATA_OUT
    pub const COPY_TO_OUTPUT: u8 = 0x02;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_leave_flag_bits_clear() {
        for reg in [
            Register::AdcAResult,
            Register::Status,
            Register::Config,
            Register::FlashDataOut,
        ] {
            assert_eq!(reg.addr() & (READ_FLAG | 0x01), 0);
        }
    }

    #[test]
    fn result_registers_are_read_only() {
        assert_eq!(Register::AdcAResult.access(), Access::Read);
        assert_eq!(Register::AdcAbcdResult.access(), Access::Read);
        assert!(!Register::Status.access().writable());
        assert!(Register::Config.access().writable());
        assert!(!Register::FlashDataIn.access().readable());
    }

    #[test]
    fn widths_match_register_class() {
        assert_eq!(Register::Status.width(), 1);
        assert_eq!(Register::Config.width(), 2);
        assert_eq!(Register::AdcAbResult.width(), 4);
        assert_eq!(Register::AdcAbcdResult.width(), 8);
        assert_eq!(Register::FilterCoeffIn.width(), 4);
    }
}
