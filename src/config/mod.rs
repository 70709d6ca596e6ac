// src/config/mod.rs
//! Acquisition configuration: channels, clocking, per-channel analog setup

pub mod constants;
pub mod loader;

pub use loader::{load_from_path, load_from_str, ConfigError};

use std::ops::BitOr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::registers::{adc_config_bits, config_bits, Register};

/// One ADC input channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Channel A
    A,
    /// Channel B
    B,
    /// Channel C
    C,
    /// Channel D
    D,
}

impl Channel {
    const ALL: [Channel; 4] = [Channel::A, Channel::B, Channel::C, Channel::D];

    /// Single-channel mask for this channel
    pub const fn mask(self) -> ChannelMask {
        match self {
            Channel::A => ChannelMask::A,
            Channel::B => ChannelMask::B,
            Channel::C => ChannelMask::C,
            Channel::D => ChannelMask::D,
        }
    }

    /// This channel's configuration register
    pub const fn config_register(self) -> Register {
        match self {
            Channel::A => Register::AdcAConfig,
            Channel::B => Register::AdcBConfig,
            Channel::C => Register::AdcCConfig,
            Channel::D => Register::AdcDConfig,
        }
    }

    /// This channel's single-channel result register
    pub const fn result_register(self) -> Register {
        match self {
            Channel::A => Register::AdcAResult,
            Channel::B => Register::AdcBResult,
            Channel::C => Register::AdcCResult,
            Channel::D => Register::AdcDResult,
        }
    }

    /// Global-config power-down bit for this channel
    pub const fn power_down_bit(self) -> u16 {
        match self {
            Channel::A => config_bits::CHANNEL_A_POWER_DOWN,
            Channel::B => config_bits::CHANNEL_B_POWER_DOWN,
            Channel::C => config_bits::CHANNEL_C_POWER_DOWN,
            Channel::D => config_bits::CHANNEL_D_POWER_DOWN,
        }
    }

    /// Global-config scan-enable bit for this channel
    pub const fn scan_bit(self) -> u16 {
        match self {
            Channel::A => config_bits::SCAN_A,
            Channel::B => config_bits::SCAN_B,
            Channel::C => config_bits::SCAN_C,
            Channel::D => config_bits::SCAN_D,
        }
    }
}

/// Set of active channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelMask(u8);

impl ChannelMask {
    /// Channel A only
    pub const A: ChannelMask = ChannelMask(0x1);
    /// Channel B only
    pub const B: ChannelMask = ChannelMask(0x2);
    /// Channel C only
    pub const C: ChannelMask = ChannelMask(0x4);
    /// Channel D only
    pub const D: ChannelMask = ChannelMask(0x8);
    /// All four channels
    pub const ALL: ChannelMask = ChannelMask(0xF);
    /// No channels
    pub const NONE: ChannelMask = ChannelMask(0x0);

    /// Build a mask from raw bits; anything above the four channel bits is
    /// discarded
    pub const fn from_bits(bits: u8) -> Self {
        ChannelMask(bits & 0xF)
    }

    /// Raw channel bits
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether no channel is selected
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of selected channels
    pub const fn count(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether `channel` is selected
    pub const fn contains(self, channel: Channel) -> bool {
        self.0 & channel.mask().0 != 0
    }

    /// Selected channels in A..D order
    pub fn iter(self) -> impl Iterator<Item = Channel> {
        Channel::ALL.into_iter().filter(move |ch| self.contains(*ch))
    }

    /// The result register one scan read covers for this mask
    ///
    /// Single channels and the adjacent A+B / C+D pairs have dedicated
    /// registers; any other combination falls back to the four-channel
    /// combined result and inactive lanes are skipped at unpack time.
    pub fn scan_register(self) -> Register {
        match self {
            ChannelMask::A => Register::AdcAResult,
            ChannelMask::B => Register::AdcBResult,
            ChannelMask::C => Register::AdcCResult,
            ChannelMask::D => Register::AdcDResult,
            ChannelMask(0x3) => Register::AdcAbResult,
            ChannelMask(0xC) => Register::AdcCdResult,
            _ => Register::AdcAbcdResult,
        }
    }

    /// Lanes present in one scan word for this mask, most significant first
    pub fn scan_lanes(self) -> ([Channel; 4], usize) {
        let mut lanes = [Channel::A; 4];
        let mut count = 0;
        let spans_all = !matches!(
            self,
            ChannelMask::A
                | ChannelMask::B
                | ChannelMask::C
                | ChannelMask::D
                | ChannelMask(0x3)
                | ChannelMask(0xC)
        );
        for ch in Channel::ALL {
            if spans_all || self.contains(ch) {
                lanes[count] = ch;
                count += 1;
            }
        }
        (lanes, count)
    }
}

impl BitOr for ChannelMask {
    type Output = ChannelMask;

    fn bitor(self, rhs: ChannelMask) -> ChannelMask {
        ChannelMask(self.0 | rhs.0)
    }
}

/// Conversion clock division
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockDivision {
    /// Divide by 2
    Div2,
    /// Divide by 3
    Div3,
    /// Divide by 4
    Div4,
    /// Divide by 6
    Div6,
}

impl ClockDivision {
    /// Field value for the global configuration register
    pub const fn config_bits(self) -> u16 {
        let selector = match self {
            ClockDivision::Div2 => 0,
            ClockDivision::Div3 => 1,
            ClockDivision::Div4 => 2,
            ClockDivision::Div6 => 3,
        };
        selector << config_bits::CLK_DIV_SHIFT
    }
}

/// Conversion result width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitMode {
    /// 16-bit results
    Bits16,
    /// 24-bit results
    Bits24,
}

impl BitMode {
    /// Bytes one channel lane occupies in a scan word
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            BitMode::Bits16 => 2,
            BitMode::Bits24 => 3,
        }
    }

    /// Field value for the global configuration register
    pub const fn config_bits(self) -> u16 {
        match self {
            BitMode::Bits16 => 0,
            BitMode::Bits24 => config_bits::ADC_24_BITS,
        }
    }
}

/// PGA gain step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PgaGain {
    /// Unity gain
    X1,
    /// Gain of 2
    X2,
    /// Gain of 4
    X4,
    /// Gain of 8
    X8,
}

impl PgaGain {
    const fn field(self) -> u16 {
        match self {
            PgaGain::X1 => 0,
            PgaGain::X2 => 1,
            PgaGain::X4 => 2,
            PgaGain::X8 => 3,
        }
    }
}

/// Digital filter routing for a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Decimation low-pass only
    Lowpass,
    /// Low-pass plus equalizer stage
    Equalizer,
    /// Raw modulator output
    Bypass,
}

/// Analog front-end setup shared by every active channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Bias DAC level, sixteen steps from 0.33 to 0.65 AVDD, clamped to the
    /// 4-bit field
    #[serde(default)]
    pub bias_level: u8,
    /// Whether the input PGA is powered
    #[serde(default = "defaults::pga_powered")]
    pub pga_powered: bool,
    /// PGA gain step
    #[serde(default = "defaults::pga_gain")]
    pub gain: PgaGain,
    /// Filter routing
    #[serde(default = "defaults::filter")]
    pub filter: FilterMode,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            bias_level: 0,
            pga_powered: true,
            gain: PgaGain::X1,
            filter: FilterMode::Lowpass,
        }
    }
}

impl ChannelSettings {
    /// Encode these settings as a channel-configuration register value
    pub fn register_value(&self) -> u16 {
        let mut value = u16::from(self.bias_level.min(0xF)) << adc_config_bits::BIAS_SHIFT;
        if !self.pga_powered {
            value |= adc_config_bits::PGA_POWER_DOWN;
        }
        value |= self.gain.field() << adc_config_bits::GAIN_SHIFT;
        value |= match self.filter {
            FilterMode::Lowpass => adc_config_bits::FILTER_LOWPASS,
            FilterMode::Equalizer => {
                adc_config_bits::FILTER_LOWPASS | adc_config_bits::FILTER_EQ_ENABLE
            }
            FilterMode::Bypass => 0,
        };
        value
    }
}

/// Complete acquisition configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Channels to convert
    #[serde(default = "defaults::channels")]
    pub channels: ChannelMask,
    /// Conversion clock division
    #[serde(default = "defaults::clock_division")]
    pub clock_division: ClockDivision,
    /// Result width
    #[serde(default = "defaults::bit_mode")]
    pub bit_mode: BitMode,
    /// Analog setup applied to every active channel
    #[serde(default)]
    pub channel_settings: ChannelSettings,
    /// Ring-buffer capacity in samples, must be a power of two
    #[serde(default = "defaults::sample_capacity")]
    pub sample_capacity: usize,
    /// Bound on the flash busy-poll, milliseconds
    #[serde(default = "defaults::flash_poll_timeout_ms")]
    pub flash_poll_timeout_ms: u64,
    /// Bound on the sample-count busy-wait, milliseconds
    #[serde(default = "defaults::read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            channels: defaults::channels(),
            clock_division: defaults::clock_division(),
            bit_mode: defaults::bit_mode(),
            channel_settings: ChannelSettings::default(),
            sample_capacity: defaults::sample_capacity(),
            flash_poll_timeout_ms: defaults::flash_poll_timeout_ms(),
            read_timeout_ms: defaults::read_timeout_ms(),
        }
    }
}

impl AcquisitionConfig {
    /// Global configuration register value for this setup
    ///
    /// Inactive channels are powered down, active channels are scan-enabled;
    /// the bias DAC is powered down since the driver never uses it.
    pub fn global_config_value(&self) -> u16 {
        let mut value = self.clock_division.config_bits()
            | self.bit_mode.config_bits()
            | config_bits::DAC_POWER_DOWN;
        for channel in Channel::ALL {
            if self.channels.contains(channel) {
                value |= channel.scan_bit();
            } else {
                value |= channel.power_down_bit();
            }
        }
        value
    }

    /// Bytes one scan read occupies for this setup
    pub fn scan_width(&self) -> usize {
        let (_, lanes) = self.channels.scan_lanes();
        lanes * self.bit_mode.bytes_per_sample()
    }

    /// Flash busy-poll bound as a duration
    pub fn flash_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.flash_poll_timeout_ms)
    }

    /// Sample-count wait bound as a duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

mod defaults {
    use super::constants::{acquisition, protocol};
    use super::{BitMode, ChannelMask, ClockDivision, FilterMode, PgaGain};

    pub fn channels() -> ChannelMask {
        ChannelMask::ALL
    }

    pub fn clock_division() -> ClockDivision {
        ClockDivision::Div2
    }

    pub fn bit_mode() -> BitMode {
        BitMode::Bits16
    }

    pub fn sample_capacity() -> usize {
        acquisition::DEFAULT_SAMPLE_CAPACITY
    }

    pub fn flash_poll_timeout_ms() -> u64 {
        protocol::DEFAULT_FLASH_POLL_TIMEOUT_MS
    }

    pub fn read_timeout_ms() -> u64 {
        acquisition::DEFAULT_READ_TIMEOUT_MS
    }

    pub fn pga_powered() -> bool {
        true
    }

    pub fn pga_gain() -> PgaGain {
        PgaGain::X1
    }

    pub fn filter() -> FilterMode {
        FilterMode::Lowpass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::config_bits;

    #[test]
    fn mask_iteration_follows_channel_order() {
        let mask = ChannelMask::A | ChannelMask::C;
        let selected: Vec<Channel> = mask.iter().collect();
        assert_eq!(selected, vec![Channel::A, Channel::C]);
        assert_eq!(mask.count(), 2);
        assert!(!mask.is_empty());
        assert!(ChannelMask::NONE.is_empty());
    }

    #[test]
    fn scan_register_prefers_dedicated_windows() {
        assert_eq!(ChannelMask::A.scan_register(), Register::AdcAResult);
        assert_eq!(
            (ChannelMask::A | ChannelMask::B).scan_register(),
            Register::AdcAbResult
        );
        assert_eq!(
            (ChannelMask::C | ChannelMask::D).scan_register(),
            Register::AdcCdResult
        );
        // No dedicated A+C window: fall back to the combined result.
        assert_eq!(
            (ChannelMask::A | ChannelMask::C).scan_register(),
            Register::AdcAbcdResult
        );
        assert_eq!(ChannelMask::ALL.scan_register(), Register::AdcAbcdResult);
    }

    #[test]
    fn sparse_masks_span_all_four_lanes() {
        let (_, lanes) = (ChannelMask::A | ChannelMask::C).scan_lanes();
        assert_eq!(lanes, 4);
        let (_, lanes) = (ChannelMask::A | ChannelMask::B).scan_lanes();
        assert_eq!(lanes, 2);
        let (_, lanes) = ChannelMask::D.scan_lanes();
        assert_eq!(lanes, 1);
    }

    #[test]
    fn global_config_powers_down_inactive_channels() {
        let config = AcquisitionConfig {
            channels: ChannelMask::A | ChannelMask::B,
            clock_division: ClockDivision::Div4,
            ..Default::default()
        };
        let value = config.global_config_value();

        assert_ne!(value & config_bits::SCAN_A, 0);
        assert_ne!(value & config_bits::SCAN_B, 0);
        assert_eq!(value & config_bits::SCAN_C, 0);
        assert_ne!(value & config_bits::CHANNEL_C_POWER_DOWN, 0);
        assert_ne!(value & config_bits::CHANNEL_D_POWER_DOWN, 0);
        assert_eq!(value & config_bits::CHANNEL_A_POWER_DOWN, 0);
        assert_ne!(value & config_bits::DAC_POWER_DOWN, 0);
        assert_eq!(value >> config_bits::CLK_DIV_SHIFT & 0x3, 2);
    }

    #[test]
    fn channel_settings_encode_filter_and_gain() {
        let settings = ChannelSettings {
            bias_level: 0xC,
            pga_powered: false,
            gain: PgaGain::X8,
            filter: FilterMode::Equalizer,
        };
        let value = settings.register_value();

        assert_eq!(value >> adc_config_bits::BIAS_SHIFT & 0xF, 0xC);
        assert_ne!(value & adc_config_bits::PGA_POWER_DOWN, 0);
        assert_eq!(value >> adc_config_bits::GAIN_SHIFT & 0x3, 3);
        assert_ne!(value & adc_config_bits::FILTER_LOWPASS, 0);
        assert_ne!(value & adc_config_bits::FILTER_EQ_ENABLE, 0);
    }

    #[test]
    fn bias_level_covers_all_sixteen_steps() {
        // 0x0 through 0xF are real bias voltages; only out-of-range input
        // clamps.
        for level in 0u8..=0xF {
            let settings = ChannelSettings {
                bias_level: level,
                ..ChannelSettings::default()
            };
            let value = settings.register_value();
            assert_eq!(value >> adc_config_bits::BIAS_SHIFT & 0xF, u16::from(level));
        }

        let settings = ChannelSettings {
            bias_level: 0x1F,
            ..ChannelSettings::default()
        };
        assert_eq!(
            settings.register_value() >> adc_config_bits::BIAS_SHIFT & 0xF,
            0xF
        );
    }

    #[test]
    fn scan_width_tracks_mode_and_mask() {
        let mut config = AcquisitionConfig::default();
        assert_eq!(config.scan_width(), 8);
        config.channels = ChannelMask::A;
        assert_eq!(config.scan_width(), 2);
        config.bit_mode = BitMode::Bits24;
        assert_eq!(config.scan_width(), 3);
    }
}
