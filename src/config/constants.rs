// src/config/constants.rs
//! Driver-wide configuration constants

/// Acquisition defaults and limits
pub mod acquisition {
    /// Default ring-buffer capacity in samples
    pub const DEFAULT_SAMPLE_CAPACITY: usize = 4096;
    /// Smallest accepted ring-buffer capacity
    pub const MIN_SAMPLE_CAPACITY: usize = 2;
    /// Largest accepted ring-buffer capacity
    pub const MAX_SAMPLE_CAPACITY: usize = 1 << 20;
    /// Default bound on the sample-count busy-wait
    pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5000;
}

/// Register-protocol defaults
pub mod protocol {
    /// Default bound on the flash busy-poll
    pub const DEFAULT_FLASH_POLL_TIMEOUT_MS: u64 = 100;
}

/// Reference wiring of the evaluation setup
pub mod pins {
    /// Chip-select GPIO
    pub const DEFAULT_CS_PIN: u8 = 6;
    /// Data-ready (sample interrupt) GPIO
    pub const DEFAULT_DATA_READY_PIN: u8 = 13;
    /// Conversion-run GPIO
    pub const DEFAULT_CONV_RUN_PIN: u8 = 19;
}
