//! Runtime configuration
//!
//! Timing constants of the control layer. They are configurable rather
//! than fixed because the right values depend on the board and on how noisy
//! the attached switches are.
//!
//! Configuration can be persisted as postcard binary data (feature
//! `serde`) or written as text:
//!
//! ```text
//! # gpiokit settings
//! [gpio]
//! poll_interval_ms = 2
//! sample_interval_us = 1000
//! pwm_tick_us = 100
//! default_debounce_ms = 20
//! default_pwm_range = 0     # 0 = backend default
//! analog_threshold = 4
//! ```

use core::str::FromStr;

use embassy_time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Current configuration format version
pub const CONFIG_VERSION: u8 = 1;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Line is neither a section header, a comment nor `key = value`
    InvalidLine(usize),
    /// Section other than `[gpio]`
    UnknownSection(usize),
    /// Key not recognised
    UnknownKey(usize),
    /// Value does not parse or is out of bounds
    InvalidValue(usize),
    /// An interval that must be positive is zero
    ZeroInterval,
    /// Binary encoding failed
    Serialize,
    /// Binary decoding failed
    Deserialize,
    /// Stored configuration has another version
    VersionMismatch,
}

/// Timing and resolution settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GpioConfig {
    /// Format version
    pub version: u8,
    /// Upper bound on the sleep between two waiter polls
    pub poll_interval_ms: u16,
    /// Cadence of the edge listener sampler
    pub sample_interval_us: u32,
    /// Length of one software PWM slot
    pub pwm_tick_us: u32,
    /// Debounce window given to newly opened pins
    pub default_debounce_ms: u16,
    /// PWM range for new PWM pins (0 = backend default)
    pub default_pwm_range: u16,
    /// Minimum change reported by analog waiters
    pub analog_threshold: u16,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            poll_interval_ms: 2,
            sample_interval_us: 1000,
            pwm_tick_us: 100,
            default_debounce_ms: 0,
            default_pwm_range: 0,
            analog_threshold: 1,
        }
    }
}

impl GpioConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms as u64)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_micros(self.sample_interval_us as u64)
    }

    pub fn pwm_tick(&self) -> Duration {
        Duration::from_micros(self.pwm_tick_us as u64)
    }

    pub fn default_debounce(&self) -> Duration {
        Duration::from_millis(self.default_debounce_ms as u64)
    }

    /// Check invariants the runtime relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 || self.sample_interval_us == 0 || self.pwm_tick_us == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }

    /// Encode into `buf` as postcard binary data
    #[cfg(feature = "serde")]
    pub fn to_slice<'a>(&self, buf: &'a mut [u8]) -> Result<&'a mut [u8], ConfigError> {
        postcard::to_slice(self, buf).map_err(|_| ConfigError::Serialize)
    }

    /// Decode postcard binary data
    #[cfg(feature = "serde")]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|_| ConfigError::Deserialize)?;
        if config.version != CONFIG_VERSION {
            return Err(ConfigError::VersionMismatch);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Parse the text configuration format
///
/// Keys may appear at the top level or inside a `[gpio]` section. Missing
/// keys keep their default value.
pub fn parse_config(input: &str) -> Result<GpioConfig, ConfigError> {
    let mut config = GpioConfig::default();

    for (number, line) in input.lines().enumerate() {
        let line_no = number + 1;
        let line = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        }
        .trim();

        if line.is_empty() {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            if line[1..line.len() - 1].trim() != "gpio" {
                return Err(ConfigError::UnknownSection(line_no));
            }
            continue;
        }

        let (key, value) = line
            .split_once('=')
            .ok_or(ConfigError::InvalidLine(line_no))?;
        let key = key.trim();
        let value = value.trim();

        match key {
            "poll_interval_ms" => config.poll_interval_ms = parse_value(value, line_no)?,
            "sample_interval_us" => config.sample_interval_us = parse_value(value, line_no)?,
            "pwm_tick_us" => config.pwm_tick_us = parse_value(value, line_no)?,
            "default_debounce_ms" => config.default_debounce_ms = parse_value(value, line_no)?,
            "default_pwm_range" => config.default_pwm_range = parse_value(value, line_no)?,
            "analog_threshold" => config.analog_threshold = parse_value(value, line_no)?,
            _ => return Err(ConfigError::UnknownKey(line_no)),
        }
    }

    config.validate()?;
    Ok(config)
}

fn parse_value<T: FromStr>(value: &str, line_no: usize) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue(line_no))
}
