//! Raw backend interface
//!
//! A backend is the layer that actually toggles voltage. It is addressed by
//! physical pin index and knows nothing about ownership, modes or timing.
//! Calls are synchronous and expected to be fast.

use crate::capability::Capabilities;
use crate::gpio::{Direction, Level, Pull, PwmMode};

/// PWM range used when a backend does not report its own
pub const DEFAULT_PWM_RANGE: u16 = 1024;

/// Errors reported by a backend
///
/// The control layer does not classify these further; they are passed up
/// to the caller unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BackendError {
    /// Register or device access failed
    Io,
    /// The peripheral is busy (e.g. ADC conversion in progress)
    Busy,
    /// The hardware rejected the requested configuration
    Rejected,
}

/// Raw per-pin hardware access
///
/// Implementations should handle the actual register manipulation for the
/// specific chip, character device or companion converter. The control
/// layer guarantees that a given index is only ever driven through the
/// handle that owns it.
pub trait Backend {
    /// Total number of addressable pins on the board
    ///
    /// Must stay constant for the lifetime of the backend.
    fn pin_count(&self) -> u8;

    /// Capability set of a physical pin
    fn capabilities(&self, index: u8) -> Capabilities;

    /// Configure direction and pull resistor of a pin
    fn configure(&mut self, index: u8, direction: Direction, pull: Pull)
        -> Result<(), BackendError>;

    /// Read the digital level of a pin
    fn read(&mut self, index: u8) -> Result<Level, BackendError>;

    /// Drive the digital level of an output pin
    fn write(&mut self, index: u8, level: Level) -> Result<(), BackendError>;

    /// Read a raw converter value
    fn analog_read(&mut self, index: u8) -> Result<u16, BackendError>;

    /// Write a raw converter value
    fn analog_write(&mut self, index: u8, value: u16) -> Result<(), BackendError>;

    /// Configure a hardware PWM cadence
    ///
    /// Only called for pins that report [`Capabilities::HARDWARE_PWM`].
    fn configure_pwm(
        &mut self,
        index: u8,
        duty: u16,
        range: u16,
        mode: PwmMode,
    ) -> Result<(), BackendError>;

    /// Stop a hardware PWM cadence
    fn stop_pwm(&mut self, index: u8) -> Result<(), BackendError> {
        let _ = index;
        Ok(())
    }

    /// Default PWM resolution (duty values range over `0..=range`)
    fn default_pwm_range(&self) -> u16 {
        DEFAULT_PWM_RANGE
    }
}
