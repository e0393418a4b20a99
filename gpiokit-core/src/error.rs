//! Error taxonomy
//!
//! Every failure is reported synchronously to the caller of the operation
//! that triggered it. Timing failures ([`Error::Timeout`]) are kept apart
//! from hard failures so callers can decide whether to retry.

use core::fmt;

use gpiokit_hal::{BackendError, Direction};

/// Errors returned by pin and registry operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Index out of addressable range or unmapped in the numbering scheme
    InvalidPinIndex(u8),
    /// The physical pin is already owned by another open handle
    PinAlreadyOpen(u8),
    /// Close requested for an index that is not open
    PinNotOpen(u8),
    /// Operation on a handle whose pin has been closed
    PinClosed,
    /// The pin's capabilities reject the requested mode
    UnsupportedPinMode,
    /// The operation needs the pin to be in the given direction
    RequiresMode(Direction),
    /// PWM duty above the configured range
    DutyOutOfRange { duty: u16, range: u16 },
    /// PWM range of zero
    InvalidPwmRange,
    /// The edge subscription was torn down (mode change or replacement)
    SubscriptionClosed,
    /// A waiter deadline passed without the awaited condition
    Timeout,
    /// Opaque failure from the hardware layer
    Backend(BackendError),
}

impl Error {
    /// Check if this is a timing failure rather than a hard failure
    pub fn is_timing(&self) -> bool {
        matches!(self, Error::Timeout)
    }
}

impl From<BackendError> for Error {
    fn from(e: BackendError) -> Self {
        Error::Backend(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::InvalidPinIndex(pin) => write!(f, "Pin {} is not a valid index", pin),
            Error::PinAlreadyOpen(pin) => write!(f, "Pin {} is already open", pin),
            Error::PinNotOpen(pin) => write!(f, "Pin {} is not open", pin),
            Error::PinClosed => write!(f, "Pin handle is closed"),
            Error::UnsupportedPinMode => write!(f, "Pin mode not supported"),
            Error::RequiresMode(direction) => write!(f, "Operation requires mode {}", direction),
            Error::DutyOutOfRange { duty, range } => {
                write!(f, "Duty {} outside of range 0..={}", duty, range)
            }
            Error::InvalidPwmRange => write!(f, "PWM range must be positive"),
            Error::SubscriptionClosed => write!(f, "Edge subscription closed"),
            Error::Timeout => write!(f, "Timed out"),
            Error::Backend(e) => write!(f, "Backend error: {:?}", e),
        }
    }
}

impl embedded_hal::digital::Error for Error {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

/// Result type for gpiokit operations
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_vs_hard_failures() {
        assert!(Error::Timeout.is_timing());
        assert!(!Error::Backend(BackendError::Io).is_timing());
        assert!(!Error::PinClosed.is_timing());
    }

    #[test]
    fn test_backend_conversion() {
        let e: Error = BackendError::Busy.into();
        assert_eq!(e, Error::Backend(BackendError::Busy));
    }
}
