//! Per-pin capability sets
//!
//! Capabilities are plain data reported by the backend for each physical
//! pin. The mode state machine consults them before committing a transition.

use core::ops::{BitOr, BitOrAssign};

/// Set of features a physical pin supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Capabilities(u16);

impl Capabilities {
    /// Digital input
    pub const INPUT: Self = Self(1 << 0);
    /// Digital output
    pub const OUTPUT: Self = Self(1 << 1);
    /// Internal pull-up resistor
    pub const PULL_UP: Self = Self(1 << 2);
    /// Internal pull-down resistor
    pub const PULL_DOWN: Self = Self(1 << 3);
    /// PWM output (software generated unless `HARDWARE_PWM` is also set)
    pub const PWM: Self = Self(1 << 4);
    /// PWM cadence generated by a hardware peripheral
    pub const HARDWARE_PWM: Self = Self(1 << 5);
    /// Analog input through a companion ADC
    pub const ANALOG_IN: Self = Self(1 << 6);
    /// Analog output through a companion DAC
    pub const ANALOG_OUT: Self = Self(1 << 7);

    /// No capabilities at all (e.g. power or ground header pins)
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Input/output with both pulls, the common case for a GPIO line
    pub const fn digital() -> Self {
        Self(Self::INPUT.0 | Self::OUTPUT.0 | Self::PULL_UP.0 | Self::PULL_DOWN.0)
    }

    /// Digital I/O plus software PWM
    pub const fn digital_pwm() -> Self {
        Self(Self::digital().0 | Self::PWM.0)
    }

    /// Every capability
    pub const fn all() -> Self {
        Self(0xFF)
    }

    /// Raw bit representation
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Check if every capability in `other` is present
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two sets
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Remove the capabilities in `other`
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.with(rhs)
    }
}

impl BitOrAssign for Capabilities {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.with(rhs);
    }
}
