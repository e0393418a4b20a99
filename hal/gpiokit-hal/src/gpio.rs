//! GPIO pin vocabulary
//!
//! Logic levels, pin directions, pull resistor states and PWM scheduling
//! modes. Direction and pull are kept as separate types; which combinations
//! are legal is decided by the mode state machine above the backend.

use core::fmt;
use core::ops::Not;

/// Pin logic level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    #[default]
    Low,
    High,
}

impl Level {
    /// Check if the level is high (logic 1)
    pub fn is_high(self) -> bool {
        self == Level::High
    }

    /// Check if the level is low (logic 0)
    pub fn is_low(self) -> bool {
        self == Level::Low
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl From<Level> for bool {
    fn from(level: Level) -> Self {
        level.is_high()
    }
}

impl Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Low => write!(f, "Low"),
            Level::High => write!(f, "High"),
        }
    }
}

/// Signal direction of a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Digital input (the only direction where pull resistors apply)
    #[default]
    Input,
    /// Digital output
    Output,
    /// Pulse-width modulated output
    Pwm,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => write!(f, "In"),
            Direction::Output => write!(f, "Out"),
            Direction::Pwm => write!(f, "Pwm"),
        }
    }
}

/// Built-in pull resistor state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    #[default]
    None,
    Down,
    Up,
}

impl fmt::Display for Pull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pull::None => write!(f, "PullNone"),
            Pull::Down => write!(f, "PullDown"),
            Pull::Up => write!(f, "PullUp"),
        }
    }
}

/// How the high time of a PWM period is laid out
///
/// Both modes produce the same duty ratio; they differ only in how the
/// "on" time is scheduled across the period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PwmMode {
    /// One long high pulse at the start of each period, low for the rest
    #[default]
    MarkSpace,
    /// High slots spread evenly over the period (less flicker and EMI)
    Balanced,
}
