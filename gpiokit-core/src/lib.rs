//! Board-agnostic core logic for the gpiokit control layer
//!
//! This crate contains the parts of pin management that do not touch
//! hardware or an executor, so they can be tested deterministically:
//!
//! - Error taxonomy shared by every layer
//! - Mode state machine with capability validation
//! - Debounce engine and edge classification
//! - PWM generator (duty bookkeeping and slot scheduling)
//! - Pin ownership table
//! - Configuration types and persistence

#![no_std]
#![deny(unsafe_code)]

pub mod allocator;
pub mod config;
pub mod debounce;
pub mod error;
pub mod mode;
pub mod pwm;

pub use allocator::{OpenEntry, PinAllocator};
pub use config::{parse_config, ConfigError, GpioConfig};
pub use debounce::{DebounceEngine, Edge, EdgeEvent, EdgeKind};
pub use error::{Error, Result};
pub use mode::{ModeStateMachine, PinMode, Transition};
pub use pwm::{PwmConfig, PwmGenerator};

pub use gpiokit_hal::{Capabilities, Direction, Level, NumberingScheme, Pull, PwmMode};
