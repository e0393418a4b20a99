//! gpiokit Hardware Abstraction Layer
//!
//! This crate defines the raw backend interface that chip or OS specific
//! drivers implement, plus the small vocabulary shared by every layer above
//! it (levels, directions, pulls, PWM modes, capabilities, numbering).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application code                       │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  gpiokit (registry, pins, listeners)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  gpiokit-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ gpiokit-hal-  │       │  board / OS   │
//! │      sim      │       │   backends    │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`backend::Backend`] - raw per-pin digital, analog and PWM access
//! - [`numbering::PinNumbering`] - logical to physical pin translation

#![no_std]
#![deny(unsafe_code)]

pub mod backend;
pub mod capability;
pub mod gpio;
pub mod numbering;

// Re-export key types at crate root for convenience
pub use backend::{Backend, BackendError, DEFAULT_PWM_RANGE};
pub use capability::Capabilities;
pub use gpio::{Direction, Level, Pull, PwmMode};
pub use numbering::{Identity, NumberingScheme, PinNumbering, RaspberryPiHeader};
