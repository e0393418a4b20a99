//! gpiokit runtime
//!
//! Pin ownership, mode changes, edge listeners, PWM and waiters on top of a
//! [`gpiokit_hal::Backend`].
//!
//! ```text
//!   application
//!       │  open_pin / close_pin
//!       ▼
//!  ┌──────────────┐   slots (one lock per pin)   ┌────────────────────┐
//!  │ PinRegistry  │─────────────────────────────▶│ Pin / Subscription │
//!  │  table       │                              └────────────────────┘
//!  │  backend     │◀── run(): listener sampler + software PWM cadence
//!  └──────┬───────┘
//!         ▼
//!   gpiokit-hal Backend (chip, character device, simulator)
//! ```
//!
//! The registry is meant to live for the whole program (typically in a
//! `static` or a `StaticCell`). Handles borrow it, so no pin can outlive the
//! registry that owns it. [`PinRegistry::run`] must be polled by an executor
//! for subscriptions and software PWM to make progress; waiters poll on
//! their own and do not need it.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub(crate) mod fmt;

mod digital;
mod listener;
mod pin;
mod pwm;
mod registry;
mod slot;
mod waiter;

use embassy_futures::join::join;
use gpiokit_hal::Backend;

pub use listener::Subscription;
pub use pin::Pin;
pub use registry::{ConnectedPin, ConnectedPins, PinRegistry, MAX_PINS};
pub use slot::EVENT_QUEUE_DEPTH;

pub use gpiokit_core::{
    parse_config,
    ConfigError, Edge, EdgeEvent, EdgeKind, Error, GpioConfig, PinMode, PwmConfig, Result,
};
pub use gpiokit_hal::{
    BackendError, Capabilities, Direction, Identity, Level, NumberingScheme, PinNumbering, Pull,
    PwmMode, RaspberryPiHeader,
};

impl<B: Backend> PinRegistry<B> {
    /// Run the listener sampler and the software PWM cadence
    pub async fn run(&self) -> ! {
        let (never, _) = join(self.run_listeners(), self.run_software_pwm()).await;
        never
    }
}
