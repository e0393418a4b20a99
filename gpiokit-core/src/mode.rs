//! Pin mode state machine
//!
//! A pin's mode is a direction (Input, Output, Pwm) plus a pull resistor
//! state. Pull only applies to inputs; Output and Pwm always carry
//! `Pull::None` and reject explicit pulls.
//!
//! Any direction may move to any other direction as long as the physical
//! pin supports it. Transitions are planned first and committed afterwards,
//! so a rejected or failed transition leaves the current mode untouched.

use gpiokit_hal::{Capabilities, Direction, Pull};

use crate::error::{Error, Result};

/// Direction and pull configuration of a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinMode {
    pub direction: Direction,
    pub pull: Pull,
}

impl PinMode {
    /// Floating input
    pub const fn input() -> Self {
        Self {
            direction: Direction::Input,
            pull: Pull::None,
        }
    }

    /// Input with pull-up resistor
    pub const fn input_pull_up() -> Self {
        Self {
            direction: Direction::Input,
            pull: Pull::Up,
        }
    }

    /// Input with pull-down resistor
    pub const fn input_pull_down() -> Self {
        Self {
            direction: Direction::Input,
            pull: Pull::Down,
        }
    }

    /// Push-pull output
    pub const fn output() -> Self {
        Self {
            direction: Direction::Output,
            pull: Pull::None,
        }
    }

    /// PWM output
    pub const fn pwm() -> Self {
        Self {
            direction: Direction::Pwm,
            pull: Pull::None,
        }
    }

    /// Same direction with another pull
    pub const fn with_pull(self, pull: Pull) -> Self {
        Self {
            direction: self.direction,
            pull,
        }
    }

    /// Capabilities a pin needs to enter this mode
    pub fn required_capabilities(self) -> Capabilities {
        let direction = match self.direction {
            Direction::Input => Capabilities::INPUT,
            Direction::Output => Capabilities::OUTPUT,
            Direction::Pwm => Capabilities::PWM,
        };
        let pull = match self.pull {
            Pull::None => Capabilities::empty(),
            Pull::Up => Capabilities::PULL_UP,
            Pull::Down => Capabilities::PULL_DOWN,
        };
        direction | pull
    }

    /// Check the direction/pull combination on its own
    pub fn is_well_formed(self) -> bool {
        self.direction == Direction::Input || self.pull == Pull::None
    }
}

impl From<Direction> for PinMode {
    fn from(direction: Direction) -> Self {
        Self {
            direction,
            pull: Pull::None,
        }
    }
}

/// Side effects of a planned mode change
///
/// The caller performs these around the backend reconfiguration and then
/// commits the transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transition {
    /// Mode before the change (`None` when the pin is being opened)
    pub from: Option<PinMode>,
    /// Mode after the change
    pub to: PinMode,
    /// An active edge subscription must be torn down
    pub teardown_listener: bool,
    /// A PWM configuration must be allocated and its cadence started
    pub start_pwm: bool,
    /// The running PWM cadence must be stopped before the mode changes
    pub stop_pwm: bool,
}

impl Transition {
    /// Check if the backend needs to be reconfigured
    pub fn changes_mode(&self) -> bool {
        self.from != Some(self.to)
    }
}

/// Mode state of one pin together with the pin's capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeStateMachine {
    mode: PinMode,
    capabilities: Capabilities,
}

impl ModeStateMachine {
    /// Plan the initial transition of a pin being opened
    ///
    /// Returns the machine in its requested mode along with the transition
    /// to perform. Nothing is committed if validation fails.
    pub fn open(requested: PinMode, capabilities: Capabilities) -> Result<(Self, Transition)> {
        validate(requested, capabilities)?;

        let transition = Transition {
            from: None,
            to: requested,
            teardown_listener: false,
            start_pwm: requested.direction == Direction::Pwm,
            stop_pwm: false,
        };
        let machine = Self {
            mode: requested,
            capabilities,
        };
        Ok((machine, transition))
    }

    /// Current mode
    pub fn mode(&self) -> PinMode {
        self.mode
    }

    /// Capabilities of the physical pin
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Check if the pin can enter a mode
    pub fn is_supported(&self, mode: PinMode) -> bool {
        validate(mode, self.capabilities).is_ok()
    }

    /// Plan a transition to `requested` without changing state
    pub fn plan(&self, requested: PinMode) -> Result<Transition> {
        validate(requested, self.capabilities)?;

        let from = self.mode.direction;
        let to = requested.direction;

        Ok(Transition {
            from: Some(self.mode),
            to: requested,
            teardown_listener: from == Direction::Input && to != Direction::Input,
            start_pwm: from != Direction::Pwm && to == Direction::Pwm,
            stop_pwm: from == Direction::Pwm && to != Direction::Pwm,
        })
    }

    /// Plan a direction change
    ///
    /// The current pull is kept only when the pin stays an input.
    pub fn plan_direction(&self, direction: Direction) -> Result<Transition> {
        let pull = if direction == Direction::Input && self.mode.direction == Direction::Input {
            self.mode.pull
        } else {
            Pull::None
        };
        self.plan(PinMode { direction, pull })
    }

    /// Plan a pull change (inputs only)
    pub fn plan_pull(&self, pull: Pull) -> Result<Transition> {
        if self.mode.direction != Direction::Input {
            return Err(Error::UnsupportedPinMode);
        }
        self.plan(self.mode.with_pull(pull))
    }

    /// Commit a planned transition
    pub fn commit(&mut self, transition: Transition) {
        self.mode = transition.to;
    }
}

fn validate(mode: PinMode, capabilities: Capabilities) -> Result<()> {
    if !mode.is_well_formed() {
        return Err(Error::UnsupportedPinMode);
    }
    if !capabilities.contains(mode.required_capabilities()) {
        return Err(Error::UnsupportedPinMode);
    }
    Ok(())
}
