//! Simulated board backend
//!
//! [`SimBoard`] holds the state of a virtual board: input levels driven by a
//! test or demo, output levels written by the control layer, analog values,
//! hardware PWM settings and per-pin capability sets. [`SimBackend`] is the
//! [`Backend`] view of a board handed to a registry, while the owner of the
//! board keeps poking inputs from the outside.
//!
//! ```ignore
//! let board = SimBoard::new(40, Capabilities::digital_pwm());
//! let registry = PinRegistry::new(SimBackend::new(&board), NumberingScheme::Board);
//! board.set_input(7, Level::High);
//! ```

#![no_std]
#![deny(unsafe_code)]

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use gpiokit_hal::{
    Backend, BackendError, Capabilities, Direction, Level, Pull, PwmMode, DEFAULT_PWM_RANGE,
};

/// Maximum number of pins a simulated board can expose
pub const MAX_SIM_PINS: usize = 64;

/// Hardware PWM settings last applied to a simulated pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SimPwm {
    pub duty: u16,
    pub range: u16,
    pub mode: PwmMode,
}

#[derive(Debug, Clone, Copy)]
struct SimPin {
    capabilities: Capabilities,
    direction: Direction,
    pull: Pull,
    /// Level seen on the pin when it is an input
    input: Level,
    /// Level last driven by the backend
    output: Level,
    analog_in: u16,
    analog_out: u16,
    pwm: Option<SimPwm>,
    writes: u32,
    configures: u32,
    /// Injected failure for every operation on this pin
    fault: Option<BackendError>,
}

impl SimPin {
    const fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            direction: Direction::Input,
            pull: Pull::None,
            input: Level::Low,
            output: Level::Low,
            analog_in: 0,
            analog_out: 0,
            pwm: None,
            writes: 0,
            configures: 0,
            fault: None,
        }
    }
}

struct BoardState {
    pins: [SimPin; MAX_SIM_PINS],
    pin_count: u8,
    pwm_range: u16,
}

/// Virtual board shared between a backend and its driver (test or demo)
pub struct SimBoard {
    state: Mutex<CriticalSectionRawMutex, RefCell<BoardState>>,
}

impl SimBoard {
    /// Create a board where every pin has the same capabilities
    ///
    /// `pin_count` is clamped to [`MAX_SIM_PINS`].
    pub fn new(pin_count: u8, capabilities: Capabilities) -> Self {
        let pin_count = pin_count.min(MAX_SIM_PINS as u8);
        Self {
            state: Mutex::new(RefCell::new(BoardState {
                pins: [SimPin::new(capabilities); MAX_SIM_PINS],
                pin_count,
                pwm_range: DEFAULT_PWM_RANGE,
            })),
        }
    }

    fn with_pin<R>(&self, index: u8, f: impl FnOnce(&mut SimPin) -> R) -> R {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            f(&mut state.pins[index as usize % MAX_SIM_PINS])
        })
    }

    /// Override the capabilities of one pin
    pub fn set_capabilities(&self, index: u8, capabilities: Capabilities) {
        self.with_pin(index, |pin| pin.capabilities = capabilities);
    }

    /// Override the default PWM range reported by the backend
    pub fn set_default_pwm_range(&self, range: u16) {
        self.state.lock(|state| state.borrow_mut().pwm_range = range);
    }

    /// Drive the external level seen by an input pin
    pub fn set_input(&self, index: u8, level: Level) {
        self.with_pin(index, |pin| pin.input = level);
    }

    /// Set the value the ADC returns for a pin
    pub fn set_analog_input(&self, index: u8, value: u16) {
        self.with_pin(index, |pin| pin.analog_in = value);
    }

    /// Make every backend operation on a pin fail (or clear with `None`)
    pub fn inject_fault(&self, index: u8, fault: Option<BackendError>) {
        self.with_pin(index, |pin| pin.fault = fault);
    }

    /// Level last written to a pin by the backend
    pub fn output_level(&self, index: u8) -> Level {
        self.with_pin(index, |pin| pin.output)
    }

    /// Last value written to the DAC of a pin
    pub fn analog_output(&self, index: u8) -> u16 {
        self.with_pin(index, |pin| pin.analog_out)
    }

    /// Current direction and pull configuration of a pin
    pub fn configuration(&self, index: u8) -> (Direction, Pull) {
        self.with_pin(index, |pin| (pin.direction, pin.pull))
    }

    /// Hardware PWM settings of a pin, if a cadence is running
    pub fn pwm(&self, index: u8) -> Option<SimPwm> {
        self.with_pin(index, |pin| pin.pwm)
    }

    /// Number of digital writes issued to a pin
    pub fn write_count(&self, index: u8) -> u32 {
        self.with_pin(index, |pin| pin.writes)
    }

    /// Number of configure calls issued for a pin
    pub fn configure_count(&self, index: u8) -> u32 {
        self.with_pin(index, |pin| pin.configures)
    }
}

/// [`Backend`] implementation over a borrowed [`SimBoard`]
#[derive(Clone, Copy)]
pub struct SimBackend<'a> {
    board: &'a SimBoard,
}

impl<'a> SimBackend<'a> {
    pub fn new(board: &'a SimBoard) -> Self {
        Self { board }
    }

    pub fn board(&self) -> &'a SimBoard {
        self.board
    }

    fn checked<R>(
        &self,
        index: u8,
        f: impl FnOnce(&mut SimPin) -> Result<R, BackendError>,
    ) -> Result<R, BackendError> {
        if index >= self.pin_count() {
            return Err(BackendError::Rejected);
        }
        self.board.with_pin(index, |pin| match pin.fault {
            Some(fault) => Err(fault),
            None => f(pin),
        })
    }
}

impl Backend for SimBackend<'_> {
    fn pin_count(&self) -> u8 {
        self.board.state.lock(|state| state.borrow().pin_count)
    }

    fn capabilities(&self, index: u8) -> Capabilities {
        if index >= self.pin_count() {
            return Capabilities::empty();
        }
        self.board.with_pin(index, |pin| pin.capabilities)
    }

    fn configure(
        &mut self,
        index: u8,
        direction: Direction,
        pull: Pull,
    ) -> Result<(), BackendError> {
        self.checked(index, |pin| {
            pin.direction = direction;
            pin.pull = pull;
            pin.configures += 1;
            if direction != Direction::Pwm {
                pin.pwm = None;
            }
            Ok(())
        })
    }

    fn read(&mut self, index: u8) -> Result<Level, BackendError> {
        self.checked(index, |pin| {
            Ok(match pin.direction {
                Direction::Input => pin.input,
                Direction::Output | Direction::Pwm => pin.output,
            })
        })
    }

    fn write(&mut self, index: u8, level: Level) -> Result<(), BackendError> {
        self.checked(index, |pin| {
            pin.output = level;
            pin.writes += 1;
            Ok(())
        })
    }

    fn analog_read(&mut self, index: u8) -> Result<u16, BackendError> {
        self.checked(index, |pin| Ok(pin.analog_in))
    }

    fn analog_write(&mut self, index: u8, value: u16) -> Result<(), BackendError> {
        self.checked(index, |pin| {
            pin.analog_out = value;
            Ok(())
        })
    }

    fn configure_pwm(
        &mut self,
        index: u8,
        duty: u16,
        range: u16,
        mode: PwmMode,
    ) -> Result<(), BackendError> {
        self.checked(index, |pin| {
            if !pin.capabilities.contains(Capabilities::HARDWARE_PWM) {
                return Err(BackendError::Rejected);
            }
            pin.pwm = Some(SimPwm { duty, range, mode });
            Ok(())
        })
    }

    fn stop_pwm(&mut self, index: u8) -> Result<(), BackendError> {
        self.checked(index, |pin| {
            pin.pwm = None;
            pin.output = Level::Low;
            Ok(())
        })
    }

    fn default_pwm_range(&self) -> u16 {
        self.board.state.lock(|state| state.borrow().pwm_range)
    }
}
