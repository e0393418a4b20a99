//! Pin handles
//!
//! A [`Pin`] is the exclusive handle to one open pin. Every operation
//! checks that the handle is still the owner, so a handle kept around after
//! its pin was closed fails with [`Error::PinClosed`] instead of driving a
//! line that now belongs to someone else.

use core::fmt;

use embassy_time::Duration;
use gpiokit_core::{Error, PinMode, Result};
use gpiokit_hal::{Backend, Capabilities, Direction, Level, Pull};

use crate::registry::PinRegistry;
use crate::slot::{PinSlot, PinState};

/// Exclusive handle to an open pin
///
/// Dropping the handle closes the pin.
pub struct Pin<'r, B: Backend> {
    pub(crate) registry: &'r PinRegistry<B>,
    pub(crate) physical: u8,
    pub(crate) logical: u8,
    pub(crate) generation: u32,
}

impl<'r, B: Backend> Pin<'r, B> {
    pub(crate) fn new(
        registry: &'r PinRegistry<B>,
        physical: u8,
        logical: u8,
        generation: u32,
    ) -> Self {
        Self {
            registry,
            physical,
            logical,
            generation,
        }
    }

    /// Index the pin was opened with
    pub fn index(&self) -> u8 {
        self.logical
    }

    /// Backend index after numbering translation
    pub fn physical_index(&self) -> u8 {
        self.physical
    }

    /// Registry the pin belongs to
    pub fn registry(&self) -> &'r PinRegistry<B> {
        self.registry
    }

    /// Check if this handle still owns the pin
    pub fn is_open(&self) -> bool {
        self.with_state(|_| Ok(())).is_ok()
    }

    /// Close the pin
    ///
    /// Fails with `PinClosed` if the pin was already closed through the
    /// registry (or closed and reopened by another owner); the current
    /// owner is left untouched in that case.
    pub fn close(self) -> Result<()> {
        let result = self.registry.close_owned(self.physical, self.generation);
        // Already closed above; skip the close in Drop
        core::mem::forget(self);
        result
    }

    pub(crate) fn slot(&self) -> &'r PinSlot {
        self.registry.slot(self.physical)
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut PinState) -> Result<R>) -> Result<R> {
        self.slot().with_live(self.generation, f)
    }

    fn require(&self, state: &PinState, direction: Direction) -> Result<()> {
        if state.machine.mode().direction != direction {
            return Err(Error::RequiresMode(direction));
        }
        Ok(())
    }

    fn require_capability(&self, state: &PinState, capability: Capabilities) -> Result<()> {
        if !state.machine.capabilities().contains(capability) {
            return Err(Error::UnsupportedPinMode);
        }
        Ok(())
    }

    // --- Mode ---

    pub fn mode(&self) -> Result<PinMode> {
        self.with_state(|state| Ok(state.machine.mode()))
    }

    pub fn capabilities(&self) -> Result<Capabilities> {
        self.with_state(|state| Ok(state.machine.capabilities()))
    }

    pub fn is_mode_supported(&self, mode: PinMode) -> Result<bool> {
        self.with_state(|state| Ok(state.machine.is_supported(mode)))
    }

    /// Switch to another mode
    ///
    /// On failure the pin keeps its previous mode.
    pub fn set_mode(&self, mode: PinMode) -> Result<()> {
        self.with_state(|state| {
            let transition = state.machine.plan(mode)?;
            self.registry.apply_transition(self.physical, state, transition)
        })
    }

    /// Switch direction; the pull is kept only if the pin stays an input
    pub fn set_direction(&self, direction: Direction) -> Result<()> {
        self.with_state(|state| {
            let transition = state.machine.plan_direction(direction)?;
            self.registry.apply_transition(self.physical, state, transition)
        })
    }

    /// Change the pull resistor of an input
    pub fn set_pull(&self, pull: Pull) -> Result<()> {
        self.with_state(|state| {
            let transition = state.machine.plan_pull(pull)?;
            self.registry.apply_transition(self.physical, state, transition)
        })
    }

    // --- Digital I/O ---

    pub fn read(&self) -> Result<Level> {
        self.with_state(|_| {
            let level = self.registry.with_backend(|backend| backend.read(self.physical))?;
            Ok(level)
        })
    }

    pub fn is_high(&self) -> Result<bool> {
        self.read().map(Level::is_high)
    }

    pub fn is_low(&self) -> Result<bool> {
        self.read().map(Level::is_low)
    }

    /// Drive the level of an output
    pub fn write(&self, level: Level) -> Result<()> {
        self.with_state(|state| {
            self.require(state, Direction::Output)?;
            self.registry
                .with_backend(|backend| backend.write(self.physical, level))?;
            Ok(())
        })
    }

    /// Invert the level of an output, returning the new level
    pub fn toggle(&self) -> Result<Level> {
        self.with_state(|state| {
            self.require(state, Direction::Output)?;
            let level = self.registry.with_backend(|backend| {
                let level = !backend.read(self.physical)?;
                backend.write(self.physical, level)?;
                Ok::<_, gpiokit_hal::BackendError>(level)
            })?;
            Ok(level)
        })
    }

    // --- Analog I/O ---

    pub fn analog_read(&self) -> Result<u16> {
        self.with_state(|state| {
            self.require_capability(state, Capabilities::ANALOG_IN)?;
            let value = self
                .registry
                .with_backend(|backend| backend.analog_read(self.physical))?;
            Ok(value)
        })
    }

    pub fn analog_write(&self, value: u16) -> Result<()> {
        self.with_state(|state| {
            self.require_capability(state, Capabilities::ANALOG_OUT)?;
            self.registry
                .with_backend(|backend| backend.analog_write(self.physical, value))?;
            Ok(())
        })
    }

    // --- Debounce ---

    /// Debounce window used by new subscriptions and waiters
    pub fn debounce(&self) -> Result<Duration> {
        self.with_state(|state| Ok(state.debounce))
    }

    /// Set the debounce window; an active subscription keeps its window
    pub fn set_debounce(&self, window: Duration) -> Result<()> {
        self.with_state(|state| {
            state.debounce = window;
            Ok(())
        })
    }

    /// Events lost because the subscriber did not keep up
    pub fn dropped_events(&self) -> Result<u32> {
        self.with_state(|state| Ok(state.dropped_events))
    }
}

impl<B: Backend> Drop for Pin<'_, B> {
    fn drop(&mut self) {
        // A stale handle must leave the current owner alone
        let _ = self.registry.close_owned(self.physical, self.generation);
    }
}

impl<B: Backend> fmt::Debug for Pin<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pin")
            .field("index", &self.logical)
            .field("physical", &self.physical)
            .field("generation", &self.generation)
            .finish()
    }
}
