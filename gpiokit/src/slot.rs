//! Per-pin runtime state
//!
//! Every physical pin has one slot in the registry. A slot holds `None`
//! while the pin is closed; opening installs a fresh [`PinState`] stamped
//! with the generation of the new owner. Handles compare their generation
//! against the slot on every operation.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_time::Duration;
use gpiokit_core::{DebounceEngine, EdgeEvent, Error, ModeStateMachine, PwmGenerator, Result};
use gpiokit_hal::Level;

/// Capacity of the per-pin edge event queue
pub const EVENT_QUEUE_DEPTH: usize = 8;

/// Queued edge event tagged with the subscription it was produced for
#[derive(Debug, Clone, Copy)]
pub(crate) struct TaggedEvent {
    pub listener: u32,
    pub event: EdgeEvent,
}

/// Active edge subscription
#[derive(Debug, Clone, Copy)]
pub(crate) struct Listener {
    pub id: u32,
    pub engine: DebounceEngine,
}

/// PWM output state
#[derive(Debug, Clone, Copy)]
pub(crate) struct PwmState {
    pub generator: PwmGenerator,
    /// Cadence produced by the backend peripheral
    pub hardware: bool,
    /// Level last written by the software cadence
    pub last_level: Option<Level>,
}

/// State of an open pin
#[derive(Debug)]
pub(crate) struct PinState {
    pub generation: u32,
    pub logical: u8,
    pub machine: ModeStateMachine,
    pub debounce: Duration,
    pub pwm: Option<PwmState>,
    pub listener: Option<Listener>,
    pub next_listener: u32,
    pub dropped_events: u32,
}

impl PinState {
    pub fn new(
        generation: u32,
        logical: u8,
        machine: ModeStateMachine,
        debounce: Duration,
        pwm: Option<PwmState>,
    ) -> Self {
        Self {
            generation,
            logical,
            machine,
            debounce,
            pwm,
            listener: None,
            next_listener: 0,
            dropped_events: 0,
        }
    }

    /// Install a new listener, replacing the current one
    pub fn replace_listener(&mut self, engine: DebounceEngine) -> u32 {
        self.next_listener = self.next_listener.wrapping_add(1);
        let id = self.next_listener;
        self.listener = Some(Listener { id, engine });
        id
    }

    /// Check if `id` is the live listener
    pub fn is_listener(&self, id: u32) -> bool {
        matches!(self.listener, Some(l) if l.id == id)
    }
}

pub(crate) struct PinSlot {
    pub state: Mutex<CriticalSectionRawMutex, RefCell<Option<PinState>>>,
    pub events: Channel<CriticalSectionRawMutex, TaggedEvent, EVENT_QUEUE_DEPTH>,
}

impl PinSlot {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(None)),
            events: Channel::new(),
        }
    }

    /// Run `f` against the state owned by `generation`
    ///
    /// Fails with `PinClosed` if the pin was closed or reopened by another
    /// owner since the handle was created.
    pub fn with_live<R>(
        &self,
        generation: u32,
        f: impl FnOnce(&mut PinState) -> Result<R>,
    ) -> Result<R> {
        self.state.lock(|cell| {
            let mut guard = cell.borrow_mut();
            match guard.as_mut() {
                Some(state) if state.generation == generation => f(state),
                _ => Err(Error::PinClosed),
            }
        })
    }

    /// Run `f` against the state of an open pin, if any
    pub fn with_open<R>(&self, f: impl FnOnce(&mut PinState) -> R) -> Option<R> {
        self.state.lock(|cell| cell.borrow_mut().as_mut().map(f))
    }

    pub fn install(&self, state: PinState) {
        self.state.lock(|cell| *cell.borrow_mut() = Some(state));
    }

    /// Remove the state, leaving the slot closed
    pub fn take(&self) -> Option<PinState> {
        self.state.lock(|cell| cell.borrow_mut().take())
    }

    /// Drop queued events of a torn down subscription
    pub fn discard_events(&self) {
        self.events.clear();
    }
}
