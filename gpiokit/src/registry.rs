//! Pin registry
//!
//! The registry owns the backend and the table of open pins. It hands out
//! exclusive [`Pin`] handles and guarantees that a physical pin has at most
//! one live handle at a time.
//!
//! Locking: the table, every pin slot and the backend each sit behind their
//! own blocking mutex. Locks are always taken in the order
//! table → slot → backend and are never held across an `.await`.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use gpiokit_core::{
    ConfigError, Error, GpioConfig, ModeStateMachine, PinAllocator, PinMode, PwmConfig,
    PwmGenerator, Result, Transition,
};
use gpiokit_hal::{
    Backend, Capabilities, Direction, Identity, Level, NumberingScheme, PinNumbering, Pull,
};
use heapless::Vec;

use crate::pin::Pin;
use crate::slot::{PinSlot, PinState, PwmState};

/// Highest number of physical pins a registry can manage
pub const MAX_PINS: usize = 64;

/// Snapshot of an open pin, as yielded by [`PinRegistry::connected_pins`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectedPin {
    /// Index in the registry's numbering scheme
    pub logical: u8,
    /// Backend index
    pub physical: u8,
    pub mode: PinMode,
}

/// Owner of all pins of one backend
pub struct PinRegistry<B: Backend> {
    scheme: NumberingScheme,
    numbering: &'static (dyn PinNumbering + Sync),
    config: GpioConfig,
    pin_count: u8,
    backend: Mutex<CriticalSectionRawMutex, RefCell<B>>,
    table: Mutex<CriticalSectionRawMutex, RefCell<PinAllocator<MAX_PINS>>>,
    slots: [PinSlot; MAX_PINS],
}

impl<B: Backend> PinRegistry<B> {
    /// Registry with identity numbering and default configuration
    pub fn new(backend: B, scheme: NumberingScheme) -> Self {
        Self::build(backend, scheme, &Identity, GpioConfig::default())
    }

    /// Registry with explicit numbering and configuration
    pub fn with_config(
        backend: B,
        scheme: NumberingScheme,
        numbering: &'static (dyn PinNumbering + Sync),
        config: GpioConfig,
    ) -> core::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(backend, scheme, numbering, config))
    }

    fn build(
        backend: B,
        scheme: NumberingScheme,
        numbering: &'static (dyn PinNumbering + Sync),
        config: GpioConfig,
    ) -> Self {
        // Lines past the slot table cannot be opened, so they are not addressable
        let pin_count = backend.pin_count().min(MAX_PINS as u8);
        Self {
            scheme,
            numbering,
            config,
            pin_count,
            backend: Mutex::new(RefCell::new(backend)),
            table: Mutex::new(RefCell::new(PinAllocator::new())),
            slots: core::array::from_fn(|_| PinSlot::new()),
        }
    }

    /// Number of addressable pins: the backend's count, capped at [`MAX_PINS`]
    pub fn pin_count(&self) -> u8 {
        self.pin_count
    }

    pub fn scheme(&self) -> NumberingScheme {
        self.scheme
    }

    pub fn config(&self) -> &GpioConfig {
        &self.config
    }

    /// Number of open pins
    pub fn open_count(&self) -> usize {
        self.table.lock(|table| table.borrow().len())
    }

    /// Check if the pin at `index` is open
    pub fn is_open(&self, index: u8) -> bool {
        match self.resolve(index) {
            Ok(physical) => self.table.lock(|table| table.borrow().is_allocated(physical)),
            Err(_) => false,
        }
    }

    /// Capabilities of the pin at `index`
    pub fn capabilities(&self, index: u8) -> Result<Capabilities> {
        let physical = self.resolve(index)?;
        Ok(self.with_backend(|backend| backend.capabilities(physical)))
    }

    /// Open a pin as floating input
    pub fn open_input(&self, index: u8) -> Result<Pin<'_, B>> {
        self.open_pin(index, PinMode::input())
    }

    /// Open a pin in `mode`
    ///
    /// The pin only shows up as open once the backend has accepted the
    /// configuration; any failure leaves it closed.
    pub fn open_pin(&self, index: u8, mode: PinMode) -> Result<Pin<'_, B>> {
        let physical = self.resolve(index)?;

        self.table.lock(|table| {
            let mut table = table.borrow_mut();
            if table.is_allocated(physical) {
                return Err(Error::PinAlreadyOpen(index));
            }

            let capabilities = self.with_backend(|backend| backend.capabilities(physical));
            let (machine, transition) = ModeStateMachine::open(mode, capabilities)?;

            self.with_backend(|backend| backend.configure(physical, mode.direction, mode.pull))?;
            let pwm = match self.start_pwm(physical, capabilities, transition) {
                Ok(pwm) => pwm,
                Err(e) => {
                    self.reset_backend(physical);
                    return Err(e);
                }
            };

            let generation = match table.allocate(physical, index) {
                Ok(generation) => generation,
                Err(e) => {
                    self.reset_backend(physical);
                    return Err(e);
                }
            };

            self.slot(physical).discard_events();
            self.slot(physical).install(PinState::new(
                generation,
                index,
                machine,
                self.config.default_debounce(),
                pwm,
            ));

            debug!("gpio: opened pin {} (physical {}) as {}", index, physical, mode.direction);
            Ok(Pin::new(self, physical, index, generation))
        })
    }

    /// Close the pin at `index`
    ///
    /// Any handle to the pin becomes stale and fails with `PinClosed`.
    pub fn close_pin(&self, index: u8) -> Result<()> {
        let physical = self.resolve(index)?;

        self.table.lock(|table| {
            let mut table = table.borrow_mut();
            if !table.is_allocated(physical) {
                return Err(Error::PinNotOpen(index));
            }
            self.teardown(physical);
            table.release(physical);
            debug!("gpio: closed pin {}", index);
            Ok(())
        })
    }

    /// Close the pin owned by `generation`
    pub(crate) fn close_owned(&self, physical: u8, generation: u32) -> Result<()> {
        self.table.lock(|table| {
            let mut table = table.borrow_mut();
            match table.get(physical) {
                Some(entry) if entry.generation == generation => {}
                _ => return Err(Error::PinClosed),
            }
            self.teardown(physical);
            if let Some(entry) = table.release(physical) {
                debug!("gpio: closed pin {}", entry.logical);
            }
            Ok(())
        })
    }

    /// Lazy iterator over the open pins in the order they were opened
    ///
    /// Pins closed during a pass are skipped; pins opened during a pass are
    /// yielded after the ones already open.
    pub fn connected_pins(&self) -> ConnectedPins<'_, B> {
        ConnectedPins {
            registry: self,
            after: 0,
        }
    }

    /// First open pin opened after the owner with generation `after`
    ///
    /// Generations grow with every open, so table order and generation
    /// order agree until the counter wraps.
    fn connected_after(&self, after: u32) -> Option<(u32, ConnectedPin)> {
        self.table.lock(|table| {
            let table = table.borrow();
            let entry = table.iter().find(|entry| entry.generation > after)?;
            let mode = self
                .slot(entry.physical)
                .with_open(|state| state.machine.mode())?;
            let pin = ConnectedPin {
                logical: entry.logical,
                physical: entry.physical,
                mode,
            };
            Some((entry.generation, pin))
        })
    }

    /// Physical indices of the open pins
    pub(crate) fn snapshot(&self) -> Vec<u8, MAX_PINS> {
        self.table
            .lock(|table| table.borrow().iter().map(|entry| entry.physical).collect())
    }

    pub(crate) fn slot(&self, physical: u8) -> &PinSlot {
        &self.slots[physical as usize]
    }

    pub(crate) fn with_backend<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        self.backend.lock(|backend| f(&mut backend.borrow_mut()))
    }

    /// Range given to pins entering PWM
    pub(crate) fn default_pwm_range(&self) -> u16 {
        match self.config.default_pwm_range {
            0 => self.with_backend(|backend| backend.default_pwm_range()),
            range => range,
        }
    }

    /// Translate a logical index into a backend index
    fn resolve(&self, index: u8) -> Result<u8> {
        if index >= self.pin_count {
            return Err(Error::InvalidPinIndex(index));
        }
        let physical = self
            .numbering
            .translate(self.scheme, index)
            .ok_or(Error::InvalidPinIndex(index))?;
        if physical >= self.pin_count {
            return Err(Error::InvalidPinIndex(index));
        }
        Ok(physical)
    }

    /// Allocate the PWM state for a transition that enters PWM
    fn start_pwm(
        &self,
        physical: u8,
        capabilities: Capabilities,
        transition: Transition,
    ) -> Result<Option<PwmState>> {
        if !transition.start_pwm {
            return Ok(None);
        }

        let config = PwmConfig::new(self.default_pwm_range())?;
        let hardware = capabilities.contains(Capabilities::HARDWARE_PWM);
        if hardware {
            self.with_backend(|backend| {
                backend.configure_pwm(physical, config.duty, config.range, config.mode)
            })?;
        } else {
            self.with_backend(|backend| backend.write(physical, Level::Low))?;
        }

        Ok(Some(PwmState {
            generator: PwmGenerator::new(config),
            hardware,
            last_level: (!hardware).then_some(Level::Low),
        }))
    }

    /// Perform a planned mode change on an open pin
    ///
    /// Backend work happens first; the state is only updated once every
    /// step succeeded.
    pub(crate) fn apply_transition(
        &self,
        physical: u8,
        state: &mut PinState,
        transition: Transition,
    ) -> Result<()> {
        if !transition.changes_mode() {
            return Ok(());
        }

        let hardware_pwm = match state.pwm {
            Some(pwm) if transition.stop_pwm && pwm.hardware => Some(pwm.generator.config()),
            _ => None,
        };
        if hardware_pwm.is_some() {
            self.with_backend(|backend| backend.stop_pwm(physical))?;
        }

        let to = transition.to;
        if let Err(e) = self.with_backend(|backend| backend.configure(physical, to.direction, to.pull)) {
            if let Some(config) = hardware_pwm {
                self.restore_pwm(physical, config);
            }
            return Err(e.into());
        }

        let pwm = match self.start_pwm(physical, state.machine.capabilities(), transition) {
            Ok(pwm) => pwm,
            Err(e) => {
                if let Some(from) = transition.from {
                    self.restore_mode(physical, from);
                }
                return Err(e);
            }
        };

        if transition.teardown_listener && state.listener.take().is_some() {
            self.slot(physical).discard_events();
            debug!("gpio: listener on pin {} torn down by mode change", state.logical);
        }
        if transition.stop_pwm {
            state.pwm = None;
        }
        if pwm.is_some() {
            state.pwm = pwm;
        }
        state.machine.commit(transition);

        debug!("gpio: pin {} now {}", state.logical, to.direction);
        Ok(())
    }

    /// Stop listener and PWM of a pin and return it to a floating input
    ///
    /// Backend errors are logged and do not prevent the close.
    fn teardown(&self, physical: u8) {
        let slot = self.slot(physical);
        let Some(state) = slot.take() else {
            return;
        };

        if state.listener.is_some() {
            slot.discard_events();
        }

        if let Some(pwm) = state.pwm {
            let stopped = self.with_backend(|backend| {
                if pwm.hardware {
                    backend.stop_pwm(physical)
                } else {
                    backend.write(physical, Level::Low)
                }
            });
            if let Err(e) = stopped {
                warn!("gpio: failed to stop PWM on pin {}: {:?}", state.logical, e);
            }
        }

        self.reset_backend(physical);
    }

    fn reset_backend(&self, physical: u8) {
        if let Err(e) =
            self.with_backend(|backend| backend.configure(physical, Direction::Input, Pull::None))
        {
            warn!("gpio: failed to reset physical pin {}: {:?}", physical, e);
        }
    }

    fn restore_mode(&self, physical: u8, mode: PinMode) {
        if let Err(e) =
            self.with_backend(|backend| backend.configure(physical, mode.direction, mode.pull))
        {
            warn!("gpio: failed to restore physical pin {}: {:?}", physical, e);
        }
    }

    fn restore_pwm(&self, physical: u8, config: PwmConfig) {
        if let Err(e) = self.with_backend(|backend| {
            backend.configure_pwm(physical, config.duty, config.range, config.mode)
        }) {
            warn!("gpio: failed to restore PWM on physical pin {}: {:?}", physical, e);
        }
    }
}

/// Iterator over open pins, see [`PinRegistry::connected_pins`]
///
/// Each step reads the table afresh, so the iterator never holds a lock
/// between items. It remembers the generation of the last pin it yielded
/// and resumes after it, so closing an earlier pin mid-pass does not skip
/// a later one. Cloning it restarts from the clone's position.
pub struct ConnectedPins<'r, B: Backend> {
    registry: &'r PinRegistry<B>,
    after: u32,
}

impl<B: Backend> Clone for ConnectedPins<'_, B> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry,
            after: self.after,
        }
    }
}

impl<B: Backend> Iterator for ConnectedPins<'_, B> {
    type Item = ConnectedPin;

    fn next(&mut self) -> Option<ConnectedPin> {
        let (generation, pin) = self.registry.connected_after(self.after)?;
        self.after = generation;
        Some(pin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpiokit_hal::{BackendError, RaspberryPiHeader};
    use gpiokit_hal_sim::{SimBackend, SimBoard};

    fn board() -> SimBoard {
        SimBoard::new(28, Capabilities::digital_pwm())
    }

    #[test]
    fn test_open_close_reopen() {
        let board = board();
        let registry = PinRegistry::new(SimBackend::new(&board), NumberingScheme::Bcm);

        let pin = registry.open_pin(17, PinMode::output()).unwrap();
        assert!(registry.is_open(17));
        assert_eq!(registry.open_count(), 1);
        assert_eq!(board.configuration(17), (Direction::Output, Pull::None));

        pin.close().unwrap();
        assert!(!registry.is_open(17));
        assert_eq!(board.configuration(17), (Direction::Input, Pull::None));

        let pin = registry.open_input(17).unwrap();
        assert_eq!(pin.index(), 17);
    }

    #[test]
    fn test_double_open_rejected() {
        let board = board();
        let registry = PinRegistry::new(SimBackend::new(&board), NumberingScheme::Bcm);

        let _pin = registry.open_input(4).unwrap();
        assert_eq!(
            registry.open_pin(4, PinMode::output()).err(),
            Some(Error::PinAlreadyOpen(4))
        );
        // First handle still owns the pin in its original mode
        assert_eq!(board.configuration(4), (Direction::Input, Pull::None));
    }

    #[test]
    fn test_invalid_index() {
        let board = board();
        let registry = PinRegistry::new(SimBackend::new(&board), NumberingScheme::Bcm);

        assert_eq!(
            registry.open_input(28).err(),
            Some(Error::InvalidPinIndex(28))
        );
        assert_eq!(
            registry.open_input(255).err(),
            Some(Error::InvalidPinIndex(255))
        );
        assert_eq!(registry.open_count(), 0);
    }

    #[test]
    fn test_close_not_open() {
        let board = board();
        let registry = PinRegistry::new(SimBackend::new(&board), NumberingScheme::Bcm);

        assert_eq!(registry.close_pin(5), Err(Error::PinNotOpen(5)));

        let pin = registry.open_input(5).unwrap();
        registry.close_pin(5).unwrap();
        assert_eq!(registry.close_pin(5), Err(Error::PinNotOpen(5)));
        assert_eq!(pin.read(), Err(Error::PinClosed));
    }

    #[test]
    fn test_stale_handle_after_reopen() {
        let board = board();
        let registry = PinRegistry::new(SimBackend::new(&board), NumberingScheme::Bcm);

        let stale = registry.open_pin(6, PinMode::output()).unwrap();
        registry.close_pin(6).unwrap();
        let fresh = registry.open_pin(6, PinMode::output()).unwrap();

        assert_eq!(stale.write(Level::High), Err(Error::PinClosed));
        assert_eq!(stale.close(), Err(Error::PinClosed));
        // Dropping the stale handle must not close the new owner
        assert!(registry.is_open(6));
        fresh.write(Level::High).unwrap();
        assert_eq!(board.output_level(6), Level::High);
    }

    #[test]
    fn test_drop_closes() {
        let board = board();
        let registry = PinRegistry::new(SimBackend::new(&board), NumberingScheme::Bcm);

        {
            let _pin = registry.open_pin(9, PinMode::output()).unwrap();
            assert!(registry.is_open(9));
        }
        assert!(!registry.is_open(9));
        assert_eq!(board.configuration(9), (Direction::Input, Pull::None));
    }

    #[test]
    fn test_unsupported_mode_leaves_pin_closed() {
        let board = SimBoard::new(8, Capabilities::digital());
        let registry = PinRegistry::new(SimBackend::new(&board), NumberingScheme::Bcm);

        assert_eq!(
            registry.open_pin(2, PinMode::pwm()).err(),
            Some(Error::UnsupportedPinMode)
        );
        assert!(!registry.is_open(2));
        assert_eq!(board.configure_count(2), 0);
    }

    #[test]
    fn test_backend_failure_on_open() {
        let board = board();
        let registry = PinRegistry::new(SimBackend::new(&board), NumberingScheme::Bcm);

        board.inject_fault(3, Some(BackendError::Io));
        assert_eq!(
            registry.open_input(3).err(),
            Some(Error::Backend(BackendError::Io))
        );
        assert!(!registry.is_open(3));

        board.inject_fault(3, None);
        assert!(registry.open_input(3).is_ok());
    }

    #[test]
    fn test_teardown_error_still_closes() {
        let board = board();
        let registry = PinRegistry::new(SimBackend::new(&board), NumberingScheme::Bcm);

        let _pin = registry.open_pin(12, PinMode::pwm()).unwrap();
        board.inject_fault(12, Some(BackendError::Io));

        assert_eq!(registry.close_pin(12), Ok(()));
        assert!(!registry.is_open(12));

        board.inject_fault(12, None);
        assert!(registry.open_input(12).is_ok());
    }

    #[test]
    fn test_connected_pins_order() {
        let board = board();
        let registry = PinRegistry::new(SimBackend::new(&board), NumberingScheme::Bcm);

        let _a = registry.open_input(20).unwrap();
        let _b = registry.open_pin(3, PinMode::output()).unwrap();
        let c = registry.open_pin(11, PinMode::input_pull_up()).unwrap();
        let _d = registry.open_pin(7, PinMode::pwm()).unwrap();
        c.close().unwrap();

        let pins = registry.connected_pins();
        let order: Vec<u8, 8> = pins.clone().map(|p| p.logical).collect();
        assert_eq!(order.as_slice(), &[20, 3, 7]);

        // Restartable
        let again: Vec<u8, 8> = pins.map(|p| p.logical).collect();
        assert_eq!(again, order);

        let modes: Vec<Direction, 8> = registry
            .connected_pins()
            .map(|p| p.mode.direction)
            .collect();
        assert_eq!(
            modes.as_slice(),
            &[Direction::Input, Direction::Output, Direction::Pwm]
        );
    }

    #[test]
    fn test_connected_pins_survive_close_mid_pass() {
        let board = board();
        let registry = PinRegistry::new(SimBackend::new(&board), NumberingScheme::Bcm);

        let a = registry.open_input(1).unwrap();
        let _b = registry.open_input(2).unwrap();
        let _c = registry.open_input(3).unwrap();

        let mut pins = registry.connected_pins();
        assert_eq!(pins.next().map(|p| p.logical), Some(1));
        assert_eq!(pins.next().map(|p| p.logical), Some(2));

        // Closing an already yielded pin must not shift the pass
        a.close().unwrap();
        assert_eq!(pins.next().map(|p| p.logical), Some(3));
        assert_eq!(pins.next(), None);

        // Pins opened mid-pass come last
        let mut pins = registry.connected_pins();
        assert_eq!(pins.next().map(|p| p.logical), Some(2));
        let _d = registry.open_input(0).unwrap();
        assert_eq!(pins.next().map(|p| p.logical), Some(3));
        assert_eq!(pins.next().map(|p| p.logical), Some(0));
        assert_eq!(pins.next(), None);
    }

    /// Backend reporting more lines than the registry has slots for
    struct WideBackend<'a>(SimBackend<'a>);

    impl Backend for WideBackend<'_> {
        fn pin_count(&self) -> u8 {
            100
        }

        fn capabilities(&self, index: u8) -> Capabilities {
            self.0.capabilities(index)
        }

        fn configure(
            &mut self,
            index: u8,
            direction: Direction,
            pull: Pull,
        ) -> core::result::Result<(), BackendError> {
            self.0.configure(index, direction, pull)
        }

        fn read(&mut self, index: u8) -> core::result::Result<Level, BackendError> {
            self.0.read(index)
        }

        fn write(&mut self, index: u8, level: Level) -> core::result::Result<(), BackendError> {
            self.0.write(index, level)
        }

        fn analog_read(&mut self, index: u8) -> core::result::Result<u16, BackendError> {
            self.0.analog_read(index)
        }

        fn analog_write(&mut self, index: u8, value: u16) -> core::result::Result<(), BackendError> {
            self.0.analog_write(index, value)
        }

        fn configure_pwm(
            &mut self,
            index: u8,
            duty: u16,
            range: u16,
            mode: gpiokit_hal::PwmMode,
        ) -> core::result::Result<(), BackendError> {
            self.0.configure_pwm(index, duty, range, mode)
        }
    }

    #[test]
    fn test_pin_count_capped_at_slot_table() {
        let board = SimBoard::new(64, Capabilities::digital());
        let registry = PinRegistry::new(WideBackend(SimBackend::new(&board)), NumberingScheme::Bcm);

        assert_eq!(registry.pin_count(), MAX_PINS as u8);

        // Every index below pin_count() opens and closes
        for index in 0..registry.pin_count() {
            let pin = registry.open_input(index).unwrap();
            pin.close().unwrap();
        }
        assert_eq!(
            registry.open_input(MAX_PINS as u8).err(),
            Some(Error::InvalidPinIndex(MAX_PINS as u8))
        );
        assert_eq!(registry.open_input(70).err(), Some(Error::InvalidPinIndex(70)));
    }

    #[test]
    fn test_board_numbering() {
        let board = SimBoard::new(54, Capabilities::digital_pwm());
        let registry = PinRegistry::with_config(
            SimBackend::new(&board),
            NumberingScheme::Board,
            &RaspberryPiHeader,
            GpioConfig::default(),
        )
        .unwrap();

        // Header pin 11 is BCM 17
        let pin = registry.open_pin(11, PinMode::output()).unwrap();
        assert_eq!(pin.index(), 11);
        assert_eq!(pin.physical_index(), 17);
        pin.write(Level::High).unwrap();
        assert_eq!(board.output_level(17), Level::High);

        // Header pin 1 is 3V3 power
        assert_eq!(registry.open_input(1).err(), Some(Error::InvalidPinIndex(1)));

        let connected: Vec<ConnectedPin, 4> = registry.connected_pins().collect();
        assert_eq!(connected[0].logical, 11);
        assert_eq!(connected[0].physical, 17);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let board = board();
        let config = GpioConfig {
            poll_interval_ms: 0,
            ..GpioConfig::default()
        };
        assert!(matches!(
            PinRegistry::with_config(
                SimBackend::new(&board),
                NumberingScheme::Bcm,
                &Identity,
                config
            ),
            Err(ConfigError::ZeroInterval)
        ));
    }
}
