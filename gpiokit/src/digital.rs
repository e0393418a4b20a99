//! `embedded-hal` trait implementations for [`Pin`]
//!
//! Lets a gpiokit pin be handed to any driver written against the
//! `embedded-hal` 1.0 digital traits. The async `Wait` methods have no
//! deadline; they end when the level is reached, when the pin is closed, or
//! when the future is dropped.

use embedded_hal::digital::{ErrorType, InputPin, OutputPin, StatefulOutputPin};
use embedded_hal_async::digital::Wait;
use gpiokit_core::{EdgeKind, Error};
use gpiokit_hal::{Backend, Level};

use crate::pin::Pin;

impl<B: Backend> ErrorType for Pin<'_, B> {
    type Error = Error;
}

impl<B: Backend> InputPin for Pin<'_, B> {
    fn is_high(&mut self) -> Result<bool, Error> {
        self.read().map(Level::is_high)
    }

    fn is_low(&mut self) -> Result<bool, Error> {
        self.read().map(Level::is_low)
    }
}

impl<B: Backend> OutputPin for Pin<'_, B> {
    fn set_low(&mut self) -> Result<(), Error> {
        self.write(Level::Low)
    }

    fn set_high(&mut self) -> Result<(), Error> {
        self.write(Level::High)
    }
}

impl<B: Backend> StatefulOutputPin for Pin<'_, B> {
    fn is_set_high(&mut self) -> Result<bool, Error> {
        self.read().map(Level::is_high)
    }

    fn is_set_low(&mut self) -> Result<bool, Error> {
        self.read().map(Level::is_low)
    }

    fn toggle(&mut self) -> Result<(), Error> {
        Pin::toggle(self).map(|_| ())
    }
}

impl<B: Backend> Wait for Pin<'_, B> {
    async fn wait_for_high(&mut self) -> Result<(), Error> {
        self.wait_for_level(Level::High, None).await
    }

    async fn wait_for_low(&mut self) -> Result<(), Error> {
        self.wait_for_level(Level::Low, None).await
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), Error> {
        self.wait_for_edge(EdgeKind::Rising, None).await.map(|_| ())
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), Error> {
        self.wait_for_edge(EdgeKind::Falling, None).await.map(|_| ())
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), Error> {
        self.wait_for_edge(EdgeKind::Both, None).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PinRegistry;
    use embassy_futures::block_on;
    use gpiokit_core::PinMode;
    use gpiokit_hal::{Capabilities, Direction, NumberingScheme};
    use gpiokit_hal_sim::{SimBackend, SimBoard};
    use std::thread;
    use std::time::Duration as StdDuration;

    fn blink<P: OutputPin + StatefulOutputPin>(pin: &mut P) -> Result<bool, P::Error> {
        pin.set_high()?;
        pin.toggle()?;
        pin.is_set_low()
    }

    #[test]
    fn test_output_traits() {
        let board = SimBoard::new(8, Capabilities::digital());
        let registry = PinRegistry::new(SimBackend::new(&board), NumberingScheme::Bcm);
        let mut pin = registry.open_pin(1, PinMode::output()).unwrap();

        assert_eq!(blink(&mut pin), Ok(true));
        assert_eq!(board.output_level(1), Level::Low);
    }

    #[test]
    fn test_input_traits() {
        let board = SimBoard::new(8, Capabilities::digital());
        let registry = PinRegistry::new(SimBackend::new(&board), NumberingScheme::Bcm);
        let mut pin = registry.open_input(2).unwrap();

        board.set_input(2, Level::High);
        assert_eq!(InputPin::is_high(&mut pin), Ok(true));
        assert_eq!(
            OutputPin::set_high(&mut pin),
            Err(Error::RequiresMode(Direction::Output))
        );
    }

    #[test]
    fn test_wait_for_edge() {
        let board = SimBoard::new(8, Capabilities::digital());
        let registry = PinRegistry::new(SimBackend::new(&board), NumberingScheme::Bcm);
        let mut pin = registry.open_input(3).unwrap();

        // Already low: returns immediately
        assert_eq!(block_on(pin.wait_for_low()), Ok(()));

        thread::scope(|s| {
            let pin = &mut pin;
            let waiter = s.spawn(move || block_on(pin.wait_for_rising_edge()));
            thread::sleep(StdDuration::from_millis(20));
            board.set_input(3, Level::High);
            assert_eq!(waiter.join().unwrap(), Ok(()));
        });
    }

    #[test]
    fn test_wait_ends_on_close() {
        let board = SimBoard::new(8, Capabilities::digital());
        let registry = PinRegistry::new(SimBackend::new(&board), NumberingScheme::Bcm);
        let mut pin = registry.open_input(4).unwrap();

        thread::scope(|s| {
            let pin = &mut pin;
            let waiter = s.spawn(move || block_on(pin.wait_for_high()));
            thread::sleep(StdDuration::from_millis(20));
            registry.close_pin(4).unwrap();
            assert_eq!(waiter.join().unwrap(), Err(Error::PinClosed));
        });
    }
}
