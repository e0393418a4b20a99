//! Edge listeners
//!
//! A subscription attaches a debounce engine to an input pin. The sampler
//! ([`PinRegistry::sample_listeners`]) reads every listened pin, feeds the
//! engines and pushes committed edges into the pin's bounded event queue.
//! It never waits for a consumer: when the queue is full the event is
//! dropped and counted.
//!
//! Events are tagged with the id of the subscription that produced them, so
//! a replaced or torn down subscription can never receive events meant for
//! its successor.

use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Instant, Ticker, Timer};
use gpiokit_core::{DebounceEngine, EdgeEvent, EdgeKind, Error, Result};
use gpiokit_hal::{Backend, Direction};

use crate::pin::Pin;
use crate::registry::PinRegistry;
use crate::slot::{PinSlot, TaggedEvent};

impl<'r, B: Backend> Pin<'r, B> {
    /// Subscribe to debounced edges of an input
    ///
    /// Replaces any previous subscription on this pin. The pin's current
    /// debounce window is used for the lifetime of the subscription.
    pub fn subscribe(&self, kind: EdgeKind) -> Result<Subscription<'r, B>> {
        let id = self.with_state(|state| {
            if state.machine.mode().direction != Direction::Input {
                return Err(Error::RequiresMode(Direction::Input));
            }

            let mut engine = DebounceEngine::new(kind, state.debounce);
            let level = self
                .registry
                .with_backend(|backend| backend.read(self.physical))?;
            engine.sample(level, Instant::now());

            if state.listener.is_some() {
                trace!("gpio: replacing listener on pin {}", self.logical);
            }
            self.slot().discard_events();
            Ok(state.replace_listener(engine))
        })?;

        Ok(Subscription {
            registry: self.registry,
            physical: self.physical,
            generation: self.generation,
            id,
            kind,
        })
    }
}

/// Stream of debounced edges from one pin
///
/// Dropping the subscription stops edge detection on the pin.
pub struct Subscription<'r, B: Backend> {
    registry: &'r PinRegistry<B>,
    physical: u8,
    generation: u32,
    id: u32,
    kind: EdgeKind,
}

impl<B: Backend> Subscription<'_, B> {
    pub fn edge_kind(&self) -> EdgeKind {
        self.kind
    }

    /// Check if the subscription still receives events
    pub fn is_active(&self) -> bool {
        self.check().is_ok()
    }

    fn slot(&self) -> &PinSlot {
        self.registry.slot(self.physical)
    }

    /// `PinClosed` once the pin is closed, `SubscriptionClosed` once the
    /// listener was torn down or replaced
    fn check(&self) -> Result<()> {
        self.slot().with_live(self.generation, |state| {
            if state.is_listener(self.id) {
                Ok(())
            } else {
                Err(Error::SubscriptionClosed)
            }
        })
    }

    fn accept(&self, tagged: TaggedEvent) -> Option<EdgeEvent> {
        (tagged.listener == self.id).then_some(tagged.event)
    }

    /// Next queued event, without waiting
    pub fn try_next(&mut self) -> Result<Option<EdgeEvent>> {
        loop {
            self.check()?;
            match self.slot().events.try_receive() {
                Ok(tagged) => {
                    if let Some(event) = self.accept(tagged) {
                        return Ok(Some(event));
                    }
                }
                Err(_) => return Ok(None),
            }
        }
    }

    /// Wait for the next event
    ///
    /// Fails as soon as the subscription is torn down; events still queued
    /// at that point are discarded.
    pub async fn next(&mut self) -> Result<EdgeEvent> {
        self.next_until(None).await
    }

    /// Wait for the next event for at most `timeout`
    pub async fn next_timeout(&mut self, timeout: Duration) -> Result<EdgeEvent> {
        let deadline = Instant::now()
            .checked_add(timeout)
            .unwrap_or(Instant::MAX);
        self.next_until(Some(deadline)).await
    }

    async fn next_until(&mut self, deadline: Option<Instant>) -> Result<EdgeEvent> {
        let poll = self.registry.config().poll_interval();
        loop {
            self.check()?;

            let now = Instant::now();
            let wait = match deadline {
                Some(deadline) if now >= deadline => return Err(Error::Timeout),
                Some(deadline) => poll.min(deadline.saturating_duration_since(now)),
                None => poll,
            };

            // Wake up at least once per poll interval to notice teardown
            match select(self.slot().events.receive(), Timer::after(wait)).await {
                Either::First(tagged) => {
                    self.check()?;
                    if let Some(event) = self.accept(tagged) {
                        return Ok(event);
                    }
                }
                Either::Second(()) => {}
            }
        }
    }

    /// Stop listening
    pub fn unsubscribe(self) {}

    fn teardown(&self) {
        let removed = self
            .slot()
            .with_live(self.generation, |state| {
                if state.is_listener(self.id) {
                    state.listener = None;
                    Ok(true)
                } else {
                    Ok(false)
                }
            })
            .unwrap_or(false);
        if removed {
            self.slot().discard_events();
        }
    }
}

impl<B: Backend> Drop for Subscription<'_, B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<B: Backend> PinRegistry<B> {
    /// Sample every pin with an active subscription once
    ///
    /// Returns the number of events queued.
    pub fn sample_listeners(&self, now: Instant) -> usize {
        let mut queued = 0;

        for physical in self.snapshot() {
            let slot = self.slot(physical);
            slot.with_open(|state| {
                let Some(listener) = state.listener.as_mut() else {
                    return;
                };

                let level = match self.with_backend(|backend| backend.read(physical)) {
                    Ok(level) => level,
                    Err(e) => {
                        warn!("gpio: sampling pin {} failed: {:?}", state.logical, e);
                        return;
                    }
                };

                let id = listener.id;
                let Some(event) = listener.engine.sample(level, now) else {
                    return;
                };

                match slot.events.try_send(TaggedEvent { listener: id, event }) {
                    Ok(()) => {
                        trace!("gpio: pin {} edge {:?}", state.logical, event.edge);
                        queued += 1;
                    }
                    Err(_) => {
                        state.dropped_events = state.dropped_events.saturating_add(1);
                        warn!(
                            "gpio: event queue of pin {} full, dropped {} events",
                            state.logical,
                            state.dropped_events
                        );
                    }
                }
            });
        }

        queued
    }

    /// Sample listeners forever at the configured interval
    pub async fn run_listeners(&self) -> ! {
        let mut ticker = Ticker::every(self.config().sample_interval());
        loop {
            self.sample_listeners(Instant::now());
            ticker.next().await;
        }
    }
}
