//! Blocking waits on pin changes
//!
//! Waiters poll the pin at most every `poll_interval` and sleep with an
//! embassy [`Timer`] in between, never longer than the time left until the
//! deadline. A timeout is therefore reported no earlier than requested and
//! at most one poll interval late. Closing the pin ends every waiter with
//! [`Error::PinClosed`] within one poll cycle.

use embassy_time::{Duration, Instant, Timer};
use gpiokit_core::{DebounceEngine, EdgeEvent, EdgeKind, Error, Result};
use gpiokit_hal::{Backend, Level};

use crate::pin::Pin;

fn deadline_after(timeout: Duration) -> Instant {
    Instant::now().checked_add(timeout).unwrap_or(Instant::MAX)
}

impl<B: Backend> Pin<'_, B> {
    /// Sleep for one poll cycle, bounded by `deadline`
    ///
    /// Fails with `Timeout` once the deadline has passed.
    async fn poll_cycle(&self, deadline: Option<Instant>) -> Result<()> {
        let poll = self.registry.config().poll_interval();
        let now = Instant::now();
        let wait = match deadline {
            Some(deadline) if now >= deadline => return Err(Error::Timeout),
            Some(deadline) => poll.min(deadline.saturating_duration_since(now)),
            None => poll,
        };
        Timer::after(wait).await;
        Ok(())
    }

    /// Wait for a debounced level change
    ///
    /// Returns the new level. The pin's debounce window applies.
    pub async fn read_wait(&self, timeout: Duration) -> Result<Level> {
        let event = self
            .wait_for_edge(EdgeKind::Both, Some(deadline_after(timeout)))
            .await?;
        Ok(event.level)
    }

    /// Wait until the analog value moves by at least the configured
    /// threshold, and return the new value
    pub async fn analog_read_wait(&self, timeout: Duration) -> Result<u16> {
        let deadline = deadline_after(timeout);
        let threshold = self.registry.config().analog_threshold.max(1);
        let initial = self.analog_read()?;

        loop {
            self.poll_cycle(Some(deadline)).await?;
            let value = self.analog_read()?;
            if value.abs_diff(initial) >= threshold {
                return Ok(value);
            }
        }
    }

    pub(crate) async fn wait_for_edge(
        &self,
        kind: EdgeKind,
        deadline: Option<Instant>,
    ) -> Result<EdgeEvent> {
        let mut engine = DebounceEngine::new(kind, self.debounce()?);
        engine.sample(self.read()?, Instant::now());

        loop {
            self.poll_cycle(deadline).await?;
            if let Some(event) = engine.sample(self.read()?, Instant::now()) {
                return Ok(event);
            }
        }
    }

    pub(crate) async fn wait_for_level(&self, level: Level, deadline: Option<Instant>) -> Result<()> {
        while self.read()? != level {
            self.poll_cycle(deadline).await?;
        }
        Ok(())
    }
}
