//! Edge detection with debounce filtering
//!
//! The engine turns raw level samples into stable edge events. A level
//! change is only committed once every sample taken during the debounce
//! window agrees with it; any sample back at the stable level cancels the
//! pending change.
//!
//! The first sample fed to a fresh engine only establishes the stable
//! level. There is no prior edge to compare against, so no event is
//! emitted for it.

use embassy_time::{Duration, Instant};
use gpiokit_hal::Level;

/// Direction of a committed level change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// Low to high
    Rising,
    /// High to low
    Falling,
}

impl Edge {
    /// Edge produced by a change from `from` to `to`, if the levels differ
    pub fn between(from: Level, to: Level) -> Option<Self> {
        match (from, to) {
            (Level::Low, Level::High) => Some(Edge::Rising),
            (Level::High, Level::Low) => Some(Edge::Falling),
            _ => None,
        }
    }
}

/// Which edges a subscriber wants to hear about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EdgeKind {
    Rising,
    Falling,
    #[default]
    Both,
}

impl EdgeKind {
    /// Check if an edge is reported for this kind
    pub fn matches(self, edge: Edge) -> bool {
        matches!(
            (self, edge),
            (EdgeKind::Both, _)
                | (EdgeKind::Rising, Edge::Rising)
                | (EdgeKind::Falling, Edge::Falling)
        )
    }
}

/// A stable edge that survived debounce filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EdgeEvent {
    pub edge: Edge,
    /// Level after the edge
    pub level: Level,
    /// When the level first changed (start of the debounce window)
    pub at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct Pending {
    level: Level,
    since: Instant,
}

/// Debounce state for one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DebounceEngine {
    kind: EdgeKind,
    window: Duration,
    last_stable: Option<Level>,
    pending: Option<Pending>,
}

impl DebounceEngine {
    /// Create an engine; a zero window disables filtering
    pub fn new(kind: EdgeKind, window: Duration) -> Self {
        Self {
            kind,
            window,
            last_stable: None,
            pending: None,
        }
    }

    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Last level that survived filtering
    pub fn last_stable(&self) -> Option<Level> {
        self.last_stable
    }

    /// Check if a level change is waiting for the window to elapse
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Feed one raw sample
    ///
    /// Returns an event when a change is committed and its direction
    /// matches the engine's edge kind. Committed changes that do not match
    /// still update the stable level.
    pub fn sample(&mut self, level: Level, now: Instant) -> Option<EdgeEvent> {
        let Some(stable) = self.last_stable else {
            self.last_stable = Some(level);
            return None;
        };

        if level == stable {
            // Bounce back to the stable level
            self.pending = None;
            return None;
        }

        if self.window.as_ticks() == 0 {
            return self.commit(stable, level, now);
        }

        match self.pending {
            Some(pending) if pending.level == level => {
                if now.saturating_duration_since(pending.since) >= self.window {
                    self.commit(stable, level, pending.since)
                } else {
                    None
                }
            }
            _ => {
                self.pending = Some(Pending { level, since: now });
                None
            }
        }
    }

    fn commit(&mut self, from: Level, to: Level, at: Instant) -> Option<EdgeEvent> {
        self.last_stable = Some(to);
        self.pending = None;

        let edge = Edge::between(from, to)?;
        self.kind
            .matches(edge)
            .then_some(EdgeEvent { edge, level: to, at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ms(t: u64) -> Instant {
        Instant::from_millis(t)
    }

    #[test]
    fn test_first_sample_sets_baseline() {
        let mut engine = DebounceEngine::new(EdgeKind::Both, Duration::from_millis(0));
        assert_eq!(engine.sample(Level::High, ms(0)), None);
        assert_eq!(engine.last_stable(), Some(Level::High));
    }

    #[test]
    fn test_zero_window_commits_immediately() {
        let mut engine = DebounceEngine::new(EdgeKind::Both, Duration::from_millis(0));
        engine.sample(Level::Low, ms(0));

        let event = engine.sample(Level::High, ms(1)).unwrap();
        assert_eq!(event.edge, Edge::Rising);
        assert_eq!(event.level, Level::High);
        assert_eq!(event.at, ms(1));

        let event = engine.sample(Level::Low, ms(2)).unwrap();
        assert_eq!(event.edge, Edge::Falling);
    }

    #[test]
    fn test_edge_kind_filter() {
        let mut engine = DebounceEngine::new(EdgeKind::Falling, Duration::from_millis(0));
        engine.sample(Level::Low, ms(0));

        // Rising commits silently, falling is reported
        assert_eq!(engine.sample(Level::High, ms(1)), None);
        assert_eq!(engine.last_stable(), Some(Level::High));
        let event = engine.sample(Level::Low, ms(2)).unwrap();
        assert_eq!(event.edge, Edge::Falling);
    }

    #[test]
    fn test_bounce_is_ignored() {
        let mut engine = DebounceEngine::new(EdgeKind::Both, Duration::from_millis(50));
        engine.sample(Level::Low, ms(0));

        assert_eq!(engine.sample(Level::High, ms(10)), None);
        assert!(engine.is_pending());
        assert_eq!(engine.sample(Level::Low, ms(15)), None);
        assert!(!engine.is_pending());

        // Window restarts from the next change
        assert_eq!(engine.sample(Level::High, ms(40)), None);
        assert_eq!(engine.sample(Level::High, ms(89)), None);
        let event = engine.sample(Level::High, ms(90)).unwrap();
        assert_eq!(event.edge, Edge::Rising);
        assert_eq!(event.at, ms(40));
    }

    #[test]
    fn test_scenario_one_rising_event() {
        // low, high at 0ms, low at 5ms, high at 60ms held; 1ms sampling
        let mut engine = DebounceEngine::new(EdgeKind::Both, Duration::from_millis(50));
        let mut events = heapless::Vec::<EdgeEvent, 4>::new();

        engine.sample(Level::Low, ms(0));
        for t in 1..200u64 {
            let level = match t {
                0..=4 => Level::High,
                5..=59 => Level::Low,
                _ => Level::High,
            };
            if let Some(event) = engine.sample(level, ms(t)) {
                events.push(event).unwrap();
            }
        }

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].edge, Edge::Rising);
        assert_eq!(events[0].at, ms(60));
    }

    proptest! {
        #[test]
        fn prop_fast_oscillation_emits_nothing(
            window_ms in 5u64..200,
            gaps in proptest::collection::vec(1u64..1000, 1..64),
        ) {
            let window = Duration::from_millis(window_ms);
            let mut engine = DebounceEngine::new(EdgeKind::Both, window);
            let mut t = 0;
            engine.sample(Level::Low, ms(t));

            // Every high is followed by a low sooner than the window
            let mut level = Level::High;
            for gap in &gaps {
                t += 1 + gap % (window_ms - 1);
                prop_assert_eq!(engine.sample(level, ms(t)), None);
                level = !level;
            }
            t += 1;
            prop_assert_eq!(engine.sample(Level::Low, ms(t)), None);
            prop_assert_eq!(engine.last_stable(), Some(Level::Low));
        }

        #[test]
        fn prop_sustained_level_emits_once(
            window_ms in 1u64..200,
            step_ms in 1u64..20,
            bounces in 0usize..10,
        ) {
            let window = Duration::from_millis(window_ms);
            let mut engine = DebounceEngine::new(EdgeKind::Both, window);
            let mut t = 0;
            engine.sample(Level::Low, ms(t));

            for _ in 0..bounces {
                t += 1;
                engine.sample(Level::High, ms(t));
                t += 1;
                engine.sample(Level::Low, ms(t));
            }

            let mut count = 0;
            let end = t + window_ms + 2 * step_ms;
            while t < end {
                t += step_ms;
                if engine.sample(Level::High, ms(t)).is_some() {
                    count += 1;
                }
            }
            prop_assert_eq!(count, 1);
            prop_assert_eq!(engine.last_stable(), Some(Level::High));
        }
    }
}
