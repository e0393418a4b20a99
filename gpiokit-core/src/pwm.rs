//! PWM generator
//!
//! Keeps the duty/range/mode triple of a PWM pin and, for pins without a
//! hardware PWM peripheral, schedules the level of every slot of a software
//! period. One period is `range` slots long; a duty of `d` means exactly `d`
//! high slots per period.
//!
//! - MarkSpace: the first `d` slots are high, the rest low
//! - Balanced: the `d` high slots are spread evenly (error diffusion)
//!
//! Changing the range resets the duty to zero. Rescaling the old duty to a
//! new resolution is not implicitly safe (it can round past the new range or
//! change the effective ratio), so callers have to set it again explicitly.

use gpiokit_hal::{Level, PwmMode};

use crate::error::{Error, Result};

/// Duty, range and mode of a PWM output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmConfig {
    /// High slots per period, `0..=range`
    pub duty: u16,
    /// Slots per period (resolution), always positive
    pub range: u16,
    pub mode: PwmMode,
}

impl PwmConfig {
    /// Zero duty, MarkSpace, given range
    pub fn new(range: u16) -> Result<Self> {
        if range == 0 {
            return Err(Error::InvalidPwmRange);
        }
        Ok(Self {
            duty: 0,
            range,
            mode: PwmMode::MarkSpace,
        })
    }

    /// Copy with a new duty, validated against the range
    pub fn with_duty(self, duty: u16) -> Result<Self> {
        if duty > self.range {
            return Err(Error::DutyOutOfRange {
                duty,
                range: self.range,
            });
        }
        Ok(Self { duty, ..self })
    }

    /// Copy with a new range; duty is reset to zero
    pub fn with_range(self, range: u16) -> Result<Self> {
        if range == 0 {
            return Err(Error::InvalidPwmRange);
        }
        Ok(Self {
            duty: 0,
            range,
            mode: self.mode,
        })
    }

    /// Copy with a new scheduling mode
    pub fn with_mode(self, mode: PwmMode) -> Self {
        Self { mode, ..self }
    }

    /// Duty cycle in per-mille (0..=1000)
    pub fn duty_permille(&self) -> u16 {
        (self.duty as u32 * 1000 / self.range as u32) as u16
    }

    /// Level of slot `slot` (taken modulo the range) within a period
    pub fn level_at(&self, slot: u16) -> Level {
        let range = self.range as u32;
        let duty = self.duty as u32;
        let slot = slot as u32 % range;

        let high = match self.mode {
            PwmMode::MarkSpace => slot < duty,
            // Slot is high when the running quota of high slots steps up
            PwmMode::Balanced => (slot + 1) * duty / range > slot * duty / range,
        };
        Level::from(high)
    }
}

/// Software cadence for one PWM pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmGenerator {
    config: PwmConfig,
    slot: u16,
}

impl PwmGenerator {
    pub fn new(config: PwmConfig) -> Self {
        Self { config, slot: 0 }
    }

    pub fn config(&self) -> PwmConfig {
        self.config
    }

    pub fn duty(&self) -> u16 {
        self.config.duty
    }

    pub fn range(&self) -> u16 {
        self.config.range
    }

    pub fn mode(&self) -> PwmMode {
        self.config.mode
    }

    /// Position within the current period
    pub fn slot(&self) -> u16 {
        self.slot
    }

    /// Replace the whole configuration at once
    ///
    /// The period restarts whenever the range or mode changes; a plain duty
    /// change takes effect from the current slot.
    pub fn apply(&mut self, config: PwmConfig) {
        if config.range != self.config.range || config.mode != self.config.mode {
            self.slot = 0;
        }
        self.config = config;
    }

    /// Set the duty, leaving the previous duty in place on error
    pub fn set_duty(&mut self, duty: u16) -> Result<()> {
        let config = self.config.with_duty(duty)?;
        self.apply(config);
        Ok(())
    }

    /// Set the range and reset the duty to zero
    pub fn set_range(&mut self, range: u16) -> Result<()> {
        let config = self.config.with_range(range)?;
        self.apply(config);
        Ok(())
    }

    pub fn set_mode(&mut self, mode: PwmMode) {
        self.apply(self.config.with_mode(mode));
    }

    /// Level for the current slot, then move to the next slot
    pub fn advance(&mut self) -> Level {
        let level = self.config.level_at(self.slot);
        self.slot = if self.slot + 1 >= self.config.range {
            0
        } else {
            self.slot + 1
        };
        level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn high_slots(config: PwmConfig) -> u32 {
        (0..config.range)
            .filter(|&slot| config.level_at(slot).is_high())
            .count() as u32
    }

    #[test]
    fn test_zero_range_rejected() {
        assert_eq!(PwmConfig::new(0), Err(Error::InvalidPwmRange));
        let config = PwmConfig::new(10).unwrap();
        assert_eq!(config.with_range(0), Err(Error::InvalidPwmRange));
    }

    #[test]
    fn test_duty_out_of_range_keeps_previous() {
        let mut gen = PwmGenerator::new(PwmConfig::new(100).unwrap());
        gen.set_duty(40).unwrap();

        assert_eq!(
            gen.set_duty(101),
            Err(Error::DutyOutOfRange {
                duty: 101,
                range: 100
            })
        );
        assert_eq!(gen.duty(), 40);
    }

    #[test]
    fn test_range_change_resets_duty() {
        let mut gen = PwmGenerator::new(PwmConfig::new(1024).unwrap());
        gen.set_duty(512).unwrap();
        gen.set_range(256).unwrap();

        assert_eq!(gen.range(), 256);
        assert_eq!(gen.duty(), 0);
    }

    #[test]
    fn test_mark_space_layout() {
        let config = PwmConfig::new(8).unwrap().with_duty(3).unwrap();
        let levels: heapless::Vec<bool, 8> = (0..8).map(|s| config.level_at(s).is_high()).collect();
        assert_eq!(
            levels.as_slice(),
            &[true, true, true, false, false, false, false, false]
        );
    }

    #[test]
    fn test_balanced_layout() {
        let config = PwmConfig::new(8)
            .unwrap()
            .with_mode(PwmMode::Balanced)
            .with_duty(4)
            .unwrap();
        let levels: heapless::Vec<bool, 8> = (0..8).map(|s| config.level_at(s).is_high()).collect();
        assert_eq!(
            levels.as_slice(),
            &[false, true, false, true, false, true, false, true]
        );
    }

    #[test]
    fn test_advance_wraps() {
        let mut gen = PwmGenerator::new(PwmConfig::new(4).unwrap());
        gen.set_duty(1).unwrap();

        let period: heapless::Vec<Level, 8> = (0..8).map(|_| gen.advance()).collect();
        assert_eq!(
            period.as_slice(),
            &[
                Level::High,
                Level::Low,
                Level::Low,
                Level::Low,
                Level::High,
                Level::Low,
                Level::Low,
                Level::Low
            ]
        );
    }

    #[test]
    fn test_full_and_zero_duty() {
        let config = PwmConfig::new(16).unwrap();
        assert_eq!(high_slots(config), 0);
        assert_eq!(high_slots(config.with_duty(16).unwrap()), 16);
        assert_eq!(config.with_duty(16).unwrap().duty_permille(), 1000);
    }

    proptest! {
        #[test]
        fn prop_duty_roundtrip(range in 1u16..2048, duty in 0u16..2048) {
            let mut gen = PwmGenerator::new(PwmConfig::new(range).unwrap());
            let duty = duty % (range + 1);
            gen.set_duty(duty).unwrap();
            prop_assert_eq!(gen.duty(), duty);
            prop_assert!(gen.set_duty(range + 1).is_err());
            prop_assert_eq!(gen.duty(), duty);
        }

        #[test]
        fn prop_both_modes_same_ratio(range in 1u16..512, duty in 0u16..512) {
            let duty = duty % (range + 1);
            let mark = PwmConfig::new(range).unwrap().with_duty(duty).unwrap();
            let balanced = mark.with_mode(PwmMode::Balanced);
            prop_assert_eq!(high_slots(mark), duty as u32);
            prop_assert_eq!(high_slots(balanced), duty as u32);
        }
    }
}
