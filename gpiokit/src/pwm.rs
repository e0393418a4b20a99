//! PWM outputs
//!
//! Pins with a hardware PWM peripheral hand every configuration change to
//! the backend. All other PWM pins are driven by the software cadence
//! ([`PinRegistry::step_software_pwm`]), which advances one slot per tick and
//! only writes when the level changes.
//!
//! Software PWM precision is bounded by the tick length and by executor
//! scheduling jitter. It is good enough for LEDs, not for servos.

use embassy_time::Ticker;
use gpiokit_core::{Error, PwmConfig, Result};
use gpiokit_hal::{Backend, Direction, PwmMode};

use crate::pin::Pin;
use crate::registry::PinRegistry;
use crate::slot::PwmState;

impl<B: Backend> Pin<'_, B> {
    fn with_pwm<R>(&self, f: impl FnOnce(&mut PwmState) -> Result<R>) -> Result<R> {
        self.with_state(|state| {
            let pwm = state
                .pwm
                .as_mut()
                .ok_or(Error::RequiresMode(Direction::Pwm))?;
            f(pwm)
        })
    }

    /// Apply a new configuration, hardware first
    fn update_pwm(&self, f: impl FnOnce(PwmConfig) -> Result<PwmConfig>) -> Result<()> {
        self.with_pwm(|pwm| {
            let config = f(pwm.generator.config())?;
            if pwm.hardware {
                self.registry.with_backend(|backend| {
                    backend.configure_pwm(self.physical, config.duty, config.range, config.mode)
                })?;
            }
            pwm.generator.apply(config);
            Ok(())
        })
    }

    /// Current duty, range and mode
    pub fn pwm_config(&self) -> Result<PwmConfig> {
        self.with_pwm(|pwm| Ok(pwm.generator.config()))
    }

    pub fn pwm_value(&self) -> Result<u16> {
        self.with_pwm(|pwm| Ok(pwm.generator.duty()))
    }

    /// Set the duty (`0..=range`)
    pub fn set_pwm_value(&self, duty: u16) -> Result<()> {
        self.update_pwm(|config| config.with_duty(duty))
    }

    pub fn pwm_range(&self) -> Result<u16> {
        self.with_pwm(|pwm| Ok(pwm.generator.range()))
    }

    /// Set the range; the duty goes back to zero
    pub fn set_pwm_range(&self, range: u16) -> Result<()> {
        self.update_pwm(|config| config.with_range(range))
    }

    pub fn pwm_mode(&self) -> Result<PwmMode> {
        self.with_pwm(|pwm| Ok(pwm.generator.mode()))
    }

    pub fn set_pwm_mode(&self, mode: PwmMode) -> Result<()> {
        self.update_pwm(|config| Ok(config.with_mode(mode)))
    }

    /// Check if the cadence comes from a hardware peripheral
    pub fn is_hardware_pwm(&self) -> Result<bool> {
        self.with_pwm(|pwm| Ok(pwm.hardware))
    }
}

impl<B: Backend> PinRegistry<B> {
    /// Advance every software PWM pin by one slot
    pub fn step_software_pwm(&self) {
        for physical in self.snapshot() {
            self.slot(physical).with_open(|state| {
                let Some(pwm) = state.pwm.as_mut().filter(|pwm| !pwm.hardware) else {
                    return;
                };

                let level = pwm.generator.advance();
                if pwm.last_level == Some(level) {
                    return;
                }
                match self.with_backend(|backend| backend.write(physical, level)) {
                    Ok(()) => pwm.last_level = Some(level),
                    Err(e) => warn!("gpio: PWM write on pin {} failed: {:?}", state.logical, e),
                }
            });
        }
    }

    /// Drive software PWM forever at the configured tick
    pub async fn run_software_pwm(&self) -> ! {
        let mut ticker = Ticker::every(self.config().pwm_tick());
        loop {
            self.step_software_pwm();
            ticker.next().await;
        }
    }
}
