//! Brushless ESCs driven by four 50 Hz PWM channels

use embedded_hal::pwm::SetDutyCycle;
use log::info;

use crate::{
    error::ParamError,
    hal::{MotorDriver, MotorId},
};

/// PWM period at 50 Hz
const PERIOD_US: f32 = 20_000.0;
/// Pulse width at 0 %
const MIN_PULSE_US: f32 = 1_000.0;
/// Pulse width at 100 %
const MAX_PULSE_US: f32 = 2_000.0;

#[derive(Debug)]
pub enum Error<E> {
    Pwm(E),
    Param(ParamError),
}

/// Channels in [`MotorId`] order
pub struct Esc<P> {
    channels: [P; 4],
}

impl<P: SetDutyCycle> Esc<P> {
    pub fn new(channels: [P; 4]) -> Self {
        Self { channels }
    }

    /// Holds every ESC at minimum throttle so they arm
    pub fn arm(&mut self) -> Result<(), Error<P::Error>> {
        for motor in MotorId::ALL {
            self.set_motor_speed(motor, 0.0)?;
        }
        info!("ESCs armed");
        Ok(())
    }

    pub fn channel(&mut self, motor: MotorId) -> &mut P {
        &mut self.channels[motor as usize]
    }

    fn duty(max: u16, percent: f32) -> u16 {
        let pulse = MIN_PULSE_US + (MAX_PULSE_US - MIN_PULSE_US) * percent / 100.0;
        (max as f32 * pulse / PERIOD_US) as u16
    }
}

impl<P: SetDutyCycle> MotorDriver for Esc<P> {
    type Error = Error<P::Error>;

    fn set_motor_speed(&mut self, motor: MotorId, percent: f32) -> Result<(), Self::Error> {
        if !(0.0..=100.0).contains(&percent) {
            return Err(Error::Param(ParamError::MotorSpeed(percent)));
        }
        let channel = &mut self.channels[motor as usize];
        let duty = Self::duty(channel.max_duty_cycle(), percent);
        channel.set_duty_cycle(duty).map_err(Error::Pwm)
    }
}
