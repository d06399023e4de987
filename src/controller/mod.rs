//! Attitude stabilization: four PID loops feeding an X-quad mixer

pub mod mixer;
pub mod pid;

use nalgebra::Vector3;

pub use mixer::{AxisOutputs, MotorSpeeds};
pub use pid::PidAxisState;

use crate::{config::ControllerConfig, estimator::AttitudeEstimate, protocol::Move};

/// Standard gravity, m/s²
pub const GRAVITY: f32 = 9.80665;

const STICK_MIN: f32 = -64.0;
const STICK_MAX: f32 = 64.0;
const ANGLE_RANGE: f32 = 90.0;
const THRUST_RANGE: f32 = 10.0;

fn map_stick(value: i8, out_min: f32, out_max: f32) -> f32 {
    let v = (value as f32).clamp(STICK_MIN, STICK_MAX);
    (v - STICK_MIN) * (out_max - out_min) / (STICK_MAX - STICK_MIN) + out_min
}

/// Vertical acceleration in m/s² with gravity removed, `accel` in g
pub fn vertical_accel(accel: &Vector3<f32>) -> f32 {
    (accel.z - 1.0) * GRAVITY
}

/// Signed shortest difference `to - from` in degrees, within `[-180, 180)`
pub fn angle_diff(to: f32, from: f32) -> f32 {
    let d = (to - from + 180.0) % 360.0;
    if d < 0.0 {
        d + 180.0
    } else {
        d - 180.0
    }
}

/// Pilot targets derived from a MOVE command
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PilotSetpoint {
    /// Degrees, limited to the configured tilt
    pub roll: f32,
    /// Degrees, limited to the configured tilt
    pub pitch: f32,
    /// Heading offset in degrees
    pub yaw: f32,
    /// Vertical acceleration, m/s²
    pub thrust: f32,
}

impl PilotSetpoint {
    pub fn from_move(cmd: &Move, max_tilt: f32) -> Self {
        Self {
            roll: map_stick(cmd.roll, -ANGLE_RANGE, ANGLE_RANGE).clamp(-max_tilt, max_tilt),
            pitch: map_stick(cmd.pitch, -ANGLE_RANGE, ANGLE_RANGE).clamp(-max_tilt, max_tilt),
            yaw: map_stick(cmd.yaw, -ANGLE_RANGE, ANGLE_RANGE),
            thrust: map_stick(cmd.thrust, -THRUST_RANGE, THRUST_RANGE),
        }
    }
}

pub struct StabilizationController {
    roll: PidAxisState,
    pitch: PidAxisState,
    yaw: PidAxisState,
    thrust: PidAxisState,
    base_throttle: f32,
    max_tilt: f32,
    /// Heading the yaw setpoint is relative to, latched on the first update
    heading_ref: Option<f32>,
}

impl StabilizationController {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            roll: PidAxisState::new(config.roll),
            pitch: PidAxisState::new(config.pitch),
            yaw: PidAxisState::new(config.yaw),
            thrust: PidAxisState::new(config.thrust),
            base_throttle: config.base_throttle,
            max_tilt: config.max_tilt,
            heading_ref: None,
        }
    }

    pub fn max_tilt(&self) -> f32 {
        self.max_tilt
    }

    pub fn heading_ref(&self) -> Option<f32> {
        self.heading_ref
    }

    /// One control step. `vertical_accel` is in m/s² with gravity removed.
    pub fn update(
        &mut self,
        attitude: &AttitudeEstimate,
        vertical_accel: f32,
        setpoint: &PilotSetpoint,
    ) -> MotorSpeeds {
        let heading_ref = *self.heading_ref.get_or_insert(attitude.yaw);
        let yaw_error = angle_diff(heading_ref + setpoint.yaw, attitude.yaw);

        let outputs = AxisOutputs {
            roll: self.roll.compute(setpoint.roll, attitude.roll),
            pitch: self.pitch.compute(setpoint.pitch, attitude.pitch),
            yaw: self.yaw.compute(yaw_error, 0.0),
            thrust: self.thrust.compute(setpoint.thrust, vertical_accel),
        };

        MotorSpeeds::mix(&outputs, self.base_throttle)
    }

    /// Clears all integrators and the heading reference
    pub fn reset(&mut self) {
        self.roll.reset();
        self.pitch.reset();
        self.yaw.reset();
        self.thrust.reset();
        self.heading_ref = None;
    }

    pub fn axes(&self) -> [&PidAxisState; 4] {
        [&self.roll, &self.pitch, &self.yaw, &self.thrust]
    }
}
