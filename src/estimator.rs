//! Per-axis scalar Kalman attitude estimation

use nalgebra::Vector3;
use num_traits::Float;

use crate::{
    config::{NoiseConfig, INITIAL_UNCERTAINTY},
    hal::SensorSample,
};

/// One scalar Kalman step: gyro rate drives the prediction, `measurement` corrects it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KalmanAxisInput {
    pub rate: f32,
    pub measurement: f32,
    pub dt: f32,
    pub process_noise_std: f32,
    pub measurement_noise_std: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Roll,
    Pitch,
    Yaw,
}

/// Fused Euler angles in degrees with their variances
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttitudeEstimate {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub roll_unc: f32,
    pub pitch_unc: f32,
    pub yaw_unc: f32,
}

impl AttitudeEstimate {
    pub const fn new(uncertainty: f32) -> Self {
        Self {
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            roll_unc: uncertainty,
            pitch_unc: uncertainty,
            yaw_unc: uncertainty,
        }
    }

    pub fn update(&mut self, axis: Axis, input: KalmanAxisInput) {
        let (value, unc) = match axis {
            Axis::Roll => (&mut self.roll, &mut self.roll_unc),
            Axis::Pitch => (&mut self.pitch, &mut self.pitch_unc),
            Axis::Yaw => (&mut self.yaw, &mut self.yaw_unc),
        };
        kalman_update(value, unc, &input);
    }

    pub fn get(&self, axis: Axis) -> (f32, f32) {
        match axis {
            Axis::Roll => (self.roll, self.roll_unc),
            Axis::Pitch => (self.pitch, self.pitch_unc),
            Axis::Yaw => (self.yaw, self.yaw_unc),
        }
    }

    pub fn is_finite(&self) -> bool {
        [
            self.roll,
            self.pitch,
            self.yaw,
            self.roll_unc,
            self.pitch_unc,
            self.yaw_unc,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

impl Default for AttitudeEstimate {
    fn default() -> Self {
        Self::new(INITIAL_UNCERTAINTY)
    }
}

pub fn kalman_update(state: &mut f32, uncertainty: &mut f32, input: &KalmanAxisInput) {
    *state += input.dt * input.rate;
    *uncertainty += input.dt * input.dt * input.process_noise_std * input.process_noise_std;
    let gain = *uncertainty / (*uncertainty + input.measurement_noise_std * input.measurement_noise_std);
    *state += gain * (input.measurement - *state);
    *uncertainty *= 1.0 - gain;
}

/// Roll from gravity, degrees
pub fn accel_roll(accel: &Vector3<f32>) -> f32 {
    accel
        .y
        .atan2((accel.x * accel.x + accel.z * accel.z).sqrt())
        .to_degrees()
}

/// Pitch from gravity, degrees
pub fn accel_pitch(accel: &Vector3<f32>) -> f32 {
    -accel
        .x
        .atan2((accel.y * accel.y + accel.z * accel.z).sqrt())
        .to_degrees()
}

/// Compass heading in `[0, 360)` degrees. X/Y are tilt compensated by the current
/// roll and pitch (degrees) and `declination` (degrees) is added.
pub fn mag_heading(mag: &Vector3<f32>, roll: f32, pitch: f32, declination: f32) -> f32 {
    let x = mag.x * roll.to_radians().cos();
    let y = mag.y * pitch.to_radians().cos();
    wrap_degrees(y.atan2(x).to_degrees() + declination)
}

fn wrap_degrees(deg: f32) -> f32 {
    let wrapped = deg % 360.0;
    if wrapped < 0.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Owns the live estimate and turns raw samples into per-axis Kalman inputs
#[derive(Debug, Clone)]
pub struct AttitudeEstimator {
    estimate: AttitudeEstimate,
    noise: NoiseConfig,
    declination: f32,
}

impl AttitudeEstimator {
    pub fn new(noise: NoiseConfig, declination: f32) -> Self {
        Self {
            estimate: AttitudeEstimate::default(),
            noise,
            declination,
        }
    }

    pub fn with_initial(mut self, estimate: AttitudeEstimate) -> Self {
        self.estimate = estimate;
        self
    }

    pub fn estimate(&self) -> &AttitudeEstimate {
        &self.estimate
    }

    pub fn reset(&mut self) {
        self.estimate = AttitudeEstimate::default();
    }

    /// Runs one tick over all three axes. `gyro_rate` is in deg/s, `dt` in seconds.
    pub fn fuse(&mut self, sample: &SensorSample, dt: f32) -> AttitudeEstimate {
        let input = |rate, measurement, measurement_noise_std| KalmanAxisInput {
            rate,
            measurement,
            dt,
            process_noise_std: self.noise.gyro_std,
            measurement_noise_std,
        };

        let roll = input(sample.gyro_rate.x, accel_roll(&sample.accel), self.noise.accel_std);
        let pitch = input(sample.gyro_rate.y, accel_pitch(&sample.accel), self.noise.accel_std);
        self.estimate.update(Axis::Roll, roll);
        self.estimate.update(Axis::Pitch, pitch);

        let heading = mag_heading(
            &sample.mag,
            self.estimate.roll,
            self.estimate.pitch,
            self.declination,
        );
        let yaw = input(sample.gyro_rate.z, heading, self.noise.mag_std);
        self.estimate.update(Axis::Yaw, yaw);

        self.estimate
    }
}
