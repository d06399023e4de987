//! Collaborator interfaces consumed by the control core

use core::fmt::Debug;

use nalgebra::Vector3;

use crate::{error::ParamError, protocol::Info};

/// Raw inertial and magnetic readings for one control tick
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SensorSample {
    /// Acceleration, g
    pub accel: Vector3<f32>,
    /// Angular rate, deg/s
    pub gyro_rate: Vector3<f32>,
    /// Calibrated magnetic field, arbitrary units
    pub mag: Vector3<f32>,
}

pub trait ImuSensor {
    type Error: Debug;

    async fn read_accel(&mut self) -> Result<Vector3<f32>, Self::Error>;

    async fn read_gyro(&mut self) -> Result<Vector3<f32>, Self::Error>;

    async fn read_mag(&mut self) -> Result<Vector3<f32>, Self::Error>;

    async fn read_sample(&mut self) -> Result<SensorSample, Self::Error> {
        Ok(SensorSample {
            accel: self.read_accel().await?,
            gyro_rate: self.read_gyro().await?,
            mag: self.read_mag().await?,
        })
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorId {
    TopLeft = 0,
    TopRight = 1,
    BottomLeft = 2,
    BottomRight = 3,
}

impl MotorId {
    pub const ALL: [Self; 4] = [
        Self::TopLeft,
        Self::TopRight,
        Self::BottomLeft,
        Self::BottomRight,
    ];
}

impl TryFrom<u8> for MotorId {
    type Error = ParamError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(ParamError::MotorIndex(value))
    }
}

pub trait MotorDriver {
    type Error: Debug;

    /// `percent` must be within `0..=100`
    fn set_motor_speed(&mut self, motor: MotorId, percent: f32) -> Result<(), Self::Error>;
}

/// Packet radio contract, payloads are at most 32 bytes
pub trait Radio {
    type Error: Debug;

    async fn send(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Copies one received packet into `buf` and returns its length
    async fn receive(&mut self, buf: &mut [u8; 32]) -> Result<usize, Self::Error>;

    async fn data_available(&mut self) -> Result<bool, Self::Error>;
}

/// Transmit side of a UART link
pub trait UartTx {
    type Error: Debug;

    async fn send_byte(&mut self, byte: u8) -> Result<(), Self::Error>;
}

/// Fills the fields of an INFO report
pub trait TelemetrySource {
    fn telemetry(&mut self) -> Info;
}
