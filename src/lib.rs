#![no_std]
#![deny(unused_must_use)]

pub mod config;
pub mod controller;
pub mod drivers;
pub mod error;
pub mod estimator;
pub mod hal;
pub mod link;
pub mod matrix;
pub mod protocol;
pub mod queue;
pub mod tasks;

pub use controller::{MotorSpeeds, PidAxisState, PilotSetpoint, StabilizationController};
pub use error::{FrameError, ParamError, QueueError};
pub use estimator::{AttitudeEstimate, AttitudeEstimator, Axis, KalmanAxisInput};
pub use hal::SensorSample;
pub use protocol::{Command, CommandKind, FrameParser, FramingState, Info, Move};
pub use queue::{BoundedQueue, Notifier};
