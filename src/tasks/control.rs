use embassy_time::Ticker;
use log::{debug, info, warn};

use crate::{
    config::ControlConfig,
    controller::{vertical_accel, MotorSpeeds, PilotSetpoint, StabilizationController},
    estimator::{AttitudeEstimate, AttitudeEstimator},
    hal::{ImuSensor, MotorDriver, TelemetrySource},
    link::LinkReceiver,
    protocol::{Command, Move},
    queue::{BoundedQueue, Notifier},
};

/// What happened during one control tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    Actuated(MotorSpeeds),
    /// Sensors could not be read, motors keep their previous command
    SensorFault,
    /// The estimate went non-finite and was reset, motors keep their previous command
    EstimatorReset,
}

/// Owner of the attitude estimate. Each tick reads the sensors, fuses, applies the
/// latest pilot command and drives the motors.
pub struct ControlTask<'a, IMU, M, T, const IN: usize, const OUT: usize> {
    imu: IMU,
    motors: M,
    telemetry: T,
    estimator: AttitudeEstimator,
    controller: StabilizationController,
    link: &'a LinkReceiver<'a, IN>,
    outbound: &'a BoundedQueue<Command, OUT>,
    outbound_notify: &'a Notifier,
    config: ControlConfig,
    setpoint: PilotSetpoint,
    last_move: Option<Move>,
    ticks: u32,
}

impl<'a, IMU, M, T, const IN: usize, const OUT: usize> ControlTask<'a, IMU, M, T, IN, OUT>
where
    IMU: ImuSensor,
    M: MotorDriver,
    T: TelemetrySource,
{
    pub fn new(
        imu: IMU,
        motors: M,
        telemetry: T,
        link: &'a LinkReceiver<'a, IN>,
        outbound: &'a BoundedQueue<Command, OUT>,
        outbound_notify: &'a Notifier,
        config: ControlConfig,
    ) -> Self {
        Self {
            imu,
            motors,
            telemetry,
            estimator: AttitudeEstimator::new(config.noise, config.declination),
            controller: StabilizationController::new(&config.controller),
            link,
            outbound,
            outbound_notify,
            config,
            setpoint: PilotSetpoint::default(),
            last_move: None,
            ticks: 0,
        }
    }

    pub fn estimate(&self) -> &AttitudeEstimate {
        self.estimator.estimate()
    }

    pub fn setpoint(&self) -> &PilotSetpoint {
        &self.setpoint
    }

    pub fn last_move(&self) -> Option<Move> {
        self.last_move
    }

    /// Motors stay stopped until the first MOVE arrives
    pub fn is_armed(&self) -> bool {
        self.last_move.is_some()
    }

    pub fn motors(&mut self) -> &mut M {
        &mut self.motors
    }

    fn drain_commands(&mut self) {
        self.link.notifier().take();
        while let Ok(cmd) = self.link.queue().try_pop() {
            match cmd {
                Command::Move(m) => {
                    if self.last_move.is_none() {
                        info!("First pilot command, motors armed");
                    }
                    self.setpoint = PilotSetpoint::from_move(&m, self.controller.max_tilt());
                    self.last_move = Some(m);
                }
                Command::Info(_) => debug!("Ignoring INFO on the control link"),
            }
        }
    }

    fn actuate(&mut self, speeds: &MotorSpeeds) {
        for (motor, percent) in speeds.iter() {
            if let Err(err) = self.motors.set_motor_speed(motor, percent) {
                warn!("Motor {motor:?} rejected {percent}: {err:?}");
            }
        }
    }

    fn report(&mut self) {
        let every = self.config.telemetry_every;
        if every == 0 || self.ticks % every != 0 {
            return;
        }
        let info = self.telemetry.telemetry();
        match self.outbound.try_push(Command::Info(info)) {
            Ok(()) => self.outbound_notify.notify(),
            Err(_) => debug!("Telemetry queue full, INFO dropped"),
        }
    }

    pub async fn tick(&mut self) -> TickOutcome {
        self.ticks = self.ticks.wrapping_add(1);

        let every = self.config.frame_stall_every;
        if every != 0 && self.ticks % every == 0 {
            self.link.expire_stalled();
        }

        let sample = match self.imu.read_sample().await {
            Ok(sample) => sample,
            Err(err) => {
                warn!("IMU read failed: {err:?}");
                return TickOutcome::SensorFault;
            }
        };

        let estimate = self.estimator.fuse(&sample, self.config.dt());
        if !estimate.is_finite() {
            warn!("Attitude estimate diverged ({estimate:?}), resetting");
            self.estimator.reset();
            self.controller.reset();
            return TickOutcome::EstimatorReset;
        }

        self.drain_commands();

        let speeds = if self.is_armed() {
            self.controller
                .update(&estimate, vertical_accel(&sample.accel), &self.setpoint)
        } else {
            MotorSpeeds::STOPPED
        };
        self.actuate(&speeds);
        self.report();

        TickOutcome::Actuated(speeds)
    }

    pub async fn run(mut self) -> ! {
        info!("Control task running every {}us", self.config.period.as_micros());
        let mut ticker = Ticker::every(self.config.period);
        loop {
            self.tick().await;
            ticker.next().await;
        }
    }
}
