use embassy_time::Duration;

/// Magnetic declination in degrees (4°51')
pub const DECLINATION: f32 = 4.0 + 51.0 / 60.0;

/// Queue between the radio task and the UART link
pub const RC_QUEUE_CAPACITY: usize = 30;

/// Queue carrying telemetry back towards the pilot
pub const TELEMETRY_QUEUE_CAPACITY: usize = 10;

/// Starting uncertainty of every attitude axis, in deg²
pub const INITIAL_UNCERTAINTY: f32 = 4.0;

/// Scheduling priority of a task. Higher preempts lower.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskPriority {
    Low = 2,
    Mid = 3,
    High = 4,
}

/// Standard deviations fed to the scalar Kalman filters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseConfig {
    /// Gyroscope, deg/s
    pub gyro_std: f32,
    /// Accelerometer tilt, deg
    pub accel_std: f32,
    /// Magnetometer heading, deg
    pub mag_std: f32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            gyro_std: 4.0,
            accel_std: 3.0,
            mag_std: 0.5,
        }
    }
}

/// PID gains and integral limits of one axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    pub integral_min: f32,
    pub integral_max: f32,
    pub output_weight: f32,
}

impl PidGains {
    pub const ROLL: Self = Self {
        kp: 0.1,
        ki: 0.000855,
        kd: 1.0,
        integral_min: -100_000.0,
        integral_max: 100_000.0,
        output_weight: 1.0,
    };

    pub const PITCH: Self = Self::ROLL;

    pub const YAW: Self = Self {
        kp: 0.001,
        ki: 0.00005,
        kd: 0.0,
        integral_min: -100_000.0,
        integral_max: 100_000.0,
        output_weight: 1.0,
    };

    pub const THRUST: Self = Self {
        kp: 0.995_894_9,
        ki: 0.304_718_77,
        kd: 0.277_113_3,
        integral_min: -11_000.0,
        integral_max: 11_000.0,
        output_weight: 0.01,
    };
}

/// Gains for all four controlled axes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerConfig {
    pub roll: PidGains,
    pub pitch: PidGains,
    pub yaw: PidGains,
    pub thrust: PidGains,
    /// Added to every motor before clamping, in percent
    pub base_throttle: f32,
    /// Roll and pitch setpoints are limited to this many degrees
    pub max_tilt: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            roll: PidGains::ROLL,
            pitch: PidGains::PITCH,
            yaw: PidGains::YAW,
            thrust: PidGains::THRUST,
            base_throttle: 40.0,
            max_tilt: 20.0,
        }
    }
}

/// Control task timing and estimator settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlConfig {
    pub period: Duration,
    pub priority: TaskPriority,
    pub noise: NoiseConfig,
    pub declination: f32,
    pub controller: ControllerConfig,
    /// Emit an INFO message every this many ticks, 0 disables telemetry
    pub telemetry_every: u32,
    /// Check for a stalled partial UART frame every this many ticks
    pub frame_stall_every: u32,
}

impl ControlConfig {
    /// Sample period in seconds
    pub fn dt(&self) -> f32 {
        self.period.as_micros() as f32 / 1_000_000.0
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(5),
            priority: TaskPriority::High,
            noise: NoiseConfig::default(),
            declination: DECLINATION,
            controller: ControllerConfig::default(),
            telemetry_every: 200,
            frame_stall_every: 20,
        }
    }
}

/// Timing of the two communication tasks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommConfig {
    pub period: Duration,
    pub priority: TaskPriority,
    /// Bound on every blocking queue operation
    pub queue_timeout: Duration,
    /// Bound on waiting for a notification
    pub notify_timeout: Duration,
    /// Attempts per byte before a frame is abandoned
    pub send_retries: u8,
    /// Sleep between failed attempts
    pub retry_backoff: Duration,
}

impl CommConfig {
    pub fn rc_comm() -> Self {
        Self {
            period: Duration::from_millis(20),
            priority: TaskPriority::Mid,
            ..Self::default()
        }
    }

    pub fn drone_comm() -> Self {
        Self {
            period: Duration::from_millis(10),
            priority: TaskPriority::Low,
            ..Self::default()
        }
    }
}

impl Default for CommConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(10),
            priority: TaskPriority::Low,
            queue_timeout: Duration::from_millis(5),
            notify_timeout: Duration::from_millis(100),
            send_retries: 3,
            retry_backoff: Duration::from_millis(1),
        }
    }
}
