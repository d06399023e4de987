use crate::config::PidGains;

/// PID state of one controlled axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidAxisState {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    pub error: f32,
    pub last_error: f32,
    pub integral: f32,
    pub integral_min: f32,
    pub integral_max: f32,
    pub output_weight: f32,
}

impl PidAxisState {
    pub const fn new(gains: PidGains) -> Self {
        Self {
            kp: gains.kp,
            ki: gains.ki,
            kd: gains.kd,
            error: 0.0,
            last_error: 0.0,
            integral: 0.0,
            integral_min: gains.integral_min,
            integral_max: gains.integral_max,
            output_weight: gains.output_weight,
        }
    }

    pub fn compute(&mut self, setpoint: f32, measurement: f32) -> f32 {
        self.error = setpoint - measurement;
        // A NaN error is not accumulated, the integral keeps its last bounded value
        let integral = self.integral + self.error;
        if !integral.is_nan() {
            self.integral = integral.clamp(self.integral_min, self.integral_max);
        }
        let output = self.output_weight
            * (self.kp * self.error
                + self.ki * self.integral
                + self.kd * (self.error - self.last_error));
        self.last_error = self.error;
        output
    }

    /// Clears accumulated error, gains are kept
    pub fn reset(&mut self) {
        self.error = 0.0;
        self.last_error = 0.0;
        self.integral = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAINS: PidGains = PidGains {
        kp: 2.0,
        ki: 0.5,
        kd: 1.0,
        integral_min: -10.0,
        integral_max: 10.0,
        output_weight: 1.0,
    };

    #[test]
    fn test_first_step() {
        let mut pid = PidAxisState::new(GAINS);
        // e = 3, I = 3, D = 3
        assert_eq!(pid.compute(5.0, 2.0), 2.0 * 3.0 + 0.5 * 3.0 + 3.0);
        assert_eq!(pid.last_error, 3.0);
        // e = 3, I = 6, D = 0
        assert_eq!(pid.compute(5.0, 2.0), 6.0 + 3.0);
    }

    #[test]
    fn test_output_weight() {
        let mut pid = PidAxisState::new(PidGains {
            output_weight: 0.01,
            ..GAINS
        });
        assert!((pid.compute(1.0, 0.0) - 0.01 * (2.0 + 0.5 + 1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_integral_stays_bounded() {
        let mut pid = PidAxisState::new(GAINS);
        let mut seed: u32 = 0x1234_5678;
        for i in 0..10_000 {
            // xorshift, with long runs of one sign every few hundred steps
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let noise = (seed % 2001) as f32 / 100.0 - 10.0;
            let bias = if (i / 300) % 2 == 0 { 50.0 } else { -50.0 };
            pid.compute(bias + noise, 0.0);
            assert!(pid.integral >= GAINS.integral_min);
            assert!(pid.integral <= GAINS.integral_max);
        }
    }

    #[test]
    fn test_nan_error_keeps_integral_bounded() {
        let mut pid = PidAxisState::new(GAINS);
        pid.compute(4.0, 0.0);
        pid.compute(f32::NAN, 0.0);
        assert_eq!(pid.integral, 4.0);

        for _ in 0..10 {
            pid.compute(1.0, 0.0);
            assert!(pid.integral >= GAINS.integral_min);
            assert!(pid.integral <= GAINS.integral_max);
        }
        assert_eq!(pid.integral, 10.0);
        assert!(pid.compute(0.0, 0.0).is_finite());
    }

    #[test]
    fn test_integral_saturates_exactly() {
        let mut pid = PidAxisState::new(GAINS);
        for _ in 0..100 {
            pid.compute(1_000.0, 0.0);
        }
        assert_eq!(pid.integral, 10.0);
        pid.compute(-1_000_000.0, 0.0);
        assert_eq!(pid.integral, -10.0);
        pid.reset();
        assert_eq!(pid.integral, 0.0);
    }
}
