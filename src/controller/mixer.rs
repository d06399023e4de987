use crate::hal::MotorId;

pub const MOTOR_MIN: f32 = 0.0;
pub const MOTOR_MAX: f32 = 100.0;

/// Motor commands in percent, X configuration seen from above with the nose up
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct MotorSpeeds {
    pub top_left: f32,
    pub top_right: f32,
    pub bottom_left: f32,
    pub bottom_right: f32,
}

/// Per-axis controller outputs
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct AxisOutputs {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub thrust: f32,
}

impl MotorSpeeds {
    pub const STOPPED: Self = Self {
        top_left: 0.0,
        top_right: 0.0,
        bottom_left: 0.0,
        bottom_right: 0.0,
    };

    /// Linear X-quad mix, then clamp every motor into `[0, 100]`.
    /// Diagonal pairs spin the same direction, so yaw alternates sign across them.
    pub fn mix(out: &AxisOutputs, base: f32) -> Self {
        let t = base + out.thrust;
        Self {
            top_left: t + out.roll + out.pitch + out.yaw,
            top_right: t - out.roll + out.pitch - out.yaw,
            bottom_left: t + out.roll - out.pitch - out.yaw,
            bottom_right: t - out.roll - out.pitch + out.yaw,
        }
        .clamped()
    }

    pub fn clamped(self) -> Self {
        let c = |v: f32| {
            if v.is_nan() {
                MOTOR_MIN
            } else {
                v.clamp(MOTOR_MIN, MOTOR_MAX)
            }
        };
        Self {
            top_left: c(self.top_left),
            top_right: c(self.top_right),
            bottom_left: c(self.bottom_left),
            bottom_right: c(self.bottom_right),
        }
    }

    pub fn get(&self, motor: MotorId) -> f32 {
        match motor {
            MotorId::TopLeft => self.top_left,
            MotorId::TopRight => self.top_right,
            MotorId::BottomLeft => self.bottom_left,
            MotorId::BottomRight => self.bottom_right,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (MotorId, f32)> + '_ {
        MotorId::ALL.into_iter().map(|m| (m, self.get(m)))
    }
}
