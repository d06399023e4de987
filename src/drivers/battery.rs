//! Battery gauge from a 12-bit ADC reading behind a resistor divider

use crate::{hal::TelemetrySource, protocol::Info};

const ADC_REF_V: f32 = 3.3;
const ADC_FULL_SCALE: f32 = 4096.0;
/// Divider 15 kΩ over 4.7 kΩ
const DIVIDER_RATIO: f32 = 19.7 / 4.7;
/// 3S pack considered empty / full
const EMPTY_V: f32 = 10.0;
const FULL_V: f32 = 11.3;

/// Pack voltage from a raw ADC count
pub fn pack_voltage(raw: u16) -> f32 {
    ADC_REF_V * raw as f32 / ADC_FULL_SCALE * DIVIDER_RATIO
}

/// Charge in percent, saturated to `0..=100`
pub fn battery_percent(raw: u16) -> u8 {
    let percent = (pack_voltage(raw) - EMPTY_V) / (FULL_V - EMPTY_V) * 100.0;
    percent.clamp(0.0, 100.0) as u8
}

/// INFO source reporting battery charge. Altitude, distance and temperature
/// have no sensor on this airframe and stay zero.
pub struct BatteryTelemetry<F> {
    read_adc: F,
    last: u8,
}

impl<F: FnMut() -> Option<u16>> BatteryTelemetry<F> {
    pub fn new(read_adc: F) -> Self {
        Self { read_adc, last: 0 }
    }
}

impl<F: FnMut() -> Option<u16>> TelemetrySource for BatteryTelemetry<F> {
    fn telemetry(&mut self) -> Info {
        if let Some(raw) = (self.read_adc)() {
            self.last = battery_percent(raw);
        }
        Info {
            battery: self.last,
            ..Default::default()
        }
    }
}
