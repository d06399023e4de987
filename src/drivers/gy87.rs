//! GY-87 board: MPU6050 accelerometer/gyroscope with an HMC5883L magnetometer
//! reached through the MPU6050 I2C bypass

use embedded_hal_async::{delay::DelayNs, i2c::I2c};
use log::{debug, info};
use nalgebra::Vector3;

use crate::hal::ImuSensor;

pub const DEFAULT_MPU6050_ADDR: u8 = 0x68;
pub const DEFAULT_HMC5883L_ADDR: u8 = 0x1E;

const WHOAMI_REG: u8 = 0x75;
const PWR_MGMT_1: u8 = 0x6B;
const USER_CTRL: u8 = 0x6A;
const INT_PIN_CFG: u8 = 0x37;
const GYRO_CONFIG: u8 = 0x1B;
const ACCEL_CONFIG: u8 = 0x1C;
const ACC_REGX_H: u8 = 0x3B;
const GYRO_REGX_H: u8 = 0x43;

const I2C_BYPASS_EN: u8 = 0x02;

const HMC_CONFIG_A: u8 = 0x00;
const HMC_CONFIG_B: u8 = 0x01;
const HMC_MODE: u8 = 0x02;
const HMC_DATA: u8 = 0x03;
/// 1 sample averaged, 15 Hz output
const HMC_SAMPLES_1_RATE_15: u8 = 0x10;
/// ±1.3 Ga
const HMC_RANGE_1_3: u8 = 0x20;
const HMC_CONTINUOUS: u8 = 0x00;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccelRange {
    G2 = 0x00,
    G4 = 0x08,
    G8 = 0x10,
    G16 = 0x18,
}

impl AccelRange {
    /// LSB per g
    pub fn sensitivity(self) -> f32 {
        match self {
            Self::G2 => 16384.0,
            Self::G4 => 8192.0,
            Self::G8 => 4096.0,
            Self::G16 => 2048.0,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GyroRange {
    D250 = 0x00,
    D500 = 0x08,
    D1000 = 0x10,
    D2000 = 0x18,
}

impl GyroRange {
    /// LSB per deg/s
    pub fn sensitivity(self) -> f32 {
        match self {
            Self::D250 => 131.0,
            Self::D500 => 65.5,
            Self::D1000 => 32.8,
            Self::D2000 => 16.4,
        }
    }
}

/// Hard-iron offsets and scale for the magnetometer X/Y axes, in raw counts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MagCalibration {
    pub x_offset: f32,
    pub y_offset: f32,
    pub scale: f32,
}

impl MagCalibration {
    pub fn apply(&self, raw: Vector3<f32>) -> Vector3<f32> {
        Vector3::new(
            (raw.x - self.x_offset) / self.scale,
            (raw.y - self.y_offset) / self.scale,
            raw.z / self.scale,
        )
    }
}

impl Default for MagCalibration {
    fn default() -> Self {
        Self {
            x_offset: 259.0,
            y_offset: -163.0,
            scale: 385.0,
        }
    }
}

/// How the module is soldered relative to the airframe
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mounting {
    #[default]
    Aligned,
    /// Flight board: module rotated 180° about Z, magnetometer rotated another 90°
    FlightBoard,
}

impl Mounting {
    fn accel(self, v: Vector3<f32>) -> Vector3<f32> {
        match self {
            Self::Aligned => v,
            Self::FlightBoard => Vector3::new(-v.x, -v.y, v.z),
        }
    }

    fn gyro(self, v: Vector3<f32>) -> Vector3<f32> {
        match self {
            Self::Aligned => v,
            Self::FlightBoard => Vector3::new(-v.x, -v.y, v.z),
        }
    }

    fn mag(self, v: Vector3<f32>) -> Vector3<f32> {
        match self {
            Self::Aligned => v,
            Self::FlightBoard => Vector3::new(-v.y, -v.x, v.z),
        }
    }
}

/// All possible errors in this driver
#[derive(Debug)]
pub enum Error<E> {
    I2c(E),
    Mpu6050InvalidChipId(u8),
}

pub struct Gy87<I2C> {
    i2c: I2C,
    addr: u8,
    mag_addr: u8,
    accel_range: AccelRange,
    gyro_range: GyroRange,
    mag_cal: MagCalibration,
    mounting: Mounting,
}

impl<I2C, E> Gy87<I2C>
where
    I2C: I2c<Error = E>,
{
    /// Side effect free constructor, nothing is written until [`Gy87::init`]
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            addr: DEFAULT_MPU6050_ADDR,
            mag_addr: DEFAULT_HMC5883L_ADDR,
            accel_range: AccelRange::G8,
            gyro_range: GyroRange::D500,
            mag_cal: MagCalibration::default(),
            mounting: Mounting::Aligned,
        }
    }

    pub fn with_mpu6050_addr(mut self, addr: u8) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_hmc5883_addr(mut self, addr: u8) -> Self {
        self.mag_addr = addr;
        self
    }

    pub fn with_accel_range(mut self, range: AccelRange) -> Self {
        self.accel_range = range;
        self
    }

    pub fn with_gyro_range(mut self, range: GyroRange) -> Self {
        self.gyro_range = range;
        self
    }

    pub fn with_mag_calibration(mut self, cal: MagCalibration) -> Self {
        self.mag_cal = cal;
        self
    }

    pub fn with_mounting(mut self, mounting: Mounting) -> Self {
        self.mounting = mounting;
        self
    }

    pub fn i2c(&mut self) -> &mut I2C {
        &mut self.i2c
    }

    /// Wakes the MPU6050, sets ranges, opens the bypass and starts the magnetometer
    pub async fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<E>> {
        self.write_byte(self.addr, PWR_MGMT_1, 0x00).await?;
        delay.delay_ms(100).await;
        self.verify().await?;

        self.write_byte(self.addr, ACCEL_CONFIG, self.accel_range as u8)
            .await?;
        self.write_byte(self.addr, GYRO_CONFIG, self.gyro_range as u8)
            .await?;

        // Disable the MPU6050 I2C master so the HMC5883L shows up on the main bus
        self.write_byte(self.addr, USER_CTRL, 0x00).await?;
        self.write_byte(self.addr, INT_PIN_CFG, I2C_BYPASS_EN).await?;
        delay.delay_ms(10).await;

        self.write_byte(self.mag_addr, HMC_MODE, HMC_CONTINUOUS).await?;
        self.write_byte(self.mag_addr, HMC_CONFIG_A, HMC_SAMPLES_1_RATE_15)
            .await?;
        self.write_byte(self.mag_addr, HMC_CONFIG_B, HMC_RANGE_1_3)
            .await?;

        info!(
            "GY-87 ready: accel {:?}, gyro {:?}",
            self.accel_range, self.gyro_range
        );
        Ok(())
    }

    async fn verify(&mut self) -> Result<(), Error<E>> {
        let id = self.read_byte(self.addr, WHOAMI_REG).await?;
        if id != DEFAULT_MPU6050_ADDR {
            return Err(Error::Mpu6050InvalidChipId(id));
        }
        Ok(())
    }

    async fn read_word_triplet(&mut self, addr: u8, reg: u8) -> Result<[i16; 3], Error<E>> {
        let mut buf = [0u8; 6];
        self.read_bytes(addr, reg, &mut buf).await?;
        Ok([
            i16::from_be_bytes([buf[0], buf[1]]),
            i16::from_be_bytes([buf[2], buf[3]]),
            i16::from_be_bytes([buf[4], buf[5]]),
        ])
    }

    /// Accelerometer readings in g
    pub async fn get_acc(&mut self) -> Result<Vector3<f32>, Error<E>> {
        let [x, y, z] = self.read_word_triplet(self.addr, ACC_REGX_H).await?;
        let acc = Vector3::new(x as f32, y as f32, z as f32) / self.accel_range.sensitivity();
        Ok(self.mounting.accel(acc))
    }

    /// Gyro readings in deg/s
    pub async fn get_gyro(&mut self) -> Result<Vector3<f32>, Error<E>> {
        let [x, y, z] = self.read_word_triplet(self.addr, GYRO_REGX_H).await?;
        let gyro = Vector3::new(x as f32, y as f32, z as f32) / self.gyro_range.sensitivity();
        Ok(self.mounting.gyro(gyro))
    }

    /// Raw magnetometer counts. The HMC5883L reports X, Z, Y.
    pub async fn read_mag_raw(&mut self) -> Result<Vector3<f32>, Error<E>> {
        let [x, z, y] = self.read_word_triplet(self.mag_addr, HMC_DATA).await?;
        Ok(Vector3::new(x as f32, y as f32, z as f32))
    }

    /// Calibrated magnetic field
    pub async fn read_mag(&mut self) -> Result<Vector3<f32>, Error<E>> {
        let raw = self.read_mag_raw().await?;
        let mag = self.mag_cal.apply(raw);
        debug!("mag raw {raw:?} -> {mag:?}");
        Ok(self.mounting.mag(mag))
    }

    async fn write_byte(&mut self, addr: u8, reg: u8, byte: u8) -> Result<(), Error<E>> {
        self.i2c
            .write(addr, &[reg, byte])
            .await
            .map_err(Error::I2c)
    }

    async fn read_byte(&mut self, addr: u8, reg: u8) -> Result<u8, Error<E>> {
        let mut byte = [0u8; 1];
        self.read_bytes(addr, reg, &mut byte).await?;
        Ok(byte[0])
    }

    async fn read_bytes(&mut self, addr: u8, reg: u8, buf: &mut [u8]) -> Result<(), Error<E>> {
        self.i2c
            .write_read(addr, &[reg], buf)
            .await
            .map_err(Error::I2c)
    }
}

impl<I2C, E> ImuSensor for Gy87<I2C>
where
    I2C: I2c<Error = E>,
    E: core::fmt::Debug,
{
    type Error = Error<E>;

    async fn read_accel(&mut self) -> Result<Vector3<f32>, Self::Error> {
        self.get_acc().await
    }

    async fn read_gyro(&mut self) -> Result<Vector3<f32>, Self::Error> {
        self.get_gyro().await
    }

    async fn read_mag(&mut self) -> Result<Vector3<f32>, Self::Error> {
        Gy87::read_mag(self).await
    }
}

#[cfg(test)]
mod tests {
    use core::convert::Infallible;

    use embassy_futures::block_on;
    use embedded_hal_async::i2c::{ErrorType, Operation};

    use super::*;

    /// Register file per device address, auto-incrementing pointer
    struct FakeBus {
        regs: [[u8; 256]; 128],
        pointer: [u8; 128],
    }

    impl FakeBus {
        fn new() -> Self {
            let mut bus = Self {
                regs: [[0; 256]; 128],
                pointer: [0; 128],
            };
            bus.regs[DEFAULT_MPU6050_ADDR as usize][WHOAMI_REG as usize] = DEFAULT_MPU6050_ADDR;
            bus
        }

        fn set_words(&mut self, addr: u8, reg: u8, words: [i16; 3]) {
            for (i, w) in words.iter().enumerate() {
                let [h, l] = w.to_be_bytes();
                self.regs[addr as usize][reg as usize + 2 * i] = h;
                self.regs[addr as usize][reg as usize + 2 * i + 1] = l;
            }
        }
    }

    impl ErrorType for FakeBus {
        type Error = Infallible;
    }

    impl I2c for FakeBus {
        async fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Infallible> {
            let a = address as usize;
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        if let Some((&reg, data)) = bytes.split_first() {
                            self.pointer[a] = reg;
                            for &b in data {
                                self.regs[a][self.pointer[a] as usize] = b;
                                self.pointer[a] = self.pointer[a].wrapping_add(1);
                            }
                        }
                    }
                    Operation::Read(buf) => {
                        for b in buf.iter_mut() {
                            *b = self.regs[a][self.pointer[a] as usize];
                            self.pointer[a] = self.pointer[a].wrapping_add(1);
                        }
                    }
                }
            }
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        async fn delay_ns(&mut self, _ns: u32) {}
    }

    #[test]
    fn test_init_configures_bypass() {
        let mut imu = Gy87::new(FakeBus::new());
        block_on(imu.init(&mut NoDelay)).unwrap();
        let bus = imu.i2c();
        let mpu = &bus.regs[DEFAULT_MPU6050_ADDR as usize];
        assert_eq!(mpu[PWR_MGMT_1 as usize], 0x00);
        assert_eq!(mpu[USER_CTRL as usize], 0x00);
        assert_eq!(mpu[INT_PIN_CFG as usize], I2C_BYPASS_EN);
        assert_eq!(mpu[ACCEL_CONFIG as usize], AccelRange::G8 as u8);
        assert_eq!(mpu[GYRO_CONFIG as usize], GyroRange::D500 as u8);
        let hmc = &bus.regs[DEFAULT_HMC5883L_ADDR as usize];
        assert_eq!(hmc[HMC_CONFIG_A as usize], HMC_SAMPLES_1_RATE_15);
        assert_eq!(hmc[HMC_CONFIG_B as usize], HMC_RANGE_1_3);
    }

    #[test]
    fn test_wrong_chip_id() {
        let mut bus = FakeBus::new();
        bus.regs[DEFAULT_MPU6050_ADDR as usize][WHOAMI_REG as usize] = 0x12;
        let mut imu = Gy87::new(bus);
        assert!(matches!(
            block_on(imu.init(&mut NoDelay)),
            Err(Error::Mpu6050InvalidChipId(0x12))
        ));
    }

    #[test]
    fn test_scaled_readings() {
        let mut bus = FakeBus::new();
        bus.set_words(DEFAULT_MPU6050_ADDR, ACC_REGX_H, [0, -2048, 4096]);
        bus.set_words(DEFAULT_MPU6050_ADDR, GYRO_REGX_H, [131, 655, -655]);
        let mut imu = Gy87::new(bus);

        let acc = block_on(imu.get_acc()).unwrap();
        assert_eq!(acc, Vector3::new(0.0, -0.5, 1.0));
        let gyro = block_on(imu.get_gyro()).unwrap();
        assert!((gyro.x - 2.0).abs() < 1e-3);
        assert!((gyro.y - 10.0).abs() < 1e-3);
        assert!((gyro.z + 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_mag_axis_order_and_calibration() {
        let mut bus = FakeBus::new();
        // X, Z, Y on the wire
        bus.set_words(DEFAULT_HMC5883L_ADDR, HMC_DATA, [259 + 385, 100, -163]);
        let mut imu = Gy87::new(bus);
        let raw = block_on(imu.read_mag_raw()).unwrap();
        assert_eq!(raw, Vector3::new(644.0, -163.0, 100.0));
        let mag = block_on(ImuSensor::read_mag(&mut imu)).unwrap();
        assert!((mag.x - 1.0).abs() < 1e-6);
        assert!(mag.y.abs() < 1e-6);
    }

    #[test]
    fn test_flight_board_mounting() {
        let mut bus = FakeBus::new();
        bus.set_words(DEFAULT_MPU6050_ADDR, ACC_REGX_H, [4096, 4096, 4096]);
        bus.set_words(DEFAULT_HMC5883L_ADDR, HMC_DATA, [259 + 385, 0, -163 + 770]);
        let mut imu = Gy87::new(bus).with_mounting(Mounting::FlightBoard);
        let acc = block_on(imu.get_acc()).unwrap();
        assert_eq!(acc, Vector3::new(-1.0, -1.0, 1.0));
        let mag = block_on(imu.read_mag()).unwrap();
        assert!((mag.x + 2.0).abs() < 1e-6);
        assert!((mag.y + 1.0).abs() < 1e-6);
    }
}
