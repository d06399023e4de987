//! Flight board: stabilization loop on a high priority interrupt executor,
//! UART link to the remote board on the thread executor.

#![no_std]
#![no_main]
#![deny(unused_must_use)]

use embassy_embedded_hal::shared_bus::asynch::i2c::I2cDevice;
use embassy_executor::Spawner;
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, mutex::Mutex};
use embassy_time::{Delay, Timer};
use esp_backtrace as _;
use esp_hal::{
    analog::adc::{Adc, AdcConfig, AdcPin, Attenuation},
    clock::CpuClock,
    gpio::{AnyPin, GpioPin},
    i2c::master::I2c,
    interrupt::{software::SoftwareInterruptControl, Priority},
    ledc::{
        channel::{self, ChannelIFace},
        timer::{self, TimerIFace},
        LSGlobalClkSource, Ledc, LowSpeed,
    },
    peripherals::ADC1,
    time::Rate,
    timer::systimer::SystemTimer,
    uart::{self, Uart, UartRx},
    Async, Blocking,
};
use esp_hal_embassy::InterruptExecutor;
use log::{error, info, warn};
use static_cell::StaticCell;

use quadlink::{
    config::{CommConfig, ControlConfig, TaskPriority, RC_QUEUE_CAPACITY, TELEMETRY_QUEUE_CAPACITY},
    drivers::{
        battery::BatteryTelemetry,
        esc::Esc,
        gy87::{Gy87, Mounting},
    },
    hal::{MotorDriver, MotorId},
    link::LinkReceiver,
    tasks::{ControlTask, DroneCommTask},
    BoundedQueue, Command, Notifier,
};

macro_rules! mk_static {
    ($t:ty,$val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}

type I2cBus = I2c<'static, Async>;
type I2cDev = I2cDevice<'static, CriticalSectionRawMutex, I2cBus>;
type EscChannel = channel::Channel<'static, LowSpeed>;
type BatteryPin = AdcPin<GpioPin<2>, ADC1>;

/// MOVE commands decoded from the remote board
static MOVES: BoundedQueue<Command, RC_QUEUE_CAPACITY> = BoundedQueue::new();
static MOVES_READY: Notifier = Notifier::new();
static LINK: LinkReceiver<'static, RC_QUEUE_CAPACITY> = LinkReceiver::new(&MOVES, &MOVES_READY);

/// INFO reports going back to the remote board
static TELEMETRY: BoundedQueue<Command, TELEMETRY_QUEUE_CAPACITY> = BoundedQueue::new();
static TELEMETRY_READY: Notifier = Notifier::new();

struct EspUartTx(uart::UartTx<'static, Async>);

impl quadlink::hal::UartTx for EspUartTx {
    type Error = uart::TxError;

    async fn send_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.0.write_async(&[byte]).await.map(|_| ())
    }
}

/// LEDC channels hold a `&dyn` timer reference and are not `Send`. They are
/// configured once in `main` and owned by the control executor afterwards.
struct Motors(Esc<EscChannel>);

unsafe impl Send for Motors {}

impl MotorDriver for Motors {
    type Error = <Esc<EscChannel> as MotorDriver>::Error;

    fn set_motor_speed(&mut self, motor: MotorId, percent: f32) -> Result<(), Self::Error> {
        self.0.set_motor_speed(motor, percent)
    }
}

fn interrupt_priority(priority: TaskPriority) -> Priority {
    match priority {
        TaskPriority::Low => Priority::Priority2,
        TaskPriority::Mid => Priority::Priority3,
        TaskPriority::High => Priority::Priority4,
    }
}

#[embassy_executor::task]
async fn uart_rx_task(mut rx: UartRx<'static, Async>) {
    let mut buf = [0u8; 16];
    loop {
        match rx.read_async(&mut buf).await {
            Ok(n) => LINK.on_bytes(&buf[..n]),
            Err(err) => {
                warn!("UART read error: {err:?}");
                LINK.reset();
            }
        }
    }
}

#[embassy_executor::task]
async fn drone_comm_task(tx: EspUartTx) {
    DroneCommTask::new(tx, &TELEMETRY, &TELEMETRY_READY, CommConfig::drone_comm())
        .run()
        .await
}

#[embassy_executor::task]
async fn control_task(
    mut imu: Gy87<I2cDev>,
    mut motors: Motors,
    mut adc: Adc<'static, ADC1, Blocking>,
    mut battery_pin: BatteryPin,
    config: ControlConfig,
) {
    if let Err(err) = imu.init(&mut Delay).await {
        error!("GY-87 init failed: {err:?}");
        return;
    }
    if let Err(err) = motors.0.arm() {
        error!("ESC arming failed: {err:?}");
        return;
    }

    let battery = BatteryTelemetry::new(move || adc.read_oneshot(&mut battery_pin).ok());

    ControlTask::new(imu, motors, battery, &LINK, &TELEMETRY, &TELEMETRY_READY, config)
        .run()
        .await
}

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) -> ! {
    esp_println::logger::init_logger_from_env();
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let systimer = SystemTimer::new(peripherals.SYSTIMER);
    esp_hal_embassy::init(systimer.alarm0);

    let i2c = I2c::new(
        peripherals.I2C0,
        esp_hal::i2c::master::Config::default().with_frequency(Rate::from_khz(400)),
    )
    .unwrap()
    .into_async()
    .with_scl(peripherals.GPIO21)
    .with_sda(peripherals.GPIO20);

    static I2C_BUS: StaticCell<Mutex<CriticalSectionRawMutex, I2cBus>> = StaticCell::new();
    let i2c_bus = I2C_BUS.init(Mutex::new(i2c));
    let imu = Gy87::new(I2cDevice::new(i2c_bus)).with_mounting(Mounting::FlightBoard);

    let mut ledc = Ledc::new(peripherals.LEDC);
    ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);
    let esc_timer = mk_static!(
        timer::Timer<'static, LowSpeed>,
        ledc.timer::<LowSpeed>(timer::Number::Timer0)
    );
    esc_timer
        .configure(timer::config::Config {
            duty: timer::config::Duty::Duty14Bit,
            clock_source: timer::LSClockSource::APBClk,
            frequency: Rate::from_hz(50),
        })
        .unwrap();

    let esc_channel = |number: channel::Number, pin: AnyPin| {
        let mut ch = ledc.channel(number, pin);
        ch.configure(channel::config::Config {
            timer: &*esc_timer,
            duty_pct: 0,
            pin_config: channel::config::PinConfig::PushPull,
        })
        .map(|_| ch)
    };
    let motors = Motors(Esc::new([
        esc_channel(channel::Number::Channel0, peripherals.GPIO4.into()).unwrap(),
        esc_channel(channel::Number::Channel1, peripherals.GPIO5.into()).unwrap(),
        esc_channel(channel::Number::Channel2, peripherals.GPIO6.into()).unwrap(),
        esc_channel(channel::Number::Channel3, peripherals.GPIO7.into()).unwrap(),
    ]));

    let mut adc_config = AdcConfig::new();
    let battery_pin = adc_config.enable_pin(peripherals.GPIO2, Attenuation::_11dB);
    let adc = Adc::new(peripherals.ADC1, adc_config);

    let (uart_rx, uart_tx) = Uart::new(
        peripherals.UART1,
        uart::Config::default().with_baudrate(115_200),
    )
    .unwrap()
    .with_rx(peripherals.GPIO10)
    .with_tx(peripherals.GPIO3)
    .into_async()
    .split();

    let control_config = ControlConfig::default();
    let sw_ints = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    let control_executor = mk_static!(
        InterruptExecutor<2>,
        InterruptExecutor::new(sw_ints.software_interrupt2)
    );
    let control_spawner = control_executor.start(interrupt_priority(control_config.priority));
    control_spawner.must_spawn(control_task(imu, motors, adc, battery_pin, control_config));

    spawner.must_spawn(uart_rx_task(uart_rx));
    spawner.must_spawn(drone_comm_task(EspUartTx(uart_tx)));

    info!("Flight board up");

    loop {
        Timer::after_secs(10).await;
        let dropped = LINK.dropped();
        if dropped > 0 {
            warn!("{dropped} MOVE frames dropped on a full queue");
        }
    }
}
