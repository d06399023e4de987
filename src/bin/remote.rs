//! Application board: nRF24 link with the handset on a mid priority interrupt
//! executor, UART link to the flight board on the thread executor.

#![no_std]
#![no_main]
#![deny(unused_must_use)]

use embassy_executor::Spawner;
use embassy_time::{Delay, Timer};
use embedded_hal_bus::spi::ExclusiveDevice;
use esp_backtrace as _;
use esp_hal::{
    clock::CpuClock,
    gpio::{Level, Output, OutputConfig},
    interrupt::{software::SoftwareInterruptControl, Priority},
    spi::{
        master::{Config as SpiConfig, Spi},
        Mode,
    },
    time::Rate,
    timer::systimer::SystemTimer,
    uart::{self, Uart, UartRx},
    Async, Blocking,
};
use esp_hal_embassy::InterruptExecutor;
use log::{error, info, warn};

use quadlink::{
    config::{CommConfig, TaskPriority, RC_QUEUE_CAPACITY, TELEMETRY_QUEUE_CAPACITY},
    drivers::nrf24::Nrf24,
    link::LinkReceiver,
    protocol::RadioConfig,
    tasks::{DroneCommTask, RcCommTask},
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

type RadioSpi = ExclusiveDevice<Spi<'static, Blocking>, Output<'static>, Delay>;
type Radio = Nrf24<RadioSpi, Output<'static>>;

/// Pilot MOVE commands waiting to go down the UART
static TO_DRONE: BoundedQueue<Command, RC_QUEUE_CAPACITY> = BoundedQueue::new();
static TO_DRONE_READY: Notifier = Notifier::new();

/// INFO reports from the flight board waiting to go over the air
static FROM_DRONE: BoundedQueue<Command, TELEMETRY_QUEUE_CAPACITY> = BoundedQueue::new();
static FROM_DRONE_READY: Notifier = Notifier::new();
static LINK: LinkReceiver<'static, TELEMETRY_QUEUE_CAPACITY> =
    LinkReceiver::new(&FROM_DRONE, &FROM_DRONE_READY);

struct EspUartTx(uart::UartTx<'static, Async>);

impl quadlink::hal::UartTx for EspUartTx {
    type Error = uart::TxError;

    async fn send_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.0.write_async(&[byte]).await.map(|_| ())
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
    DroneCommTask::new(tx, &TO_DRONE, &TO_DRONE_READY, CommConfig::drone_comm())
        .run()
        .await
}

#[embassy_executor::task]
async fn rc_comm_task(mut radio: Radio, config: CommConfig) {
    if let Err(err) = radio.init().await {
        error!("nRF24 init failed: {err:?}");
        return;
    }

    RcCommTask::new(
        radio,
        &TO_DRONE,
        &TO_DRONE_READY,
        &FROM_DRONE,
        &FROM_DRONE_READY,
        config,
    )
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

    let spi = Spi::new(
        peripherals.SPI2,
        SpiConfig::default()
            .with_frequency(Rate::from_mhz(8))
            .with_mode(Mode::_0),
    )
    .unwrap()
    .with_sck(peripherals.GPIO6)
    .with_mosi(peripherals.GPIO7)
    .with_miso(peripherals.GPIO2);
    let csn = Output::new(peripherals.GPIO10, Level::High, OutputConfig::default());
    let ce = Output::new(peripherals.GPIO4, Level::Low, OutputConfig::default());
    let radio = Nrf24::new(
        ExclusiveDevice::new(spi, csn, Delay).unwrap(),
        ce,
        RadioConfig::remote_board(),
    );

    let (uart_rx, uart_tx) = Uart::new(
        peripherals.UART1,
        uart::Config::default().with_baudrate(115_200),
    )
    .unwrap()
    .with_rx(peripherals.GPIO20)
    .with_tx(peripherals.GPIO21)
    .into_async()
    .split();

    let rc_config = CommConfig::rc_comm();
    let sw_ints = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    let rc_executor = mk_static!(
        InterruptExecutor<1>,
        InterruptExecutor::new(sw_ints.software_interrupt1)
    );
    let rc_spawner = rc_executor.start(interrupt_priority(rc_config.priority));
    rc_spawner.must_spawn(rc_comm_task(radio, rc_config));

    spawner.must_spawn(uart_rx_task(uart_rx));
    spawner.must_spawn(drone_comm_task(EspUartTx(uart_tx)));

    info!("Application board up");

    loop {
        Timer::after_secs(10).await;
        let dropped = LINK.dropped();
        if dropped > 0 {
            warn!("{dropped} INFO frames dropped on a full queue");
        }
    }
}
