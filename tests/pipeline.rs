//! Both boards wired together in one process: handset radio, remote board,
//! UART link in both directions and the flight controller.

use std::{collections::VecDeque, convert::Infallible};

use embassy_futures::block_on;
use embassy_time::Duration;
use nalgebra::Vector3;

use quadlink::{
    config::{CommConfig, ControlConfig},
    hal::{ImuSensor, MotorDriver, MotorId, Radio, TelemetrySource, UartTx},
    link::LinkReceiver,
    protocol::{decode_packet, encode_packet, Packet, PACKET_LEN},
    tasks::{ControlTask, DroneCommTask, RcCommTask, TickOutcome},
    BoundedQueue, Command, Info, Move, Notifier,
};

struct Wire<'a, const N: usize>(&'a LinkReceiver<'a, N>);

impl<const N: usize> UartTx for Wire<'_, N> {
    type Error = Infallible;

    async fn send_byte(&mut self, byte: u8) -> Result<(), Infallible> {
        self.0.on_byte(byte);
        Ok(())
    }
}

#[derive(Default)]
struct Handset {
    to_air: VecDeque<Packet>,
    from_air: Vec<Packet>,
}

impl Radio for Handset {
    type Error = Infallible;

    async fn send(&mut self, bytes: &[u8]) -> Result<(), Infallible> {
        let mut packet = [0; PACKET_LEN];
        packet[..bytes.len()].copy_from_slice(bytes);
        self.from_air.push(packet);
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8; 32]) -> Result<usize, Infallible> {
        match self.to_air.pop_front() {
            Some(packet) => {
                *buf = packet;
                Ok(PACKET_LEN)
            }
            None => Ok(0),
        }
    }

    async fn data_available(&mut self) -> Result<bool, Infallible> {
        Ok(!self.to_air.is_empty())
    }
}

struct TiltedImu {
    roll_deg: f32,
}

impl ImuSensor for TiltedImu {
    type Error = Infallible;

    async fn read_accel(&mut self) -> Result<Vector3<f32>, Infallible> {
        let r = self.roll_deg.to_radians();
        Ok(Vector3::new(0.0, r.sin(), r.cos()))
    }

    async fn read_gyro(&mut self) -> Result<Vector3<f32>, Infallible> {
        Ok(Vector3::zeros())
    }

    async fn read_mag(&mut self) -> Result<Vector3<f32>, Infallible> {
        Ok(Vector3::new(1.0, 0.0, 0.0))
    }
}

#[derive(Default)]
struct Motors([f32; 4]);

impl MotorDriver for Motors {
    type Error = Infallible;

    fn set_motor_speed(&mut self, motor: MotorId, percent: f32) -> Result<(), Infallible> {
        self.0[motor as usize] = percent;
        Ok(())
    }
}

const REPORT: Info = Info {
    distance: 0.0,
    altitude: 1.25,
    temperature: 24.0,
    battery: 91,
};

struct Battery;

impl TelemetrySource for Battery {
    fn telemetry(&mut self) -> Info {
        REPORT
    }
}

fn fast(config: CommConfig) -> CommConfig {
    CommConfig {
        queue_timeout: Duration::from_millis(2),
        notify_timeout: Duration::from_millis(2),
        ..config
    }
}

#[test]
fn test_stick_to_motors_and_telemetry_back() {
    // Remote board: radio in, UART out to the drone, UART in from the drone
    let to_drone = BoundedQueue::<Command, 30>::new();
    let to_drone_notify = Notifier::new();
    let from_drone = BoundedQueue::<Command, 10>::new();
    let from_drone_notify = Notifier::new();
    let remote_rx = LinkReceiver::new(&from_drone, &from_drone_notify);

    // Flight board: UART in from the remote, telemetry queue out
    let moves = BoundedQueue::<Command, 30>::new();
    let moves_notify = Notifier::new();
    let drone_rx = LinkReceiver::new(&moves, &moves_notify);
    let telemetry = BoundedQueue::<Command, 10>::new();
    let telemetry_notify = Notifier::new();

    let mut handset = Handset::default();
    handset
        .to_air
        .push_back(encode_packet(&Command::Move(Move::default())));

    let mut rc = RcCommTask::new(
        handset,
        &to_drone,
        &to_drone_notify,
        &from_drone,
        &from_drone_notify,
        fast(CommConfig::rc_comm()),
    );
    let mut remote_uart = DroneCommTask::new(
        Wire(&drone_rx),
        &to_drone,
        &to_drone_notify,
        fast(CommConfig::drone_comm()),
    );
    let mut drone_uart = DroneCommTask::new(
        Wire(&remote_rx),
        &telemetry,
        &telemetry_notify,
        fast(CommConfig::drone_comm()),
    );
    let config = ControlConfig::default();
    let mut control = ControlTask::new(
        TiltedImu { roll_deg: 10.0 },
        Motors::default(),
        Battery,
        &drone_rx,
        &telemetry,
        &telemetry_notify,
        config,
    );

    block_on(async {
        rc.step().await.unwrap();
        assert_eq!(remote_uart.step().await, 1);
        assert_eq!(moves.len(), 1);

        let mut last = None;
        for _ in 0..config.telemetry_every {
            match control.tick().await {
                TickOutcome::Actuated(speeds) => last = Some(speeds),
                other => panic!("unexpected {other:?}"),
            }
        }
        let speeds = last.unwrap();

        assert!(control.is_armed());
        assert!((control.estimate().roll - 10.0).abs() < 0.5);
        assert!(speeds.top_left < speeds.top_right);
        assert!(speeds.bottom_left < speeds.bottom_right);
        assert_eq!(control.motors().0[0], speeds.top_left);

        assert_eq!(drone_uart.step().await, 1);
        assert_eq!(from_drone.len(), 1);
        rc.step().await.unwrap();
        assert!(!from_drone_notify.take());
    });

    let sent = &rc.radio().from_air;
    assert_eq!(sent.len(), 1);
    assert_eq!(decode_packet(&sent[0]), Ok(Command::Info(REPORT)));
}

#[test]
fn test_corrupted_link_recovers() {
    let moves = BoundedQueue::<Command, 30>::new();
    let notify = Notifier::new();
    let rx = LinkReceiver::new(&moves, &notify);

    let cmd = Command::Move(Move {
        roll: -64,
        pitch: 64,
        thrust: 0,
        yaw: 12,
        leds: false,
        music: true,
    });
    let frame = quadlink::protocol::encode_frame(&cmd);

    rx.on_bytes(&[0x00, 0x7F, 0xFF]);
    rx.on_bytes(&frame[..3]);
    assert!(!rx.expire_stalled());
    assert!(rx.expire_stalled());
    rx.on_bytes(&frame);

    assert_eq!(moves.try_pop(), Ok(cmd));
    assert!(moves.is_empty());
}
