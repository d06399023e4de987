use heapless::Vec;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;

use crate::error::FrameError;

/// Largest frame on the wire: header byte plus the INFO payload
pub const MAX_FRAME_LEN: usize = 1 + Info::PAYLOAD_LEN;

/// Wire discriminant. `0x00` is reserved and never valid.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum CommandKind {
    Move = 0x01,
    Info = 0x02,
}

impl CommandKind {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::from_u8(byte)
    }

    pub const fn payload_len(self) -> usize {
        match self {
            Self::Move => Move::PAYLOAD_LEN,
            Self::Info => Info::PAYLOAD_LEN,
        }
    }

    /// Payload plus the header byte
    pub const fn frame_len(self) -> usize {
        1 + self.payload_len()
    }
}

/// Pilot input, one signed byte per stick axis
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub roll: i8,
    pub pitch: i8,
    pub thrust: i8,
    pub yaw: i8,
    pub leds: bool,
    pub music: bool,
}

impl Move {
    pub const PAYLOAD_LEN: usize = 6;

    fn write(&self, out: &mut [u8]) {
        out[0] = self.roll as u8;
        out[1] = self.pitch as u8;
        out[2] = self.thrust as u8;
        out[3] = self.yaw as u8;
        out[4] = self.leds as u8;
        out[5] = self.music as u8;
    }

    fn read(payload: &[u8]) -> Self {
        Self {
            roll: payload[0] as i8,
            pitch: payload[1] as i8,
            thrust: payload[2] as i8,
            yaw: payload[3] as i8,
            leds: payload[4] != 0,
            music: payload[5] != 0,
        }
    }
}

/// Telemetry reported by the drone
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Info {
    /// Distance to ground, cm
    pub distance: f32,
    /// Altitude, m
    pub altitude: f32,
    /// Temperature, °C
    pub temperature: f32,
    /// Battery charge, percent
    pub battery: u8,
}

impl Info {
    pub const PAYLOAD_LEN: usize = 13;

    fn write(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.distance.to_le_bytes());
        out[4..8].copy_from_slice(&self.altitude.to_le_bytes());
        out[8..12].copy_from_slice(&self.temperature.to_le_bytes());
        out[12] = self.battery;
    }

    fn read(payload: &[u8]) -> Self {
        let f32_at = |at: usize| {
            f32::from_le_bytes([payload[at], payload[at + 1], payload[at + 2], payload[at + 3]])
        };
        Self {
            distance: f32_at(0),
            altitude: f32_at(4),
            temperature: f32_at(8),
            battery: payload[12],
        }
    }
}

/// Message exchanged between the boards and passed through the task queues
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Move(Move),
    Info(Info),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Move(_) => CommandKind::Move,
            Self::Info(_) => CommandKind::Info,
        }
    }

    /// Header byte followed by the packed little-endian payload
    pub fn encode(&self) -> Vec<u8, MAX_FRAME_LEN> {
        let kind = self.kind();
        let mut frame = Vec::new();
        // Every frame fits MAX_FRAME_LEN
        let _ = frame.resize(kind.frame_len(), 0);
        frame[0] = kind as u8;
        match self {
            Self::Move(m) => m.write(&mut frame[1..]),
            Self::Info(i) => i.write(&mut frame[1..]),
        }
        frame
    }

    /// Decodes one frame from the start of `bytes`, trailing bytes are ignored
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let header = *bytes.first().ok_or(FrameError::Truncated {
            expected: 1,
            got: 0,
        })?;
        let kind = CommandKind::from_byte(header).ok_or(FrameError::UnknownKind(header))?;
        let expected = kind.frame_len();
        if bytes.len() < expected {
            return Err(FrameError::Truncated {
                expected,
                got: bytes.len(),
            });
        }
        let payload = &bytes[1..expected];
        Ok(match kind {
            CommandKind::Move => Self::Move(Move::read(payload)),
            CommandKind::Info => Self::Info(Info::read(payload)),
        })
    }
}

impl From<Move> for Command {
    fn from(value: Move) -> Self {
        Self::Move(value)
    }
}

impl From<Info> for Command {
    fn from(value: Info) -> Self {
        Self::Info(value)
    }
}
