use crate::error::{FrameError, ParamError};

use super::command::Command;

/// Every radio transmission carries exactly this many bytes
pub const PACKET_LEN: usize = 32;

pub type Packet = [u8; PACKET_LEN];

/// 5-byte radio pipe address
pub type PipeAddress = [u8; 5];

/// Pipe written by the pilot handset and read on board
pub const REMOTE_TO_DRONE: PipeAddress = *b"RtoD\0";

/// Pipe written on board and read by the pilot handset
pub const DRONE_TO_REMOTE: PipeAddress = *b"DtoR\0";

const MAX_CHANNEL: u8 = 125;

/// Zero-padded fixed-size packet
pub fn encode_packet(cmd: &Command) -> Packet {
    let frame = cmd.encode();
    let mut packet = [0; PACKET_LEN];
    packet[..frame.len()].copy_from_slice(&frame);
    packet
}

/// Decodes the command at the start of a received packet, ignoring the padding
pub fn decode_packet(packet: &[u8]) -> Result<Command, FrameError> {
    Command::decode(packet)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DataRate {
    Kbps250,
    #[default]
    Mbps1,
    Mbps2,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CrcLength {
    OneByte,
    #[default]
    TwoBytes,
}

/// Link constants applied once at radio init
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioConfig {
    pub write_address: PipeAddress,
    pub read_address: PipeAddress,
    pub channel: u8,
    pub data_rate: DataRate,
    pub crc: CrcLength,
    /// Auto retransmit delay in 250 µs steps minus one (0..=15)
    pub retransmit_delay: u8,
    /// Auto retransmit attempts (0..=15)
    pub retransmit_count: u8,
}

impl RadioConfig {
    /// Board on the drone talking to the pilot handset
    pub fn remote_board() -> Self {
        Self {
            write_address: DRONE_TO_REMOTE,
            read_address: REMOTE_TO_DRONE,
            channel: 115,
            data_rate: DataRate::Mbps1,
            crc: CrcLength::TwoBytes,
            retransmit_delay: 5,
            retransmit_count: 15,
        }
    }

    /// Pilot handset, mirror image of [`RadioConfig::remote_board`]
    pub fn handset() -> Self {
        Self {
            write_address: REMOTE_TO_DRONE,
            read_address: DRONE_TO_REMOTE,
            ..Self::remote_board()
        }
    }

    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        if self.channel > MAX_CHANNEL {
            return Err(ParamError::RadioChannel(self.channel));
        }
        if self.write_address == [0; 5]
            || self.read_address == [0; 5]
            || self.write_address == self.read_address
        {
            return Err(ParamError::RadioAddress);
        }
        if self.retransmit_delay > 15 || self.retransmit_count > 15 {
            return Err(ParamError::RadioRetransmit);
        }
        Ok(())
    }

    /// SETUP_RETR register value
    pub fn setup_retr(&self) -> u8 {
        (self.retransmit_delay << 4) | self.retransmit_count
    }
}
