//! Wire formats shared by both boards: UART framing and fixed-size radio packets

pub mod command;
pub mod framing;
pub mod radio;

pub use command::{Command, CommandKind, Info, Move, MAX_FRAME_LEN};
pub use framing::{encode_frame, FrameParser, FramingState};
pub use radio::{decode_packet, encode_packet, Packet, RadioConfig, PACKET_LEN};
