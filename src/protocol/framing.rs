use heapless::Vec;
use log::trace;

use super::command::{Command, CommandKind, MAX_FRAME_LEN};

/// Receive side of one UART link
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FramingState {
    #[default]
    AwaitingHeader,
    /// `buf` holds the header byte followed by the payload received so far.
    /// `expected_len` counts the header too.
    Receiving {
        expected_len: usize,
        buf: Vec<u8, MAX_FRAME_LEN>,
    },
}

/// Byte-at-a-time frame parser. Never blocks, so it can run from an interrupt handler.
#[derive(Debug, Default)]
pub struct FrameParser {
    state: FramingState,
    /// Wrapping count of bytes accepted into a frame, used to detect stalls
    progress: u32,
}

impl FrameParser {
    pub const fn new() -> Self {
        Self {
            state: FramingState::AwaitingHeader,
            progress: 0,
        }
    }

    pub fn state(&self) -> &FramingState {
        &self.state
    }

    pub fn progress(&self) -> u32 {
        self.progress
    }

    pub fn is_idle(&self) -> bool {
        self.state == FramingState::AwaitingHeader
    }

    /// Drops any partially received frame
    pub fn reset(&mut self) {
        self.state = FramingState::AwaitingHeader;
    }

    /// Feeds one byte, returning a command once its last byte arrives.
    /// Unknown header bytes are discarded.
    pub fn push(&mut self, byte: u8) -> Option<Command> {
        match &mut self.state {
            FramingState::AwaitingHeader => {
                let kind = CommandKind::from_byte(byte)?;
                let mut buf = Vec::new();
                // Capacity is never smaller than one byte
                let _ = buf.push(byte);
                self.state = FramingState::Receiving {
                    expected_len: kind.frame_len(),
                    buf,
                };
                self.progress = self.progress.wrapping_add(1);
                None
            }
            FramingState::Receiving { expected_len, buf } => {
                if buf.push(byte).is_err() {
                    self.reset();
                    return None;
                }
                self.progress = self.progress.wrapping_add(1);
                if buf.len() < *expected_len {
                    return None;
                }
                let decoded = Command::decode(buf);
                self.reset();
                match decoded {
                    Ok(cmd) => Some(cmd),
                    Err(err) => {
                        trace!("Dropped frame: {err:?}");
                        None
                    }
                }
            }
        }
    }
}

/// Frame ready to be written to the UART byte by byte
pub fn encode_frame(cmd: &Command) -> Vec<u8, MAX_FRAME_LEN> {
    cmd.encode()
}
