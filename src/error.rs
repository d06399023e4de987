/// Frame decoding errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Header byte is not a known command discriminant
    UnknownKind(u8),
    /// Fewer bytes than the command's fixed frame length
    Truncated { expected: usize, got: usize },
}

/// Bounded queue status for a failed push or pop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    Full,
    Empty,
}

/// Invalid argument passed to a configuration or initialization call
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamError {
    EmptyBuffer,
    BufferTooLong { max: usize, got: usize },
    MotorIndex(u8),
    MotorSpeed(f32),
    RadioChannel(u8),
    RadioAddress,
    RadioRetransmit,
    DimensionMismatch,
    CapacityExceeded,
}
