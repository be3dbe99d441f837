//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding or decoding frames.
///
/// Every variant is fatal for the connection it occurred on.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Declared or produced payload exceeds [`crate::MAX_FRAME_SIZE`].
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: u32, max: u32 },

    /// Header carries an opcode outside the known set.
    #[error("unknown opcode: {0}")]
    UnknownOpcode(u32),

    /// Payload is not valid JSON, or does not match the expected shape.
    #[error("malformed payload: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Buffer ends before the frame does.
    #[error("incomplete frame: expected {expected} bytes, got {received}")]
    IncompleteFrame { expected: usize, received: usize },
}
