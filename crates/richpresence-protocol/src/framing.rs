//! Length-prefixed frame codec.
//!
//! [`encode_frame`] produces one complete frame to be written in a single
//! call. [`FrameDecoder`] accumulates socket reads and yields frames only
//! once all of their payload bytes have arrived, so a frame split across
//! reads and several frames packed into one read decode the same way.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::MAX_FRAME_SIZE;
use crate::error::{ProtocolError, ProtocolResult};

/// Size of the opcode + length header.
pub const HEADER_SIZE: usize = 8;

/// Frame opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Handshake,
    Frame,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    /// Numeric value written in the header.
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Handshake => 0,
            Self::Frame => 1,
            Self::Close => 2,
            Self::Ping => 3,
            Self::Pong => 4,
        }
    }
}

impl TryFrom<u32> for Opcode {
    type Error = ProtocolError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Handshake),
            1 => Ok(Self::Frame),
            2 => Ok(Self::Close),
            3 => Ok(Self::Ping),
            4 => Ok(Self::Pong),
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub opcode: Opcode,
    pub payload: Value,
}

impl Frame {
    pub fn new(opcode: Opcode, payload: Value) -> Self {
        Self { opcode, payload }
    }

    /// Deserializes the payload into a concrete message type.
    pub fn parse<T: DeserializeOwned>(&self) -> ProtocolResult<T> {
        Ok(T::deserialize(&self.payload)?)
    }
}

/// Encodes `payload` as JSON behind an opcode + length header.
///
/// # Example
///
/// ```rust
/// use richpresence_protocol::{Opcode, encode_frame};
///
/// let bytes = encode_frame(Opcode::Ping, &serde_json::json!({})).unwrap();
/// assert_eq!(&bytes[..4], &3u32.to_le_bytes());
/// assert_eq!(&bytes[4..8], &2u32.to_le_bytes());
/// assert_eq!(&bytes[8..], b"{}");
/// ```
pub fn encode_frame<T: Serialize + ?Sized>(opcode: Opcode, payload: &T) -> ProtocolResult<Vec<u8>> {
    let json = serde_json::to_vec(payload)?;
    let len = u32::try_from(json.len()).unwrap_or(u32::MAX);
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut buffer = Vec::with_capacity(HEADER_SIZE + json.len());
    buffer.extend_from_slice(&opcode.as_u32().to_le_bytes());
    buffer.extend_from_slice(&len.to_le_bytes());
    buffer.extend_from_slice(&json);
    Ok(buffer)
}

/// Decodes exactly one complete frame from the start of `data`.
///
/// Trailing bytes past the frame are ignored; use [`FrameDecoder`] for
/// streams.
pub fn decode_frame(data: &[u8]) -> ProtocolResult<Frame> {
    if data.len() < HEADER_SIZE {
        return Err(ProtocolError::IncompleteFrame {
            expected: HEADER_SIZE,
            received: data.len(),
        });
    }

    let (opcode, len) = read_header(data)?;
    let total = HEADER_SIZE + len;
    if data.len() < total {
        return Err(ProtocolError::IncompleteFrame {
            expected: total,
            received: data.len(),
        });
    }

    let payload = serde_json::from_slice(&data[HEADER_SIZE..total])?;
    Ok(Frame::new(opcode, payload))
}

/// Parses and checks a header. `data` must hold at least [`HEADER_SIZE`] bytes.
fn read_header(data: &[u8]) -> ProtocolResult<(Opcode, usize)> {
    let mut opcode = [0u8; 4];
    let mut len = [0u8; 4];
    opcode.copy_from_slice(&data[0..4]);
    len.copy_from_slice(&data[4..8]);

    let len = u32::from_le_bytes(len);
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    let opcode = Opcode::try_from(u32::from_le_bytes(opcode))?;
    Ok((opcode, len as usize))
}

/// Stateful decoder holding partial data between reads.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly read bytes.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Pops the next complete frame, or `Ok(None)` if more bytes are needed.
    ///
    /// An oversized length is reported as soon as the header is visible,
    /// without waiting for (or buffering) the announced payload.
    pub fn next_frame(&mut self) -> ProtocolResult<Option<Frame>> {
        if self.buffer.len() < HEADER_SIZE {
            return Ok(None);
        }

        let (opcode, len) = read_header(&self.buffer)?;
        let total = HEADER_SIZE + len;
        if self.buffer.len() < total {
            return Ok(None);
        }

        let payload = serde_json::from_slice(&self.buffer[HEADER_SIZE..total]);
        self.buffer.drain(..total);
        Ok(Some(Frame::new(opcode, payload?)))
    }

    /// Appends `chunk` and drains every frame it completes, in order.
    pub fn decode(&mut self, chunk: &[u8]) -> ProtocolResult<Vec<Frame>> {
        self.extend(chunk);
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Number of bytes held waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
