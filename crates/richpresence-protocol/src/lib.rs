//! IPC frame codec and payload types for the rich presence protocol.
//!
//! # Wire format
//!
//! Every message is one frame with an 8-byte little-endian header:
//!
//! ```text
//! +--------------+--------------+-------------------+
//! | opcode (LE)  | length (LE)  |  JSON payload     |
//! |   4 bytes    |   4 bytes    |  `length` bytes   |
//! +--------------+--------------+-------------------+
//! ```
//!
//! # Example
//!
//! ```rust
//! use richpresence_protocol::{FrameDecoder, Handshake, Opcode, encode_frame};
//!
//! let bytes = encode_frame(Opcode::Handshake, &Handshake::new("123")).unwrap();
//! let mut decoder = FrameDecoder::new();
//! let frames = decoder.decode(&bytes).unwrap();
//! assert_eq!(frames[0].opcode, Opcode::Handshake);
//! assert_eq!(frames[0].payload["client_id"], "123");
//! ```

mod error;
mod framing;
mod types;

pub use error::{ProtocolError, ProtocolResult};
pub use framing::{Frame, FrameDecoder, HEADER_SIZE, Opcode, decode_frame, encode_frame};
pub use types::{
    AuthenticateArgs, AuthenticateData, AuthorizeArgs, AuthorizeData, CloseData, Command,
    CommandFrame, ErrorData, Event, Handshake, ReadyData, RpcMessage, ServerConfig,
    SetActivityArgs, User,
};

/// Protocol version sent in the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest payload accepted or produced (1 MiB).
pub const MAX_FRAME_SIZE: u32 = 1024 * 1024;
