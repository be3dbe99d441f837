//! Client error types.

use std::io;

use richpresence_core::ValidationError;
use richpresence_protocol::ProtocolError;
use thiserror::Error;

use crate::state::ConnectionState;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No candidate endpoint accepted a connection.
    #[error("no IPC endpoint reachable after {attempts} attempts")]
    EndpointsExhausted { attempts: u8 },

    /// Transport failure other than a missing endpoint.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed frame header, length, or content.
    #[error("decode error: {0}")]
    Decode(#[from] ProtocolError),

    /// The peer answered with an `ERROR` event.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Presence payload rejected before reaching the wire.
    #[error("invalid activity: {0}")]
    Validation(#[from] ValidationError),

    /// Command issued before the handshake completed.
    #[error("client is not ready (state: {state})")]
    NotReady { state: ConnectionState },

    /// Connection went away while the operation was outstanding.
    #[error("connection closed: {reason}")]
    ConnectionClosed { reason: String },

    /// Operation timed out.
    #[error("timeout during {0}")]
    Timeout(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The external OAuth2 code exchange failed.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// State machine refused a transition.
    #[error("invalid transition from {from} on {transition}")]
    InvalidTransition {
        from: ConnectionState,
        transition: &'static str,
    },
}

impl ClientError {
    /// Creates an RPC error.
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
        }
    }

    /// Creates a connection closed error.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::ConnectionClosed {
            reason: reason.into(),
        }
    }

    /// True when the error ends the connection rather than a single call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::EndpointsExhausted { .. }
                | Self::Io(_)
                | Self::Decode(_)
                | Self::ConnectionClosed { .. }
        )
    }
}
