//! Connection state machine.
//!
//! ```text
//! Disconnected --Connect--> Connecting --Established--> Connected --ReadyReceived--> Ready
//!      ^                        |                                                       |
//!      +-----ConnectFailed------+               any state --Close--> Closed <-----------+
//! ```
//!
//! `Closed` accepts `Connect` again so a client can log in after `destroy`.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Lifecycle of the IPC connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Ready,
    Closed,
}

/// Inputs of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Login started; the connector is about to run.
    Connect,
    /// The connector gave up.
    ConnectFailed,
    /// A socket is open and the handshake is being sent.
    Established,
    /// The peer dispatched `READY`.
    ReadyReceived,
    /// CLOSE opcode, fatal I/O error, or local teardown.
    Close,
}

impl Transition {
    fn name(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::ConnectFailed => "connect-failed",
            Self::Established => "established",
            Self::ReadyReceived => "ready",
            Self::Close => "close",
        }
    }
}

impl ConnectionState {
    /// Returns the state reached by applying `transition`.
    pub fn apply(self, transition: Transition) -> ClientResult<Self> {
        use ConnectionState::*;
        use Transition::*;

        match (self, transition) {
            (Disconnected | Closed, Connect) => Ok(Connecting),
            (Connecting, ConnectFailed) => Ok(Disconnected),
            (Connecting, Established) => Ok(Connected),
            (Connected, ReadyReceived) => Ok(Ready),
            (Disconnected, Close) => Ok(Disconnected),
            (Connecting | Connected | Ready | Closed, Close) => Ok(Closed),
            (from, transition) => Err(ClientError::InvalidTransition {
                from,
                transition: transition.name(),
            }),
        }
    }

    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }

    /// True while a socket is (being) held.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Ready)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Ready => "ready",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Observable connection state shared by the client and its dispatcher.
#[derive(Debug, Clone)]
pub struct StateHandle {
    tx: Arc<watch::Sender<ConnectionState>>,
}

impl Default for StateHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl StateHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Disconnected);
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    /// Applies a transition and publishes the new state.
    pub fn advance(&self, transition: Transition) -> ClientResult<ConnectionState> {
        let from = self.get();
        let to = from.apply(transition)?;
        if from != to {
            self.tx.send_replace(to);
            debug!(%from, %to, "connection state changed");
        }
        Ok(to)
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let state = ConnectionState::Disconnected
            .apply(Transition::Connect)
            .and_then(|s| s.apply(Transition::Established))
            .and_then(|s| s.apply(Transition::ReadyReceived))
            .unwrap();
        assert_eq!(state, ConnectionState::Ready);
        assert_eq!(
            state.apply(Transition::Close).unwrap(),
            ConnectionState::Closed
        );
    }

    #[test]
    fn ready_only_from_connected() {
        for from in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Ready,
            ConnectionState::Closed,
        ] {
            assert!(
                matches!(
                    from.apply(Transition::ReadyReceived),
                    Err(ClientError::InvalidTransition { .. })
                ),
                "{from}"
            );
        }
    }

    #[test]
    fn close_from_any_active_state() {
        for from in [
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Ready,
        ] {
            assert_eq!(from.apply(Transition::Close).unwrap(), ConnectionState::Closed);
        }
    }

    #[test]
    fn failed_connect_returns_to_disconnected() {
        assert_eq!(
            ConnectionState::Connecting
                .apply(Transition::ConnectFailed)
                .unwrap(),
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn cannot_connect_twice() {
        assert!(ConnectionState::Ready.apply(Transition::Connect).is_err());
        assert!(ConnectionState::Connecting.apply(Transition::Connect).is_err());
        assert!(ConnectionState::Closed.apply(Transition::Connect).is_ok());
    }

    #[tokio::test]
    async fn handle_publishes_changes() {
        let handle = StateHandle::new();
        let mut rx = handle.subscribe();

        handle.advance(Transition::Connect).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ConnectionState::Connecting);

        assert!(handle.advance(Transition::ReadyReceived).is_err());
        assert_eq!(handle.get(), ConnectionState::Connecting);
    }
}
