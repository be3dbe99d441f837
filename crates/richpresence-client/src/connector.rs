//! Opening the IPC socket.
//!
//! [`Connector`] walks the endpoint slots in order. A slot that does not
//! exist (or refuses because its socket file is stale) moves on to the next
//! one; any other failure stops immediately.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::endpoint::{ENDPOINT_COUNT, endpoint_path};
use crate::error::{ClientError, ClientResult};

/// A boxed future for trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Opens a byte stream to one endpoint path.
pub trait EndpointOpener: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn open(&self, endpoint: PathBuf) -> BoxFuture<'_, io::Result<Self::Stream>>;
}

/// Opens the platform's real socket / named pipe.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOpener;

#[cfg(unix)]
impl EndpointOpener for SystemOpener {
    type Stream = tokio::net::UnixStream;

    fn open(&self, endpoint: PathBuf) -> BoxFuture<'_, io::Result<Self::Stream>> {
        Box::pin(async move { tokio::net::UnixStream::connect(endpoint).await })
    }
}

#[cfg(windows)]
impl EndpointOpener for SystemOpener {
    type Stream = tokio::net::windows::named_pipe::NamedPipeClient;

    fn open(&self, endpoint: PathBuf) -> BoxFuture<'_, io::Result<Self::Stream>> {
        Box::pin(async move {
            tokio::net::windows::named_pipe::ClientOptions::new().open(endpoint)
        })
    }
}

/// A successfully opened endpoint.
#[derive(Debug)]
pub struct ConnectedEndpoint<S> {
    pub index: u8,
    pub path: PathBuf,
    pub stream: S,
}

/// Bounded walk over the endpoint slots.
#[derive(Debug)]
pub struct Connector<'a, O> {
    opener: &'a O,
    endpoints: u8,
    attempt_timeout: Duration,
}

impl<'a, O: EndpointOpener> Connector<'a, O> {
    pub fn new(opener: &'a O) -> Self {
        Self {
            opener,
            endpoints: ENDPOINT_COUNT,
            attempt_timeout: Duration::from_secs(5),
        }
    }

    /// Builder: number of slots to try, clamped to `1..=10`.
    pub fn with_endpoints(mut self, count: u8) -> Self {
        self.endpoints = count.clamp(1, ENDPOINT_COUNT);
        self
    }

    /// Builder: timeout for a single open attempt.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Opens the first reachable endpoint.
    ///
    /// A failed attempt yields no handle, so nothing is left open when the
    /// walk moves to the next slot.
    pub async fn connect(&self) -> ClientResult<ConnectedEndpoint<O::Stream>> {
        for index in 0..self.endpoints {
            let path = endpoint_path(index);
            debug!(index, path = %path.display(), "trying IPC endpoint");

            let attempt = tokio::time::timeout(self.attempt_timeout, self.opener.open(path.clone()));
            match attempt.await {
                Ok(Ok(stream)) => {
                    info!(index, path = %path.display(), "connected to IPC endpoint");
                    return Ok(ConnectedEndpoint {
                        index,
                        path,
                        stream,
                    });
                }
                Ok(Err(e)) if is_missing_endpoint(&e) => {
                    debug!(index, error = %e, "endpoint unavailable");
                }
                Ok(Err(e)) => return Err(ClientError::Io(e)),
                Err(_) => {
                    return Err(ClientError::Timeout(format!(
                        "connecting to {}",
                        path.display()
                    )));
                }
            }
        }

        Err(ClientError::EndpointsExhausted {
            attempts: self.endpoints,
        })
    }
}

/// Failures that mean "nobody is listening on this slot".
fn is_missing_endpoint(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::io::DuplexStream;

    /// Fails each slot with a scripted error kind; unscripted slots succeed.
    #[derive(Default)]
    struct ScriptedOpener {
        failures: HashMap<PathBuf, io::ErrorKind>,
        attempts: Mutex<Vec<PathBuf>>,
    }

    impl ScriptedOpener {
        fn failing(kinds: &[(u8, io::ErrorKind)]) -> Self {
            Self {
                failures: kinds
                    .iter()
                    .map(|(index, kind)| (endpoint_path(*index), *kind))
                    .collect(),
                attempts: Mutex::new(Vec::new()),
            }
        }

        fn attempts(&self) -> Vec<PathBuf> {
            self.attempts.lock().unwrap().clone()
        }
    }

    impl EndpointOpener for ScriptedOpener {
        type Stream = DuplexStream;

        fn open(&self, endpoint: PathBuf) -> BoxFuture<'_, io::Result<DuplexStream>> {
            self.attempts.lock().unwrap().push(endpoint.clone());
            let result = match self.failures.get(&endpoint) {
                Some(kind) => Err(io::Error::from(*kind)),
                None => Ok(tokio::io::duplex(64).0),
            };
            Box::pin(async move { result })
        }
    }

    fn all_not_found() -> Vec<(u8, io::ErrorKind)> {
        (0..ENDPOINT_COUNT)
            .map(|i| (i, io::ErrorKind::NotFound))
            .collect()
    }

    #[tokio::test]
    async fn first_slot_wins() {
        let opener = ScriptedOpener::default();
        let connected = Connector::new(&opener).connect().await.unwrap();
        assert_eq!(connected.index, 0);
        assert_eq!(opener.attempts(), vec![endpoint_path(0)]);
    }

    #[tokio::test]
    async fn skips_missing_slots_in_order() {
        let opener = ScriptedOpener::failing(&[
            (0, io::ErrorKind::NotFound),
            (1, io::ErrorKind::ConnectionRefused),
            (2, io::ErrorKind::NotFound),
        ]);
        let connected = Connector::new(&opener).connect().await.unwrap();
        assert_eq!(connected.index, 3);
        assert_eq!(connected.path, endpoint_path(3));
        assert_eq!(
            opener.attempts(),
            (0..=3).map(endpoint_path).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn exhausted_only_after_last_slot() {
        let opener = ScriptedOpener::failing(&all_not_found());
        let err = Connector::new(&opener).connect().await.unwrap_err();
        assert!(matches!(err, ClientError::EndpointsExhausted { attempts: 10 }));
        assert_eq!(
            opener.attempts(),
            (0..ENDPOINT_COUNT).map(endpoint_path).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn other_errors_fail_immediately() {
        let opener = ScriptedOpener::failing(&[
            (0, io::ErrorKind::NotFound),
            (1, io::ErrorKind::PermissionDenied),
        ]);
        let err = Connector::new(&opener).connect().await.unwrap_err();
        assert!(
            matches!(err, ClientError::Io(ref e) if e.kind() == io::ErrorKind::PermissionDenied)
        );
        assert_eq!(opener.attempts().len(), 2);
    }

    #[tokio::test]
    async fn endpoint_limit_is_respected() {
        let opener = ScriptedOpener::failing(&all_not_found());
        let err = Connector::new(&opener)
            .with_endpoints(3)
            .connect()
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::EndpointsExhausted { attempts: 3 }));
        assert_eq!(opener.attempts().len(), 3);
    }

    struct HangingOpener;

    impl EndpointOpener for HangingOpener {
        type Stream = DuplexStream;

        fn open(&self, _endpoint: PathBuf) -> BoxFuture<'_, io::Result<DuplexStream>> {
            Box::pin(std::future::pending())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_timeout() {
        let err = Connector::new(&HangingOpener)
            .with_attempt_timeout(Duration::from_secs(1))
            .connect()
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)));
    }
}
