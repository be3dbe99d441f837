//! In-memory peer used by the client tests.

use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use richpresence_protocol::{Frame, FrameDecoder, Opcode, encode_frame};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use crate::connector::{BoxFuture, EndpointOpener};

/// The far end of a duplex pipe, speaking raw frames.
pub struct FakePeer {
    stream: DuplexStream,
    decoder: FrameDecoder,
}

impl FakePeer {
    pub fn new(stream: DuplexStream) -> Self {
        Self {
            stream,
            decoder: FrameDecoder::new(),
        }
    }

    /// Reads the next frame, or `None` once the client hung up.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        let mut buf = [0u8; 1024];
        loop {
            if let Some(frame) = self.decoder.next_frame().unwrap() {
                return Some(frame);
            }
            let n = self.stream.read(&mut buf).await.unwrap();
            if n == 0 {
                return None;
            }
            self.decoder.extend(&buf[..n]);
        }
    }

    pub async fn expect_frame(&mut self) -> Frame {
        self.next_frame().await.expect("client closed the pipe")
    }

    pub async fn send(&mut self, opcode: Opcode, payload: Value) {
        let bytes = encode_frame(opcode, &payload).unwrap();
        self.stream.write_all(&bytes).await.unwrap();
    }

    /// Writes bytes as they are, valid frame or not.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }

    pub async fn send_ready(&mut self, username: &str) {
        self.send(
            Opcode::Frame,
            json!({
                "cmd": "DISPATCH",
                "evt": "READY",
                "nonce": null,
                "data": {
                    "v": 1,
                    "config": {"cdn_host": "cdn.example.com", "environment": "production"},
                    "user": {"id": "1", "username": username}
                }
            }),
        )
        .await;
    }

    /// Answers a command frame with `data`.
    pub async fn reply(&mut self, request: &Frame, data: Value) {
        self.send(
            Opcode::Frame,
            json!({
                "cmd": request.payload["cmd"],
                "evt": null,
                "nonce": request.payload["nonce"],
                "data": data
            }),
        )
        .await;
    }
}

/// Hands out a prepared stream on the first open, then reports missing.
pub struct PipeOpener {
    stream: Mutex<Option<DuplexStream>>,
    pub opened: Mutex<Vec<PathBuf>>,
}

impl PipeOpener {
    pub fn pair() -> (Self, FakePeer) {
        let (client, peer) = tokio::io::duplex(64 * 1024);
        let opener = Self {
            stream: Mutex::new(Some(client)),
            opened: Mutex::new(Vec::new()),
        };
        (opener, FakePeer::new(peer))
    }

    /// An opener for which every endpoint is missing.
    pub fn empty() -> Self {
        Self {
            stream: Mutex::new(None),
            opened: Mutex::new(Vec::new()),
        }
    }
}

impl EndpointOpener for PipeOpener {
    type Stream = DuplexStream;

    fn open(&self, endpoint: PathBuf) -> BoxFuture<'_, io::Result<DuplexStream>> {
        self.opened.lock().unwrap().push(endpoint);
        let stream = self.stream.lock().unwrap().take();
        Box::pin(async move { stream.ok_or_else(|| io::Error::from(io::ErrorKind::NotFound)) })
    }
}
