//! The connection task.
//!
//! A [`Dispatcher`] owns the socket once it is open. It decodes incoming
//! frames, drives the state machine through the handshake, answers pings,
//! matches replies to pending commands, and fans events out to listeners.
//! Everything else talks to it through a cloneable [`DispatcherHandle`].

use std::time::Duration;

use richpresence_protocol::{
    CloseData, Command, CommandFrame, Event, Frame, FrameDecoder, Handshake, Opcode, ReadyData,
    RpcMessage, encode_frame,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::correlator::{Correlator, Responder};
use crate::error::{ClientError, ClientResult};
use crate::keepalive::KeepAlive;
use crate::state::{ConnectionState, StateHandle, Transition};
use crate::subscription::{SubscriptionId, SubscriptionTable};

const READ_BUFFER_SIZE: usize = 8 * 1024;
const COMMAND_CHANNEL_SIZE: usize = 32;

/// Messages accepted by the connection task.
#[derive(Debug)]
pub enum DispatcherCommand {
    Request {
        command: Command,
        args: Value,
        evt: Option<Event>,
        reply: Responder,
    },
    Subscribe {
        event: Event,
        reply: oneshot::Sender<(SubscriptionId, mpsc::UnboundedReceiver<Value>)>,
    },
    /// Send CLOSE and tear the connection down.
    Close { done: oneshot::Sender<()> },
}

/// Receiving side of a [`DispatcherHandle`].
///
/// Listener removals travel on their own unbounded queue so a full command
/// queue can never swallow one.
#[derive(Debug)]
pub struct DispatcherInbox {
    commands: mpsc::Receiver<DispatcherCommand>,
    removals: mpsc::UnboundedReceiver<SubscriptionId>,
}

/// Handle for talking to a running [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    command_tx: mpsc::Sender<DispatcherCommand>,
    removal_tx: mpsc::UnboundedSender<SubscriptionId>,
}

impl DispatcherHandle {
    pub fn channel() -> (Self, DispatcherInbox) {
        let (command_tx, commands) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (removal_tx, removals) = mpsc::unbounded_channel();
        (
            Self {
                command_tx,
                removal_tx,
            },
            DispatcherInbox { commands, removals },
        )
    }

    /// Sends a command and waits for its reply.
    pub async fn request(
        &self,
        command: Command,
        args: Value,
        evt: Option<Event>,
    ) -> ClientResult<Value> {
        let (reply, rx) = oneshot::channel();
        self.send(DispatcherCommand::Request {
            command,
            args,
            evt,
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| ClientError::closed("connection task stopped"))?
    }

    /// Registers a local listener for `event`.
    pub async fn add_subscriber(
        &self,
        event: Event,
    ) -> ClientResult<(SubscriptionId, mpsc::UnboundedReceiver<Value>)> {
        let (reply, rx) = oneshot::channel();
        self.send(DispatcherCommand::Subscribe { event, reply })
            .await?;
        rx.await
            .map_err(|_| ClientError::closed("connection task stopped"))
    }

    /// Drops a listener without blocking. Returns false only once the
    /// connection task is gone, and with it the whole table.
    pub fn remove_subscriber(&self, id: SubscriptionId) -> bool {
        self.removal_tx.send(id).is_ok()
    }

    /// Asks the task to send CLOSE and shut down; waits until it has.
    pub async fn close(&self) {
        let (done, rx) = oneshot::channel();
        if self.send(DispatcherCommand::Close { done }).await.is_ok() {
            let _ = rx.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    async fn send(&self, command: DispatcherCommand) -> ClientResult<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| ClientError::closed("connection task stopped"))
    }
}

/// Per-connection protocol state machine.
pub struct Dispatcher<W> {
    writer: W,
    state: StateHandle,
    decoder: FrameDecoder,
    correlator: Correlator,
    subscriptions: SubscriptionTable,
    keepalive: KeepAlive,
    ready: Option<oneshot::Sender<ClientResult<ReadyData>>>,
}

impl<W: AsyncWrite + Unpin + Send + 'static> Dispatcher<W> {
    /// Wraps the write half of an established connection.
    pub fn new(writer: W, state: StateHandle, keepalive_interval: Duration) -> Self {
        Self {
            writer,
            state,
            decoder: FrameDecoder::new(),
            correlator: Correlator::new(),
            subscriptions: SubscriptionTable::new(),
            keepalive: KeepAlive::new(keepalive_interval),
            ready: None,
        }
    }

    /// Resolves with the `READY` data, or the error that ended the login.
    pub fn await_ready(&mut self) -> oneshot::Receiver<ClientResult<ReadyData>> {
        let (tx, rx) = oneshot::channel();
        self.ready = Some(tx);
        rx
    }

    pub async fn send_handshake(&mut self, client_id: &str) -> ClientResult<()> {
        debug!(client_id, "sending handshake");
        self.write_frame(Opcode::Handshake, &Handshake::new(client_id))
            .await
    }

    /// Sends a command frame, or answers `reply` directly if it cannot be sent.
    ///
    /// Only write failures are returned; they end the connection.
    pub async fn send_command(
        &mut self,
        command: Command,
        args: Value,
        evt: Option<Event>,
        reply: Responder,
    ) -> ClientResult<()> {
        let state = self.state.get();
        if !state.is_ready() {
            debug!(?command, %state, "command rejected before READY");
            let _ = reply.send(Err(ClientError::NotReady { state }));
            return Ok(());
        }

        let nonce = self.correlator.register(command, reply);
        let frame = CommandFrame {
            cmd: command,
            args,
            evt,
            nonce: nonce.clone(),
        };
        let bytes = match encode_frame(Opcode::Frame, &frame) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.correlator.fail(&nonce, e.into());
                return Ok(());
            }
        };

        debug!(?command, ?evt, %nonce, "sending command");
        self.write_bytes(&bytes).await
    }

    /// Feeds raw bytes from the socket. An error ends the connection.
    pub async fn receive(&mut self, chunk: &[u8]) -> ClientResult<()> {
        self.decoder.extend(chunk);
        while let Some(frame) = self.decoder.next_frame()? {
            self.handle_frame(frame).await?;
        }
        Ok(())
    }

    async fn handle_frame(&mut self, frame: Frame) -> ClientResult<()> {
        match frame.opcode {
            Opcode::Frame => {
                let message: RpcMessage = frame.parse()?;
                self.handle_message(message)
            }
            Opcode::Ping => {
                trace!("ping received");
                self.write_frame(Opcode::Pong, &frame.payload).await
            }
            Opcode::Pong => {
                trace!("pong received");
                Ok(())
            }
            Opcode::Close => {
                let close = CloseData::deserialize(&frame.payload).unwrap_or_default();
                Err(ClientError::closed(format!(
                    "peer closed connection (code {}): {}",
                    close.code, close.message
                )))
            }
            Opcode::Handshake => {
                warn!("ignoring handshake frame from peer");
                Ok(())
            }
        }
    }

    fn handle_message(&mut self, message: RpcMessage) -> ClientResult<()> {
        let state = self.state.get();

        if message.is_ready() {
            if state != ConnectionState::Connected {
                warn!(%state, "ignoring READY outside the handshake");
                return Ok(());
            }
            let ready = ReadyData::deserialize(&message.data).unwrap_or_else(|e| {
                warn!(error = %e, "malformed READY data");
                ReadyData::default()
            });
            self.state.advance(Transition::ReadyReceived)?;
            self.keepalive.start();
            info!(
                user = ready.user.as_ref().map(|u| u.username.as_str()),
                "connection ready"
            );
            if let Some(waiter) = self.ready.take() {
                let _ = waiter.send(Ok(ready));
            }
            self.subscriptions.publish(Event::Ready, &message.data);
            return Ok(());
        }

        if let Some(error) = message.error() {
            if let Some(nonce) = message.nonce.as_deref() {
                if !self
                    .correlator
                    .fail(nonce, ClientError::rpc(error.code, error.message.clone()))
                {
                    debug!(%nonce, code = error.code, "error for unknown request");
                }
                return Ok(());
            }
            warn!(code = error.code, message = %error.message, "peer reported error");
            if state == ConnectionState::Connected {
                if let Some(waiter) = self.ready.take() {
                    let _ = waiter.send(Err(ClientError::rpc(error.code, error.message.clone())));
                }
                return Err(ClientError::rpc(error.code, error.message));
            }
            self.subscriptions.publish(Event::Error, &message.data);
            return Ok(());
        }

        match (message.cmd, message.nonce) {
            (Some(Command::Dispatch), _) | (_, None) => match message.evt {
                Some(event) => {
                    let reached = self.subscriptions.publish(event, &message.data);
                    trace!(?event, reached, "event dispatched");
                }
                None => trace!(cmd = ?message.cmd, "frame with neither nonce nor event"),
            },
            (cmd, Some(nonce)) => {
                if let Some(event) = message.evt {
                    self.subscriptions.publish(event, &message.data);
                }
                if !self.correlator.resolve(&nonce, message.data) {
                    trace!(?cmd, %nonce, "reply for unknown request");
                }
            }
        }
        Ok(())
    }

    async fn send_ping(&mut self) -> ClientResult<()> {
        trace!("sending keep-alive ping");
        self.write_frame(Opcode::Ping, &json!({ "nonce": Uuid::new_v4().to_string() }))
            .await
    }

    async fn write_frame<T: Serialize + ?Sized>(
        &mut self,
        opcode: Opcode,
        payload: &T,
    ) -> ClientResult<()> {
        let bytes = encode_frame(opcode, payload)?;
        self.write_bytes(&bytes).await
    }

    async fn write_bytes(&mut self, bytes: &[u8]) -> ClientResult<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Moves to `Closed` and fails everything still waiting on this connection.
    pub async fn shutdown(&mut self, reason: &str) {
        if let Err(e) = self.state.advance(Transition::Close) {
            debug!(error = %e, "state already past close");
        }
        self.keepalive.stop();
        let failed = self.correlator.drain_all(|| ClientError::closed(reason));
        if let Some(waiter) = self.ready.take() {
            let _ = waiter.send(Err(ClientError::closed(reason)));
        }
        self.subscriptions.clear();
        if let Err(e) = self.writer.shutdown().await {
            trace!(error = %e, "socket shutdown failed");
        }
        info!(reason, failed_requests = failed, "connection closed");
    }

    /// Spawns the connection task on the current runtime.
    pub fn spawn<R>(self, reader: R) -> (DispatcherHandle, JoinHandle<()>)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (handle, inbox) = DispatcherHandle::channel();
        let task = tokio::spawn(self.run(reader, inbox));
        (handle, task)
    }

    /// Runs until the peer closes, a fatal error occurs, or `Close` arrives.
    pub async fn run<R: AsyncRead + Unpin>(
        mut self,
        mut reader: R,
        inbox: DispatcherInbox,
    ) {
        let DispatcherInbox {
            mut commands,
            mut removals,
        } = inbox;
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        let reason = loop {
            tokio::select! {
                read = reader.read(&mut buf) => match read {
                    Ok(0) => break "peer closed the socket".to_string(),
                    Ok(n) => {
                        if let Err(e) = self.receive(&buf[..n]).await {
                            break close_reason(e);
                        }
                    }
                    Err(e) => break format!("read failed: {e}"),
                },
                command = commands.recv() => match command {
                    Some(DispatcherCommand::Request { command, args, evt, reply }) => {
                        if let Err(e) = self.send_command(command, args, evt, reply).await {
                            break close_reason(e);
                        }
                    }
                    Some(DispatcherCommand::Subscribe { event, reply }) => {
                        let _ = reply.send(self.subscriptions.add(event));
                    }
                    Some(DispatcherCommand::Close { done }) => {
                        if let Err(e) = self.write_frame(Opcode::Close, &json!({})).await {
                            debug!(error = %e, "could not send CLOSE");
                        }
                        self.shutdown("closed by client").await;
                        let _ = done.send(());
                        return;
                    }
                    None => break "client dropped".to_string(),
                },
                Some(id) = removals.recv() => {
                    self.subscriptions.remove(id);
                }
                _ = self.keepalive.tick() => {
                    if let Err(e) = self.send_ping().await {
                        break close_reason(e);
                    }
                }
            }
        };

        self.shutdown(&reason).await;
    }
}

fn close_reason(error: ClientError) -> String {
    match error {
        ClientError::ConnectionClosed { reason } => reason,
        other => other.to_string(),
    }
}
