//! Matching replies to outstanding commands by nonce.
//!
//! Every entry is removed in the same step that looks it up, so a pending
//! request is answered exactly once whichever of reply, error, or teardown
//! comes first.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use richpresence_protocol::Command;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::trace;
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};

/// Where the outcome of a command is delivered.
pub type Responder = oneshot::Sender<ClientResult<Value>>;

#[derive(Debug)]
struct PendingRequest {
    command: Command,
    responder: Responder,
}

/// Pending-request table keyed by nonce.
#[derive(Debug, Default)]
pub struct Correlator {
    pending: HashMap<String, PendingRequest>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a pending request under a fresh nonce and returns the nonce.
    ///
    /// The nonce is unique among in-flight requests, not just likely unique.
    pub fn register(&mut self, command: Command, responder: Responder) -> String {
        loop {
            let nonce = Uuid::new_v4().to_string();
            if let Entry::Vacant(slot) = self.pending.entry(nonce.clone()) {
                slot.insert(PendingRequest { command, responder });
                return nonce;
            }
        }
    }

    /// Completes `nonce` successfully. Returns false for unknown nonces.
    pub fn resolve(&mut self, nonce: &str, data: Value) -> bool {
        self.complete(nonce, Ok(data))
    }

    /// Completes `nonce` with an error. Returns false for unknown nonces.
    pub fn fail(&mut self, nonce: &str, error: ClientError) -> bool {
        self.complete(nonce, Err(error))
    }

    /// Fails every outstanding request; returns how many there were.
    pub fn drain_all(&mut self, error: impl Fn() -> ClientError) -> usize {
        let count = self.pending.len();
        for (nonce, request) in self.pending.drain() {
            trace!(%nonce, command = ?request.command, "failing pending request");
            let _ = request.responder.send(Err(error()));
        }
        count
    }

    pub fn contains(&self, nonce: &str) -> bool {
        self.pending.contains_key(nonce)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn complete(&mut self, nonce: &str, outcome: ClientResult<Value>) -> bool {
        let Some(request) = self.pending.remove(nonce) else {
            trace!(%nonce, "no pending request for nonce");
            return false;
        };
        if request.responder.send(outcome).is_err() {
            // caller stopped waiting
            trace!(%nonce, command = ?request.command, "reply dropped");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolve_delivers_once() {
        let mut correlator = Correlator::new();
        let (tx, mut rx) = oneshot::channel();
        let nonce = correlator.register(Command::GetGuilds, tx);

        assert!(correlator.resolve(&nonce, json!({"guilds": []})));
        assert!(!correlator.resolve(&nonce, json!({"again": true})));
        assert_eq!(rx.try_recv().unwrap().unwrap(), json!({"guilds": []}));
        assert!(correlator.is_empty());
    }

    #[test]
    fn unknown_nonce_is_ignored() {
        let mut correlator = Correlator::new();
        let (tx, mut rx) = oneshot::channel();
        correlator.register(Command::SetActivity, tx);

        assert!(!correlator.resolve("not-a-nonce", json!(null)));
        assert!(!correlator.fail("not-a-nonce", ClientError::rpc(1, "x")));
        assert_eq!(correlator.len(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn fail_delivers_error() {
        let mut correlator = Correlator::new();
        let (tx, mut rx) = oneshot::channel();
        let nonce = correlator.register(Command::SetActivity, tx);

        assert!(correlator.fail(&nonce, ClientError::rpc(4000, "bad activity")));
        assert!(matches!(
            rx.try_recv().unwrap(),
            Err(ClientError::Rpc { code: 4000, .. })
        ));
    }

    #[test]
    fn nonces_are_distinct_for_identical_commands() {
        let mut correlator = Correlator::new();
        let nonces: Vec<String> = (0..50)
            .map(|_| correlator.register(Command::SetActivity, oneshot::channel().0))
            .collect();
        let mut unique = nonces.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), nonces.len());
        assert_eq!(correlator.len(), 50);
    }

    #[test]
    fn drain_all_fails_everything() {
        let mut correlator = Correlator::new();
        let receivers: Vec<_> = (0..3)
            .map(|_| {
                let (tx, rx) = oneshot::channel();
                correlator.register(Command::GetChannel, tx);
                rx
            })
            .collect();

        assert_eq!(correlator.drain_all(|| ClientError::closed("socket closed")), 3);
        assert!(correlator.is_empty());
        for mut rx in receivers {
            assert!(matches!(
                rx.try_recv().unwrap(),
                Err(ClientError::ConnectionClosed { .. })
            ));
        }
    }

    #[test]
    fn dropped_receiver_still_removes_entry() {
        let mut correlator = Correlator::new();
        let (tx, rx) = oneshot::channel();
        let nonce = correlator.register(Command::GetGuild, tx);
        drop(rx);

        assert!(correlator.resolve(&nonce, json!({})));
        assert!(!correlator.contains(&nonce));
    }
}
