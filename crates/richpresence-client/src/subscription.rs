//! Event listeners.
//!
//! The dispatcher owns a [`SubscriptionTable`] and fans dispatched events
//! out to every live listener of that event. Callers hold [`Subscription`]s.

use std::collections::HashMap;
use std::fmt;

use richpresence_protocol::{Command, Event};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::dispatcher::DispatcherHandle;
use crate::error::ClientResult;

/// Identifies one listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Listener = mpsc::UnboundedSender<Value>;

/// Listeners grouped by event.
#[derive(Debug, Default)]
pub struct SubscriptionTable {
    next_id: u64,
    listeners: HashMap<Event, HashMap<SubscriptionId, Listener>>,
    events: HashMap<SubscriptionId, Event>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener and returns its receiving end.
    pub fn add(&mut self, event: Event) -> (SubscriptionId, mpsc::UnboundedReceiver<Value>) {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.entry(event).or_default().insert(id, tx);
        self.events.insert(id, event);
        debug!(%id, ?event, "listener added");
        (id, rx)
    }

    /// Removes a listener. Unknown ids are ignored.
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let Some(event) = self.events.remove(&id) else {
            return false;
        };
        if let Some(listeners) = self.listeners.get_mut(&event) {
            listeners.remove(&id);
            if listeners.is_empty() {
                self.listeners.remove(&event);
            }
        }
        debug!(%id, ?event, "listener removed");
        true
    }

    /// Sends `data` to every listener of `event`, dropping closed ones.
    /// Returns the number of listeners reached.
    pub fn publish(&mut self, event: Event, data: &Value) -> usize {
        let Some(listeners) = self.listeners.get_mut(&event) else {
            trace!(?event, "no listeners for event");
            return 0;
        };

        let mut closed = Vec::new();
        for (id, tx) in listeners.iter() {
            if tx.send(data.clone()).is_err() {
                closed.push(*id);
            }
        }
        let reached = listeners.len() - closed.len();
        for id in closed {
            self.remove(id);
        }
        reached
    }

    /// Drops every listener, ending their streams.
    pub fn clear(&mut self) {
        self.listeners.clear();
        self.events.clear();
    }

    pub fn count(&self, event: Event) -> usize {
        self.listeners.get(&event).map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// A stream of one event's payloads.
///
/// Dropping it stops local delivery. Call [`Subscription::unsubscribe`] to
/// also tell the peer to stop sending the event.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    event: Event,
    args: Value,
    remote: bool,
    events: mpsc::UnboundedReceiver<Value>,
    handle: DispatcherHandle,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        event: Event,
        args: Value,
        remote: bool,
        events: mpsc::UnboundedReceiver<Value>,
        handle: DispatcherHandle,
    ) -> Self {
        Self {
            id,
            event,
            args,
            remote,
            events,
            handle,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn event(&self) -> Event {
        self.event
    }

    /// Next event payload, or `None` once the connection is gone.
    pub async fn recv(&mut self) -> Option<Value> {
        self.events.recv().await
    }

    /// Stops delivery and, for peer-side subscriptions, sends `UNSUBSCRIBE`.
    pub async fn unsubscribe(self) -> ClientResult<()> {
        self.handle.remove_subscriber(self.id);
        if self.remote {
            let args = if self.args.is_null() {
                json!({})
            } else {
                self.args.clone()
            };
            self.handle
                .request(Command::Unsubscribe, args, Some(self.event))
                .await?;
        }
        Ok(())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.remove_subscriber(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_reaches_only_matching_event() {
        let mut table = SubscriptionTable::new();
        let (_, mut join) = table.add(Event::ActivityJoin);
        let (_, mut spectate) = table.add(Event::ActivitySpectate);

        assert_eq!(table.publish(Event::ActivityJoin, &json!({"secret": "s"})), 1);
        assert_eq!(join.try_recv().unwrap(), json!({"secret": "s"}));
        assert!(spectate.try_recv().is_err());
    }

    #[test]
    fn publish_fans_out_and_prunes_closed() {
        let mut table = SubscriptionTable::new();
        let (_, mut first) = table.add(Event::Error);
        let (_, second) = table.add(Event::Error);
        drop(second);

        assert_eq!(table.publish(Event::Error, &json!({"code": 1})), 1);
        assert_eq!(table.count(Event::Error), 1);
        assert!(first.try_recv().is_ok());
    }

    #[test]
    fn remove_is_idempotent() {
        let mut table = SubscriptionTable::new();
        let (id, _rx) = table.add(Event::Ready);
        assert!(table.remove(id));
        assert!(!table.remove(id));
        assert_eq!(table.count(Event::Ready), 0);
        assert!(table.is_empty());
    }

    #[test]
    fn clear_ends_streams() {
        let mut table = SubscriptionTable::new();
        let (_, mut rx) = table.add(Event::MessageCreate);
        table.clear();
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn ids_are_unique() {
        let mut table = SubscriptionTable::new();
        let (a, _ra) = table.add(Event::Ready);
        let (b, _rb) = table.add(Event::Ready);
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "sub-1");
    }
}
