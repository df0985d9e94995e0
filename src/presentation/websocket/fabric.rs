//! Routing Fabric
//!
//! Topic based fan-out between chat sessions. A topic maps connection ids to
//! their mailboxes; sessions never hold references to each other.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::envelope::OutboundEnvelope;
use crate::infrastructure::metrics;
use crate::infrastructure::pubsub::{RelayInbox, RelayPublisher};

/// Identifier of one live connection.
pub type ConnectionId = Uuid;

/// Outbound queue of one connection, drained by its socket writer.
pub type Mailbox = mpsc::UnboundedSender<Arc<OutboundEnvelope>>;

/// Named multicast destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic(String);

impl Topic {
    /// Every connection of one user.
    pub fn user(user_id: Uuid) -> Self {
        Self(format!("user:{}", user_id))
    }

    /// Participants of a direct chat room.
    pub fn room(name: &str) -> Self {
        Self(format!("room:{}", name))
    }

    /// Members connected to a group or channel. Always the hyphenated
    /// lowercase form, whatever spelling the client used.
    pub fn group(group_id: Uuid) -> Self {
        Self(format!("group:{}", group_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of fabric size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FabricStats {
    pub topics: usize,
    pub connections: usize,
    pub subscriptions: usize,
}

/// Topic membership tables and local delivery.
///
/// Membership changes apply to the next publish. One producer publishing to
/// one topic reaches every subscriber in publish order.
pub struct RoutingFabric {
    node_id: Uuid,
    topics: DashMap<Topic, HashMap<ConnectionId, Mailbox>>,
    memberships: DashMap<ConnectionId, HashSet<Topic>>,
    relay: RwLock<Option<RelayPublisher>>,
}

impl RoutingFabric {
    pub fn new() -> Self {
        Self {
            node_id: Uuid::new_v4(),
            topics: DashMap::new(),
            memberships: DashMap::new(),
            relay: RwLock::new(None),
        }
    }

    pub fn node_id(&self) -> Uuid {
        self.node_id
    }

    /// Forward every publish to other nodes as well.
    pub fn attach_relay(&self, publisher: RelayPublisher) {
        tracing::info!(node_id = %self.node_id, "Fabric relay attached");
        *self.relay.write() = Some(publisher);
    }

    /// Add a connection to a topic. Subscribing twice replaces the mailbox.
    pub fn subscribe(&self, topic: Topic, connection: ConnectionId, mailbox: Mailbox) {
        self.topics
            .entry(topic.clone())
            .or_default()
            .insert(connection, mailbox);

        tracing::debug!(topic = %topic, connection_id = %connection, "Subscribed");

        self.memberships.entry(connection).or_default().insert(topic);
    }

    /// Remove a connection from a topic. Empty topics are dropped.
    pub fn unsubscribe(&self, topic: &Topic, connection: ConnectionId) {
        self.remove_subscriber(topic, connection);

        if let Some(mut held) = self.memberships.get_mut(&connection) {
            held.remove(topic);
        }
        self.memberships
            .remove_if(&connection, |_, held| held.is_empty());
    }

    /// Remove a connection from every topic it holds.
    pub fn unsubscribe_all(&self, connection: ConnectionId) -> usize {
        let Some((_, held)) = self.memberships.remove(&connection) else {
            return 0;
        };

        for topic in &held {
            self.remove_subscriber(topic, connection);
        }

        tracing::debug!(
            connection_id = %connection,
            topics = held.len(),
            "Unsubscribed from all topics"
        );
        held.len()
    }

    fn remove_subscriber(&self, topic: &Topic, connection: ConnectionId) {
        if let Some(mut subscribers) = self.topics.get_mut(topic) {
            subscribers.remove(&connection);
        }
        self.topics
            .remove_if(topic, |_, subscribers| subscribers.is_empty());
    }

    /// Deliver an event to every subscriber of `topic` on this node and to
    /// the relay when one is attached. Returns the number of local mailboxes
    /// that accepted it.
    pub fn publish(&self, topic: &Topic, event: OutboundEnvelope) -> usize {
        let event = Arc::new(event);
        let delivered = self.deliver_local(topic, &event);

        if let Some(relay) = self.relay.read().as_ref() {
            relay.publish(topic.as_str(), event.encode());
        }

        delivered
    }

    /// Deliver to subscribers on this node only.
    ///
    /// Closed mailboxes are skipped; they never stop the fan-out.
    pub fn deliver_local(&self, topic: &Topic, event: &Arc<OutboundEnvelope>) -> usize {
        let Some(subscribers) = self.topics.get(topic) else {
            tracing::trace!(topic = %topic, "No subscribers");
            return 0;
        };

        let mut delivered = 0;
        let mut dropped = 0;
        for (connection, mailbox) in subscribers.iter() {
            if mailbox.send(Arc::clone(event)).is_ok() {
                delivered += 1;
            } else {
                dropped += 1;
                tracing::trace!(topic = %topic, connection_id = %connection, "Mailbox closed");
            }
        }
        drop(subscribers);

        metrics::record_fanout(delivered, dropped);
        delivered
    }

    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics.get(topic).map(|s| s.len()).unwrap_or(0)
    }

    pub fn topics_of(&self, connection: ConnectionId) -> Vec<Topic> {
        self.memberships
            .get(&connection)
            .map(|held| held.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> FabricStats {
        FabricStats {
            topics: self.topics.len(),
            connections: self.memberships.len(),
            subscriptions: self.topics.iter().map(|entry| entry.value().len()).sum(),
        }
    }
}

impl Default for RoutingFabric {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayInbox for RoutingFabric {
    fn deliver(&self, topic: &str, payload: &str) {
        match serde_json::from_str::<OutboundEnvelope>(payload) {
            Ok(event) => {
                self.deliver_local(&Topic(topic.to_string()), &Arc::new(event));
            }
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "Undecodable relayed event");
            }
        }
    }
}
