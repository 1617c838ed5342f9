// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Presence Registry - Routing for Agent Notifications
//
// Maps each connected agent to at most one live outbound channel and routes
// notifications point-to-point, to everyone except one agent, to a named
// group, or to everyone.
//
// Delivery is best-effort: closed or full channels are logged, counted and
// dropped. Nothing is queued for agents that are offline.

use crate::domain::agent::AgentId;
use crate::domain::error::DispatchError;
use crate::domain::events::AgentNotification;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Identifies one registration of an agent's channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outbound half of an agent connection
#[derive(Debug, Clone)]
pub struct AgentChannel {
    sender: mpsc::Sender<AgentNotification>,
}

/// Inbound half, drained by the transport (WebSocket writer task)
pub type AgentReceiver = mpsc::Receiver<AgentNotification>;

impl AgentChannel {
    /// Create a bounded channel pair
    pub fn bounded(capacity: usize) -> (Self, AgentReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Non-blocking send; `agent_id` only labels the error
    pub fn try_send(&self, agent_id: &AgentId, message: AgentNotification) -> Result<(), DeliveryError> {
        self.sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::ChannelFull(agent_id.clone()),
            mpsc::error::TrySendError::Closed(_) => DeliveryError::ChannelClosed(agent_id.clone()),
        })
    }
}

struct Connection {
    id: ConnectionId,
    channel: AgentChannel,
    groups: HashSet<String>,
}

/// Result of a fan-out send
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Registry of connected agents
#[derive(Clone)]
pub struct PresenceRegistry {
    connections: Arc<DashMap<AgentId, Connection>>,
    channel_capacity: usize,
}

impl PresenceRegistry {
    /// Create a registry whose channels buffer `channel_capacity` messages
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Registry with the default per-agent buffer (64)
    pub fn with_default_capacity() -> Self {
        Self::new(64)
    }

    /// Open a channel sized for this registry
    pub fn open_channel(&self) -> (AgentChannel, AgentReceiver) {
        AgentChannel::bounded(self.channel_capacity)
    }

    /// Bind `channel` to `agent_id`, superseding any previous channel.
    ///
    /// The superseded channel is not closed here; its transport notices on
    /// its own. Group memberships start empty for the new connection.
    pub fn register(&self, agent_id: AgentId, channel: AgentChannel) -> ConnectionId {
        self.register_with_groups(agent_id, channel, std::iter::empty::<String>())
    }

    /// Like [`register`](Self::register), with the connection already a
    /// member of `groups` when it becomes visible.
    pub fn register_with_groups<I, G>(&self, agent_id: AgentId, channel: AgentChannel, groups: I) -> ConnectionId
    where
        I: IntoIterator<Item = G>,
        G: Into<String>,
    {
        let id = ConnectionId::new();
        let previous = self.connections.insert(
            agent_id.clone(),
            Connection {
                id,
                channel,
                groups: groups.into_iter().map(Into::into).collect(),
            },
        );

        match previous {
            Some(old) => debug!(agent_id = %agent_id, superseded = %old.id, connection_id = %id, "Agent channel replaced"),
            None => debug!(agent_id = %agent_id, connection_id = %id, "Agent connected"),
        }
        self.record_gauge();
        id
    }

    /// Remove the agent's channel. No-op if absent.
    pub fn unregister(&self, agent_id: &AgentId) -> bool {
        let removed = self.connections.remove(agent_id).is_some();
        if removed {
            debug!(agent_id = %agent_id, "Agent disconnected");
            self.record_gauge();
        }
        removed
    }

    /// Remove the agent's channel only if it still belongs to `connection_id`.
    ///
    /// A superseded socket that closes late must not evict its replacement.
    pub fn unregister_connection(&self, agent_id: &AgentId, connection_id: ConnectionId) -> bool {
        let removed = self
            .connections
            .remove_if(agent_id, |_, conn| conn.id == connection_id)
            .is_some();
        if removed {
            debug!(agent_id = %agent_id, connection_id = %connection_id, "Agent disconnected");
            self.record_gauge();
        }
        removed
    }

    /// Add the agent's current connection to a named group (e.g. its inbox).
    ///
    /// Returns `false` if the agent is not connected.
    pub fn join_group(&self, agent_id: &AgentId, group: impl Into<String>) -> bool {
        match self.connections.get_mut(agent_id) {
            Some(mut conn) => {
                conn.groups.insert(group.into());
                true
            }
            None => false,
        }
    }

    pub fn is_connected(&self, agent_id: &AgentId) -> bool {
        self.connections.contains_key(agent_id)
    }

    /// Connected agent ids, sorted
    pub fn connected_agents(&self) -> Vec<AgentId> {
        let mut agents: Vec<AgentId> = self.connections.iter().map(|e| e.key().clone()).collect();
        agents.sort();
        agents
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Point-to-point send
    pub fn send_to(&self, agent_id: &AgentId, message: AgentNotification) -> Result<(), DeliveryError> {
        let channel = self
            .connections
            .get(agent_id)
            .map(|conn| conn.channel.clone())
            .ok_or_else(|| DeliveryError::NotConnected(agent_id.clone()));

        let event = message.event_name();
        let result = channel.and_then(|ch| ch.try_send(agent_id, message));
        if let Err(e) = &result {
            warn!(agent_id = %agent_id, event, error = %e, "Notification not delivered");
            metrics::counter!("courier_notifications_failed_total").increment(1);
        }
        result
    }

    /// Send to every connected agent except `except`
    pub fn broadcast_except(&self, except: &AgentId, message: AgentNotification) -> DeliveryReport {
        let targets = self.collect_targets(|agent_id, _| agent_id != except);
        self.fan_out(targets, message)
    }

    /// Send to every connected agent
    pub fn broadcast(&self, message: AgentNotification) -> DeliveryReport {
        let targets = self.collect_targets(|_, _| true);
        self.fan_out(targets, message)
    }

    /// Send to every connection that joined `group`
    pub fn send_to_group(&self, group: &str, message: AgentNotification) -> DeliveryReport {
        let targets = self.collect_targets(|_, conn| conn.groups.contains(group));
        self.fan_out(targets, message)
    }

    // Snapshot targets so no map shard is held while sending
    fn collect_targets<F>(&self, predicate: F) -> Vec<(AgentId, AgentChannel)>
    where
        F: Fn(&AgentId, &Connection) -> bool,
    {
        self.connections
            .iter()
            .filter(|entry| predicate(entry.key(), entry.value()))
            .map(|entry| (entry.key().clone(), entry.value().channel.clone()))
            .collect()
    }

    fn fan_out(&self, targets: Vec<(AgentId, AgentChannel)>, message: AgentNotification) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for (agent_id, channel) in targets {
            match channel.try_send(&agent_id, message.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    debug!(agent_id = %agent_id, error = %e, "Notification not delivered");
                }
            }
        }

        if report.failed > 0 {
            metrics::counter!("courier_notifications_failed_total").increment(report.failed as u64);
            warn!(
                event = message.event_name(),
                delivered = report.delivered,
                failed = report.failed,
                "Fan-out partially delivered"
            );
        }
        report
    }

    fn record_gauge(&self) {
        metrics::gauge!("courier_connected_agents").set(self.connections.len() as f64);
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Reasons a notification was not handed to a channel
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("Agent {0} is not connected")]
    NotConnected(AgentId),

    #[error("Channel for agent {0} is closed")]
    ChannelClosed(AgentId),

    #[error("Channel for agent {0} is full")]
    ChannelFull(AgentId),
}

impl From<DeliveryError> for DispatchError {
    fn from(err: DeliveryError) -> Self {
        match err {
            DeliveryError::NotConnected(_) => DispatchError::Unavailable(err.to_string()),
            DeliveryError::ChannelClosed(_) | DeliveryError::ChannelFull(_) => {
                DispatchError::TransportFailure(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shipment::ShipmentId;

    fn notice(text: &str) -> AgentNotification {
        AgentNotification::Notice {
            message: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let registry = PresenceRegistry::new(8);
        let agent = AgentId::new("A");

        let (chan_a, mut rx_a) = registry.open_channel();
        let (chan_b, mut rx_b) = registry.open_channel();
        registry.register(agent.clone(), chan_a);
        registry.register(agent.clone(), chan_b);

        registry.send_to(&agent, notice("hello")).unwrap();

        assert_eq!(rx_b.recv().await.unwrap(), notice("hello"));
        assert!(rx_a.try_recv().is_err());
        assert_eq!(registry.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_connection_cannot_evict_replacement() {
        let registry = PresenceRegistry::new(8);
        let agent = AgentId::new("A");

        let (old_chan, _old_rx) = registry.open_channel();
        let old_id = registry.register(agent.clone(), old_chan);
        let (new_chan, mut new_rx) = registry.open_channel();
        let new_id = registry.register(agent.clone(), new_chan);

        assert!(!registry.unregister_connection(&agent, old_id));
        assert!(registry.is_connected(&agent));

        registry.send_to(&agent, notice("still here")).unwrap();
        assert_eq!(new_rx.recv().await.unwrap(), notice("still here"));

        assert!(registry.unregister_connection(&agent, new_id));
        assert!(!registry.is_connected(&agent));
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let registry = PresenceRegistry::new(8);
        let agent = AgentId::new("A");
        let (chan, _rx) = registry.open_channel();
        registry.register(agent.clone(), chan);

        assert!(registry.unregister(&agent));
        assert!(!registry.unregister(&agent));
        assert_eq!(
            registry.send_to(&agent, notice("x")),
            Err(DeliveryError::NotConnected(agent.clone()))
        );
    }

    #[tokio::test]
    async fn test_broadcast_except_skips_sender() {
        let registry = PresenceRegistry::new(8);
        let mut receivers = Vec::new();
        for name in ["D1", "D2", "D3"] {
            let (chan, rx) = registry.open_channel();
            registry.register(AgentId::new(name), chan);
            receivers.push(rx);
        }

        let claimed = AgentNotification::ShipmentClaimed {
            shipment_id: ShipmentId::new("TRK-1"),
        };
        let report = registry.broadcast_except(&AgentId::new("D1"), claimed.clone());
        assert_eq!(report, DeliveryReport { delivered: 2, failed: 0 });

        assert!(receivers[0].try_recv().is_err());
        assert_eq!(receivers[1].recv().await.unwrap(), claimed);
        assert_eq!(receivers[2].recv().await.unwrap(), claimed);

        let report = registry.broadcast(notice("all"));
        assert_eq!(report.delivered, 3);
    }

    #[tokio::test]
    async fn test_group_delivery_and_reset_on_reconnect() {
        let registry = PresenceRegistry::new(8);
        let d1 = AgentId::new("D1");
        let d2 = AgentId::new("D2");
        let (c1, mut r1) = registry.open_channel();
        let (c2, mut r2) = registry.open_channel();
        registry.register(d1.clone(), c1);
        registry.register(d2.clone(), c2);

        assert!(registry.join_group(&d1, "inbox:D1"));
        assert!(!registry.join_group(&AgentId::new("ghost"), "inbox:ghost"));

        let report = registry.send_to_group("inbox:D1", notice("direct"));
        assert_eq!(report.delivered, 1);
        assert_eq!(r1.recv().await.unwrap(), notice("direct"));
        assert!(r2.try_recv().is_err());

        let (c1b, _r1b) = registry.open_channel();
        registry.register(d1, c1b);
        assert_eq!(registry.send_to_group("inbox:D1", notice("again")).delivered, 0);
    }

    #[tokio::test]
    async fn test_closed_and_full_channels_are_swallowed() {
        let registry = PresenceRegistry::new(1);
        let closed = AgentId::new("closed");
        let full = AgentId::new("full");
        let live = AgentId::new("live");

        let (c_closed, rx_closed) = registry.open_channel();
        drop(rx_closed);
        registry.register(closed.clone(), c_closed);

        let (c_full, _rx_full) = registry.open_channel();
        registry.register(full.clone(), c_full);
        registry.send_to(&full, notice("fill")).unwrap();

        let (c_live, mut rx_live) = registry.open_channel();
        registry.register(live, c_live);

        assert_eq!(
            registry.send_to(&closed, notice("x")),
            Err(DeliveryError::ChannelClosed(closed))
        );
        assert_eq!(
            registry.send_to(&full, notice("x")),
            Err(DeliveryError::ChannelFull(full))
        );

        let report = registry.broadcast(notice("fan"));
        assert_eq!(report, DeliveryReport { delivered: 1, failed: 2 });
        assert_eq!(rx_live.recv().await.unwrap(), notice("fan"));
    }

    #[tokio::test]
    async fn test_register_with_groups_joins_on_insert() {
        let registry = PresenceRegistry::new(8);
        let d1 = AgentId::new("D1");

        let (old_chan, mut old_rx) = registry.open_channel();
        registry.register_with_groups(d1.clone(), old_chan, ["inbox:D1"]);
        assert_eq!(registry.send_to_group("inbox:D1", notice("first")).delivered, 1);
        assert_eq!(old_rx.recv().await.unwrap(), notice("first"));

        let (new_chan, mut new_rx) = registry.open_channel();
        registry.register_with_groups(d1.clone(), new_chan, ["inbox:D1", "zone:north"]);

        assert_eq!(registry.send_to_group("zone:north", notice("second")).delivered, 1);
        assert_eq!(new_rx.recv().await.unwrap(), notice("second"));
        assert!(old_rx.try_recv().is_err());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_point_to_point_failure_logs_warning() {
        let registry = PresenceRegistry::new(8);
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(logs.clone())
            .finish();

        let result = tracing::subscriber::with_default(subscriber, || {
            registry.send_to(&AgentId::new("offline"), notice("x"))
        });

        assert!(result.is_err());
        let output = logs.text();
        assert!(output.contains("WARN"), "{}", output);
        assert!(output.contains("Notification not delivered"), "{}", output);
    }

    #[test]
    fn test_delivery_error_mapping() {
        let agent = AgentId::new("D1");
        assert!(matches!(
            DispatchError::from(DeliveryError::NotConnected(agent.clone())),
            DispatchError::Unavailable(_)
        ));
        assert!(matches!(
            DispatchError::from(DeliveryError::ChannelFull(agent.clone())),
            DispatchError::TransportFailure(_)
        ));
        assert!(matches!(
            DispatchError::from(DeliveryError::ChannelClosed(agent)),
            DispatchError::TransportFailure(_)
        ));
    }

    #[test]
    fn test_connected_agents_sorted() {
        let registry = PresenceRegistry::default();
        for name in ["D3", "D1", "D2"] {
            let (chan, _rx) = registry.open_channel();
            registry.register(AgentId::new(name), chan);
        }
        assert_eq!(
            registry.connected_agents(),
            vec![AgentId::new("D1"), AgentId::new("D2"), AgentId::new("D3")]
        );
    }
}
