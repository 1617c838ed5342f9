// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use courier_core::agent::{AccountStatus, Agent, AgentAvailability, AgentId};
use courier_core::application::distribution::{
    DistributionEngine, DistributionOutcome, StandardDistributionEngine,
};
use courier_core::error::DispatchError;
use courier_core::events::AgentNotification;
use courier_core::infrastructure::presence::{AgentReceiver, PresenceRegistry};
use courier_core::infrastructure::repositories::{InMemoryAgentRepository, InMemoryShipmentRepository};
use courier_core::repository::{AgentRepository, RepositoryError, ShipmentFilter, ShipmentRepository};
use courier_core::shipment::{Shipment, ShipmentCategory, ShipmentId, ShipmentStatus};

struct Fixture {
    shipments: Arc<InMemoryShipmentRepository>,
    agents: Arc<InMemoryAgentRepository>,
    presence: PresenceRegistry,
}

impl Fixture {
    fn new() -> Self {
        Self {
            shipments: Arc::new(InMemoryShipmentRepository::new()),
            agents: Arc::new(InMemoryAgentRepository::new()),
            presence: PresenceRegistry::new(16),
        }
    }

    async fn with_shipments(self, category: ShipmentCategory, ids: &[&str]) -> Self {
        let base = Utc::now();
        for (i, id) in ids.iter().enumerate() {
            let mut shipment = Shipment::new(*id, category);
            shipment.created_at = base + Duration::seconds(i as i64);
            self.shipments.save(&shipment).await.unwrap();
        }
        self
    }

    async fn with_agents(self, agents: Vec<Agent>) -> Self {
        let base = Utc::now();
        for (i, mut agent) in agents.into_iter().enumerate() {
            agent.created_at = base + Duration::seconds(i as i64);
            self.agents.save(&agent).await.unwrap();
        }
        self
    }

    fn connect(&self, id: &str) -> AgentReceiver {
        let (channel, rx) = self.presence.open_channel();
        self.presence.register(AgentId::new(id), channel);
        rx
    }

    fn engine(&self) -> StandardDistributionEngine {
        StandardDistributionEngine::new(self.shipments.clone(), self.agents.clone(), self.presence.clone())
    }

    async fn assignee(&self, id: &str) -> Option<AgentId> {
        self.shipments
            .find_by_id(&ShipmentId::new(id))
            .await
            .unwrap()
            .and_then(|s| s.assigned_agent)
    }
}

fn report(outcome: DistributionOutcome) -> courier_core::application::distribution::DistributionReport {
    match outcome {
        DistributionOutcome::Distributed(report) => report,
        other => panic!("expected a distribution report, got {:?}", other),
    }
}

#[tokio::test]
async fn test_five_shipments_two_agents_round_robin() {
    let fx = Fixture::new()
        .with_shipments(ShipmentCategory::Land, &["S0", "S1", "S2", "S3", "S4"])
        .await
        .with_agents(vec![Agent::new("A", "Alpha"), Agent::new("B", "Bravo")])
        .await;
    let mut rx_a = fx.connect("A");
    let mut rx_b = fx.connect("B");

    let report = report(fx.engine().distribute_pending_batch(ShipmentCategory::Land).await.unwrap());
    assert_eq!(report.assigned, 5);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.agents_used, 2);

    for (shipment, agent) in [("S0", "A"), ("S1", "B"), ("S2", "A"), ("S3", "B"), ("S4", "A")] {
        assert_eq!(fx.assignee(shipment).await, Some(AgentId::new(agent)), "{}", shipment);
    }

    let mut a_got = Vec::new();
    while let Ok(AgentNotification::NewAssignment { shipment_id }) = rx_a.try_recv() {
        a_got.push(shipment_id.to_string());
    }
    let mut b_got = Vec::new();
    while let Ok(AgentNotification::NewAssignment { shipment_id }) = rx_b.try_recv() {
        b_got.push(shipment_id.to_string());
    }
    assert_eq!(a_got, vec!["S0", "S2", "S4"]);
    assert_eq!(b_got, vec!["S1", "S3"]);
}

#[tokio::test]
async fn test_assignment_is_index_mod_agent_count() {
    let ids: Vec<String> = (0..7).map(|i| format!("S{}", i)).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let fx = Fixture::new()
        .with_shipments(ShipmentCategory::Air, &id_refs)
        .await
        .with_agents(vec![Agent::new("A", "A"), Agent::new("B", "B"), Agent::new("C", "C")])
        .await;

    let report = report(fx.engine().distribute_pending_batch(ShipmentCategory::Air).await.unwrap());
    let agents = ["A", "B", "C"];
    for (i, assignment) in report.assignments.iter().enumerate() {
        assert_eq!(assignment.shipment_id, ShipmentId::new(format!("S{}", i)));
        assert_eq!(assignment.agent_id, AgentId::new(agents[i % 3]));
    }
    assert_eq!(report.agents_used, 3);
}

#[tokio::test]
async fn test_fewer_shipments_than_agents_counts_used_agents() {
    let fx = Fixture::new()
        .with_shipments(ShipmentCategory::Sea, &["S0"])
        .await
        .with_agents(vec![Agent::new("A", "A"), Agent::new("B", "B"), Agent::new("C", "C")])
        .await;

    let report = report(fx.engine().distribute_pending_batch(ShipmentCategory::Sea).await.unwrap());
    assert_eq!(report.assigned, 1);
    assert_eq!(report.agents_used, 1);
}

#[tokio::test]
async fn test_empty_pending_set_is_checked_before_agents() {
    let fx = Fixture::new();
    let outcome = fx.engine().distribute_pending_batch(ShipmentCategory::Land).await.unwrap();
    assert_eq!(
        outcome,
        DistributionOutcome::NothingToDistribute {
            category: ShipmentCategory::Land
        }
    );
}

#[tokio::test]
async fn test_no_dispatchable_agents() {
    let fx = Fixture::new()
        .with_shipments(ShipmentCategory::Land, &["S0", "S1"])
        .await
        .with_agents(vec![
            Agent::new("BUSY", "Busy").with_availability(AgentAvailability::Busy),
            Agent::new("FROZEN", "Frozen").with_account_status(AccountStatus::Frozen),
            Agent::new("NEW", "New").with_account_status(AccountStatus::PendingReview),
        ])
        .await;

    let outcome = fx.engine().distribute_pending_batch(ShipmentCategory::Land).await.unwrap();
    assert_eq!(
        outcome,
        DistributionOutcome::NoAgentsAvailable {
            category: ShipmentCategory::Land,
            pending: 2,
        }
    );
    assert_eq!(outcome.assigned(), 0);
    assert_eq!(fx.assignee("S0").await, None);
}

#[tokio::test]
async fn test_other_categories_are_left_alone() {
    let fx = Fixture::new()
        .with_shipments(ShipmentCategory::Land, &["L0"])
        .await
        .with_shipments(ShipmentCategory::Air, &["A0"])
        .await
        .with_agents(vec![Agent::new("A", "A")])
        .await;

    let report = report(fx.engine().distribute_pending_batch(ShipmentCategory::Land).await.unwrap());
    assert_eq!(report.assigned, 1);

    let still_pending = fx
        .shipments
        .find_by_filter(&ShipmentFilter::pending(ShipmentCategory::Air))
        .await
        .unwrap();
    assert_eq!(still_pending.len(), 1);
}

/// Record store whose shipment `contested` is claimed by `rival` just before
/// the batch writes it
struct ContestedShipments {
    inner: Arc<InMemoryShipmentRepository>,
    contested: ShipmentId,
    rival: AgentId,
}

#[async_trait]
impl ShipmentRepository for ContestedShipments {
    async fn save(&self, shipment: &Shipment) -> Result<(), RepositoryError> {
        self.inner.save(shipment).await
    }

    async fn find_by_id(&self, id: &ShipmentId) -> Result<Option<Shipment>, RepositoryError> {
        self.inner.find_by_id(id).await
    }

    async fn conditional_assign(
        &self,
        shipment_id: &ShipmentId,
        new_status: ShipmentStatus,
        agent_id: &AgentId,
        expected_status: ShipmentStatus,
    ) -> Result<bool, RepositoryError> {
        if shipment_id == &self.contested {
            self.inner
                .conditional_assign(shipment_id, ShipmentStatus::OutForDelivery, &self.rival, ShipmentStatus::Pending)
                .await?;
        }
        self.inner
            .conditional_assign(shipment_id, new_status, agent_id, expected_status)
            .await
    }

    async fn create_if_absent(&self, shipment: &Shipment) -> Result<bool, RepositoryError> {
        self.inner.create_if_absent(shipment).await
    }

    async fn find_by_filter(&self, filter: &ShipmentFilter) -> Result<Vec<Shipment>, RepositoryError> {
        self.inner.find_by_filter(filter).await
    }
}

/// Record store whose conditional update fails from the `fail_from`th write on
struct FailingShipments {
    inner: Arc<InMemoryShipmentRepository>,
    writes: AtomicUsize,
    fail_from: usize,
}

#[async_trait]
impl ShipmentRepository for FailingShipments {
    async fn save(&self, shipment: &Shipment) -> Result<(), RepositoryError> {
        self.inner.save(shipment).await
    }

    async fn create_if_absent(&self, shipment: &Shipment) -> Result<bool, RepositoryError> {
        self.inner.create_if_absent(shipment).await
    }

    async fn find_by_id(&self, id: &ShipmentId) -> Result<Option<Shipment>, RepositoryError> {
        self.inner.find_by_id(id).await
    }

    async fn conditional_assign(
        &self,
        shipment_id: &ShipmentId,
        new_status: ShipmentStatus,
        agent_id: &AgentId,
        expected_status: ShipmentStatus,
    ) -> Result<bool, RepositoryError> {
        let write = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        if write >= self.fail_from {
            return Err(RepositoryError::Database("connection reset".to_string()));
        }
        self.inner
            .conditional_assign(shipment_id, new_status, agent_id, expected_status)
            .await
    }

    async fn find_by_filter(&self, filter: &ShipmentFilter) -> Result<Vec<Shipment>, RepositoryError> {
        self.inner.find_by_filter(filter).await
    }
}

#[tokio::test]
async fn test_store_failure_mid_batch_keeps_committed_notices() {
    let fx = Fixture::new()
        .with_shipments(ShipmentCategory::Land, &["S0", "S1", "S2"])
        .await
        .with_agents(vec![Agent::new("A", "A"), Agent::new("B", "B")])
        .await;
    let mut rx_a = fx.connect("A");
    let mut rx_b = fx.connect("B");
    let failing = Arc::new(FailingShipments {
        inner: fx.shipments.clone(),
        writes: AtomicUsize::new(0),
        fail_from: 2,
    });
    let engine = StandardDistributionEngine::new(failing, fx.agents.clone(), fx.presence.clone());

    let result = engine.distribute_pending_batch(ShipmentCategory::Land).await;
    assert!(matches!(result, Err(DispatchError::Store(_))));

    assert_eq!(fx.assignee("S0").await, Some(AgentId::new("A")));
    assert_eq!(fx.assignee("S1").await, None);
    assert_eq!(
        rx_a.try_recv().unwrap(),
        AgentNotification::NewAssignment {
            shipment_id: ShipmentId::new("S0")
        }
    );
    assert!(rx_b.try_recv().is_err());
}

#[tokio::test]
async fn test_shipment_claimed_mid_batch_is_skipped() {
    let fx = Fixture::new()
        .with_shipments(ShipmentCategory::Land, &["S0", "S1", "S2"])
        .await
        .with_agents(vec![Agent::new("A", "A"), Agent::new("B", "B")])
        .await;
    let contested = Arc::new(ContestedShipments {
        inner: fx.shipments.clone(),
        contested: ShipmentId::new("S1"),
        rival: AgentId::new("RIVAL"),
    });
    let engine = StandardDistributionEngine::new(contested, fx.agents.clone(), fx.presence.clone());

    let report = report(engine.distribute_pending_batch(ShipmentCategory::Land).await.unwrap());
    assert_eq!(report.assigned, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.agents_used, 1);
    assert!(report.assignments.iter().all(|a| a.shipment_id != ShipmentId::new("S1")));

    assert_eq!(fx.assignee("S1").await, Some(AgentId::new("RIVAL")));
    assert_eq!(fx.assignee("S0").await, Some(AgentId::new("A")));
    assert_eq!(fx.assignee("S2").await, Some(AgentId::new("A")));
}

#[tokio::test]
async fn test_second_batch_finds_nothing() {
    let fx = Fixture::new()
        .with_shipments(ShipmentCategory::Land, &["S0", "S1"])
        .await
        .with_agents(vec![Agent::new("A", "A")])
        .await;
    let engine = fx.engine();

    assert_eq!(engine.distribute_pending_batch(ShipmentCategory::Land).await.unwrap().assigned(), 2);
    assert!(matches!(
        engine.distribute_pending_batch(ShipmentCategory::Land).await.unwrap(),
        DistributionOutcome::NothingToDistribute { .. }
    ));
}
