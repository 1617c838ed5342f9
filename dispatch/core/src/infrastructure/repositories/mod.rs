// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the record store contracts defined in
//! `crate::domain::repository`.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve shipments and delivery agents
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! ## PostgreSQL Repositories
//!
//! - **PostgresShipmentRepository** - shipments, conditional assignment as a single `UPDATE`
//! - **PostgresAgentRepository** - delivery agents
//!
//! ## In-Memory Repositories
//!
//! - **InMemoryShipmentRepository** - `RwLock<HashMap>`; conditional assignment
//!   checks and writes under one write guard
//! - **InMemoryAgentRepository** - `RwLock<HashMap>`

pub mod postgres_shipment;
pub mod postgres_agent;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use chrono::Utc;
use crate::domain::agent::{Agent, AgentAvailability, AgentId};
use crate::domain::repository::{
    AgentFilter, AgentRepository, RepositoryError, ShipmentFilter, ShipmentRepository,
};
use crate::domain::shipment::{Shipment, ShipmentId, ShipmentStatus};

#[derive(Clone, Default)]
pub struct InMemoryShipmentRepository {
    shipments: Arc<RwLock<HashMap<ShipmentId, Shipment>>>,
}

impl InMemoryShipmentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShipmentRepository for InMemoryShipmentRepository {
    async fn save(&self, shipment: &Shipment) -> Result<(), RepositoryError> {
        let mut shipments = self.shipments.write();
        shipments.insert(shipment.id.clone(), shipment.clone());
        Ok(())
    }

    async fn create_if_absent(&self, shipment: &Shipment) -> Result<bool, RepositoryError> {
        let mut shipments = self.shipments.write();
        match shipments.entry(shipment.id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(shipment.clone());
                Ok(true)
            }
        }
    }

    async fn find_by_id(&self, id: &ShipmentId) -> Result<Option<Shipment>, RepositoryError> {
        let shipments = self.shipments.read();
        Ok(shipments.get(id).cloned())
    }

    async fn conditional_assign(
        &self,
        shipment_id: &ShipmentId,
        new_status: ShipmentStatus,
        agent_id: &AgentId,
        expected_status: ShipmentStatus,
    ) -> Result<bool, RepositoryError> {
        // Check and write under the same guard
        let mut shipments = self.shipments.write();
        match shipments.get_mut(shipment_id) {
            Some(shipment) if shipment.status == expected_status => {
                shipment.status = new_status;
                shipment.assigned_agent = Some(agent_id.clone());
                shipment.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_by_filter(&self, filter: &ShipmentFilter) -> Result<Vec<Shipment>, RepositoryError> {
        let shipments = self.shipments.read();
        let mut matching: Vec<Shipment> = shipments
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(matching)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAgentRepository {
    agents: Arc<RwLock<HashMap<AgentId, Agent>>>,
}

impl InMemoryAgentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Availability is self-reported by the agent app; this is the hook it uses
    pub fn set_availability(&self, id: &AgentId, availability: AgentAvailability) -> Result<(), RepositoryError> {
        let mut agents = self.agents.write();
        let agent = agents
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(format!("agent {}", id)))?;
        agent.availability = availability;
        Ok(())
    }
}

#[async_trait]
impl AgentRepository for InMemoryAgentRepository {
    async fn save(&self, agent: &Agent) -> Result<(), RepositoryError> {
        let mut agents = self.agents.write();
        agents.insert(agent.id.clone(), agent.clone());
        Ok(())
    }

    async fn create_if_absent(&self, agent: &Agent) -> Result<bool, RepositoryError> {
        let mut agents = self.agents.write();
        match agents.entry(agent.id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(agent.clone());
                Ok(true)
            }
        }
    }

    async fn find_by_id(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError> {
        let agents = self.agents.read();
        Ok(agents.get(id).cloned())
    }

    async fn find_available(&self, filter: &AgentFilter) -> Result<Vec<Agent>, RepositoryError> {
        let agents = self.agents.read();
        let mut matching: Vec<Agent> = agents.values().filter(|a| filter.matches(a)).cloned().collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(matching)
    }
}
