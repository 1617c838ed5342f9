// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Record Store Interfaces
//!
//! Persistence contracts for the two aggregates the dispatch core touches.
//! Interfaces live in the domain layer and are implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `ShipmentRepository` | `Shipment` | `InMemoryShipmentRepository`, `PostgresShipmentRepository` |
//! | `AgentRepository` | `Agent` | `InMemoryAgentRepository`, `PostgresAgentRepository` |
//!
//! ## Conditional assignment
//!
//! `ShipmentRepository::conditional_assign` is the only write the core issues
//! against a shipment. Implementations must evaluate the status precondition
//! and apply the write indivisibly (linearizable per shipment row). Claim
//! arbitration and batch distribution both depend on it for the single-winner
//! guarantee and never read-then-write.

use async_trait::async_trait;
use crate::domain::agent::{AccountStatus, Agent, AgentAvailability, AgentId};
use crate::domain::shipment::{Shipment, ShipmentCategory, ShipmentId, ShipmentStatus};

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostgresConfig {
    pub connection_string: String,
    pub max_connections: u32,
}

/// Shipment query. `None` fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShipmentFilter {
    pub status: Option<ShipmentStatus>,
    pub category: Option<ShipmentCategory>,
}

impl ShipmentFilter {
    /// Unclaimed shipments of one category
    pub fn pending(category: ShipmentCategory) -> Self {
        Self {
            status: Some(ShipmentStatus::Pending),
            category: Some(category),
        }
    }

    pub fn matches(&self, shipment: &Shipment) -> bool {
        self.status.map_or(true, |s| shipment.status == s)
            && self.category.map_or(true, |c| shipment.category == c)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentFilter {
    pub availability: AgentAvailability,
    pub account_status: AccountStatus,
}

impl AgentFilter {
    /// Available and not frozen or awaiting review
    pub fn dispatchable() -> Self {
        Self {
            availability: AgentAvailability::Available,
            account_status: AccountStatus::Active,
        }
    }

    pub fn matches(&self, agent: &Agent) -> bool {
        agent.availability == self.availability && agent.account_status == self.account_status
    }
}

/// Repository interface for Shipment aggregates
#[async_trait]
pub trait ShipmentRepository: Send + Sync {
    /// Save shipment (create or update). Used by order intake and fixtures;
    /// the dispatch core itself only writes through `conditional_assign`.
    async fn save(&self, shipment: &Shipment) -> Result<(), RepositoryError>;

    /// Insert `shipment` unless a record with its id exists. An existing
    /// record is left untouched, assignment included.
    ///
    /// Returns `true` if the shipment was inserted.
    async fn create_if_absent(&self, shipment: &Shipment) -> Result<bool, RepositoryError>;

    /// Find shipment by ID
    async fn find_by_id(&self, id: &ShipmentId) -> Result<Option<Shipment>, RepositoryError>;

    /// Atomically set `status = new_status, assigned_agent = agent_id` where
    /// `id = shipment_id AND status = expected_status`.
    ///
    /// Returns `true` if the row was updated.
    async fn conditional_assign(
        &self,
        shipment_id: &ShipmentId,
        new_status: ShipmentStatus,
        agent_id: &AgentId,
        expected_status: ShipmentStatus,
    ) -> Result<bool, RepositoryError>;

    /// Shipments matching the filter, ordered by creation time then id
    async fn find_by_filter(&self, filter: &ShipmentFilter) -> Result<Vec<Shipment>, RepositoryError>;
}

/// Repository interface for delivery Agent aggregates
#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Save agent (create or update)
    async fn save(&self, agent: &Agent) -> Result<(), RepositoryError>;

    /// Insert `agent` unless a record with its id exists.
    ///
    /// Returns `true` if the agent was inserted.
    async fn create_if_absent(&self, agent: &Agent) -> Result<bool, RepositoryError>;

    /// Find agent by ID
    async fn find_by_id(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError>;

    /// Agents matching the filter, ordered by creation time then id
    async fn find_available(&self, filter: &AgentFilter) -> Result<Vec<Agent>, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
