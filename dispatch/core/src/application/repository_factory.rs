// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates concrete record store implementations from the configured storage
//! backend, so the domain layer only ever sees the repository traits.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Backend selection and startup wiring for the record store

use anyhow::{bail, Context, Result};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use crate::domain::config::StorageConfig;
use crate::domain::repository::{AgentRepository, ShipmentRepository, StorageBackend};
use crate::infrastructure::db::Database;
use crate::infrastructure::repositories::postgres_agent::PostgresAgentRepository;
use crate::infrastructure::repositories::postgres_shipment::PostgresShipmentRepository;
use crate::infrastructure::repositories::{InMemoryAgentRepository, InMemoryShipmentRepository};

/// Creates a ShipmentRepository implementation based on the configured backend
pub fn create_shipment_repository(
    backend: &StorageBackend,
    pool: Option<PgPool>,
) -> Result<Arc<dyn ShipmentRepository>> {
    match (backend, pool) {
        (StorageBackend::InMemory, _) => Ok(Arc::new(InMemoryShipmentRepository::new())),
        (StorageBackend::PostgreSQL(_), Some(pool)) => Ok(Arc::new(PostgresShipmentRepository::new(pool))),
        (StorageBackend::PostgreSQL(_), None) => bail!("PostgreSQL backend selected without a connection pool"),
    }
}

/// Creates an AgentRepository implementation based on the configured backend
pub fn create_agent_repository(
    backend: &StorageBackend,
    pool: Option<PgPool>,
) -> Result<Arc<dyn AgentRepository>> {
    match (backend, pool) {
        (StorageBackend::InMemory, _) => Ok(Arc::new(InMemoryAgentRepository::new())),
        (StorageBackend::PostgreSQL(_), Some(pool)) => Ok(Arc::new(PostgresAgentRepository::new(pool))),
        (StorageBackend::PostgreSQL(_), None) => bail!("PostgreSQL backend selected without a connection pool"),
    }
}

/// Both record stores for one backend
#[derive(Clone)]
pub struct Repositories {
    pub shipments: Arc<dyn ShipmentRepository>,
    pub agents: Arc<dyn AgentRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            shipments: Arc::new(InMemoryShipmentRepository::new()),
            agents: Arc::new(InMemoryAgentRepository::new()),
        }
    }

    /// Connect (and migrate, if configured) the selected backend
    pub async fn from_config(storage: &StorageConfig) -> Result<Self> {
        let backend = storage.backend()?;

        let pool = match &backend {
            StorageBackend::InMemory => {
                info!("Using in-memory record store");
                None
            }
            StorageBackend::PostgreSQL(pg) => {
                let db = Database::connect(pg).await?;
                if storage.run_migrations {
                    db.migrate().await?;
                }
                info!(max_connections = pg.max_connections, "Using PostgreSQL record store");
                Some(db.get_pool().clone())
            }
        };

        Ok(Self {
            shipments: create_shipment_repository(&backend, pool.clone())
                .context("Failed to create shipment repository")?,
            agents: create_agent_repository(&backend, pool)
                .context("Failed to create agent repository")?,
        })
    }
}
