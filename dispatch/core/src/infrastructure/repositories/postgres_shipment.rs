// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres Shipment
//!
//! PostgreSQL-backed shipment record store.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements `ShipmentRepository` on the `shipments` table
//!
//! `conditional_assign` is one `UPDATE ... WHERE id = $ AND status = $`
//! statement. PostgreSQL takes the row lock for the update and re-evaluates
//! the predicate against the latest committed row, so concurrent claimers of
//! the same row are serialized and only one sees `rows_affected() == 1`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use crate::domain::agent::AgentId;
use crate::domain::repository::{RepositoryError, ShipmentFilter, ShipmentRepository};
use crate::domain::shipment::{Shipment, ShipmentCategory, ShipmentId, ShipmentStatus};

pub struct PostgresShipmentRepository {
    pool: PgPool,
}

impl PostgresShipmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShipmentRepository for PostgresShipmentRepository {
    async fn save(&self, shipment: &Shipment) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO shipments (id, status, assigned_agent, category, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                assigned_agent = EXCLUDED.assigned_agent,
                category = EXCLUDED.category,
                updated_at = EXCLUDED.updated_at
            "#
        )
        .bind(shipment.id.as_str())
        .bind(shipment.status.as_str())
        .bind(shipment.assigned_agent.as_ref().map(|a| a.as_str()))
        .bind(shipment.category.as_str())
        .bind(shipment.created_at)
        .bind(shipment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save shipment: {}", e)))?;

        Ok(())
    }

    async fn create_if_absent(&self, shipment: &Shipment) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO shipments (id, status, assigned_agent, category, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#
        )
        .bind(shipment.id.as_str())
        .bind(shipment.status.as_str())
        .bind(shipment.assigned_agent.as_ref().map(|a| a.as_str()))
        .bind(shipment.category.as_str())
        .bind(shipment.created_at)
        .bind(shipment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to create shipment: {}", e)))?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_by_id(&self, id: &ShipmentId) -> Result<Option<Shipment>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, status, assigned_agent, category, created_at, updated_at
            FROM shipments
            WHERE id = $1
            "#
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        row.map(parse_shipment_row).transpose()
    }

    async fn conditional_assign(
        &self,
        shipment_id: &ShipmentId,
        new_status: ShipmentStatus,
        agent_id: &AgentId,
        expected_status: ShipmentStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE shipments
            SET status = $1, assigned_agent = $2, updated_at = NOW()
            WHERE id = $3 AND status = $4
            "#
        )
        .bind(new_status.as_str())
        .bind(agent_id.as_str())
        .bind(shipment_id.as_str())
        .bind(expected_status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Conditional assign failed: {}", e)))?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_by_filter(&self, filter: &ShipmentFilter) -> Result<Vec<Shipment>, RepositoryError> {
        // NULL parameters leave the column unconstrained
        let rows = sqlx::query(
            r#"
            SELECT id, status, assigned_agent, category, created_at, updated_at
            FROM shipments
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::TEXT IS NULL OR category = $2)
            ORDER BY created_at ASC, id ASC
            "#
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.category.map(|c| c.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        rows.into_iter().map(parse_shipment_row).collect()
    }
}

fn parse_shipment_row(row: PgRow) -> Result<Shipment, RepositoryError> {
    let status: String = row.try_get("status")?;
    let category: String = row.try_get("category")?;
    let assigned_agent: Option<String> = row.try_get("assigned_agent")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(Shipment {
        id: ShipmentId(row.try_get("id")?),
        status: status
            .parse::<ShipmentStatus>()
            .map_err(RepositoryError::Serialization)?,
        assigned_agent: assigned_agent.map(AgentId),
        category: category
            .parse::<ShipmentCategory>()
            .map_err(RepositoryError::Serialization)?,
        created_at,
        updated_at,
    })
}
