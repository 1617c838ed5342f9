// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres Agent
//!
//! PostgreSQL-backed delivery agent store (`delivery_agents` table).
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements `AgentRepository`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use crate::domain::agent::{AccountStatus, Agent, AgentAvailability, AgentId};
use crate::domain::repository::{AgentFilter, AgentRepository, RepositoryError};

pub struct PostgresAgentRepository {
    pool: PgPool,
}

impl PostgresAgentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentRepository for PostgresAgentRepository {
    async fn save(&self, agent: &Agent) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO delivery_agents (id, name, availability, account_status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                availability = EXCLUDED.availability,
                account_status = EXCLUDED.account_status
            "#
        )
        .bind(agent.id.as_str())
        .bind(&agent.name)
        .bind(agent.availability.as_str())
        .bind(agent.account_status.as_str())
        .bind(agent.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save agent: {}", e)))?;

        Ok(())
    }

    async fn create_if_absent(&self, agent: &Agent) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO delivery_agents (id, name, availability, account_status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#
        )
        .bind(agent.id.as_str())
        .bind(&agent.name)
        .bind(agent.availability.as_str())
        .bind(agent.account_status.as_str())
        .bind(agent.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to create agent: {}", e)))?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_by_id(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, availability, account_status, created_at
            FROM delivery_agents
            WHERE id = $1
            "#
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(parse_agent_row).transpose()
    }

    async fn find_available(&self, filter: &AgentFilter) -> Result<Vec<Agent>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, availability, account_status, created_at
            FROM delivery_agents
            WHERE availability = $1 AND account_status = $2
            ORDER BY created_at ASC, id ASC
            "#
        )
        .bind(filter.availability.as_str())
        .bind(filter.account_status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(parse_agent_row).collect()
    }
}

fn parse_agent_row(row: PgRow) -> Result<Agent, RepositoryError> {
    let availability: String = row.try_get("availability")?;
    let account_status: String = row.try_get("account_status")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(Agent {
        id: AgentId(row.try_get("id")?),
        name: row.try_get("name")?,
        availability: availability
            .parse::<AgentAvailability>()
            .map_err(RepositoryError::Serialization)?,
        account_status: account_status
            .parse::<AccountStatus>()
            .map_err(RepositoryError::Serialization)?,
        created_at,
    })
}
