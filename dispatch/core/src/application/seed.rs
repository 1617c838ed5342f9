// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Startup seed data.
//!
//! Loads a YAML file of delivery agents and pending shipments. Records are
//! inserted only when their id is new, so re-applying the file on restart
//! never resets a shipment that has already been assigned:
//!
//! ```yaml
//! agents:
//!   - id: D1
//!     name: Dana
//!   - id: D2
//!     name: Eli
//!     account_status: pending_review
//! shipments:
//!   - id: TRK-1
//!     category: land
//! ```
//!
//! Entries get `created_at` values one millisecond apart in file order, so the
//! distribution order matches the file.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use crate::application::repository_factory::Repositories;
use crate::domain::agent::{AccountStatus, Agent, AgentAvailability};
use crate::domain::shipment::{Shipment, ShipmentCategory};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub agents: Vec<AgentSeed>,
    #[serde(default)]
    pub shipments: Vec<ShipmentSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentSeed {
    pub id: String,
    pub name: String,
    #[serde(default = "default_availability")]
    pub availability: AgentAvailability,
    #[serde(default = "default_account_status")]
    pub account_status: AccountStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShipmentSeed {
    pub id: String,
    pub category: ShipmentCategory,
}

fn default_availability() -> AgentAvailability {
    AgentAvailability::Available
}

fn default_account_status() -> AccountStatus {
    AccountStatus::Active
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    /// Agents inserted
    pub agents: usize,
    /// Shipments inserted
    pub shipments: usize,
    /// Entries whose id was already present and left as stored
    pub existing: usize,
}

impl SeedFile {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse seed file {}", path.display()))
    }

    pub async fn apply(&self, repos: &Repositories) -> Result<SeedSummary> {
        let base = Utc::now();
        let mut summary = SeedSummary {
            agents: 0,
            shipments: 0,
            existing: 0,
        };

        for (i, seed) in self.agents.iter().enumerate() {
            let mut agent = Agent::new(seed.id.as_str(), seed.name.as_str())
                .with_availability(seed.availability)
                .with_account_status(seed.account_status);
            agent.created_at = base + Duration::milliseconds(i as i64);
            if repos.agents.create_if_absent(&agent).await? {
                summary.agents += 1;
            } else {
                summary.existing += 1;
            }
        }

        for (i, seed) in self.shipments.iter().enumerate() {
            let mut shipment = Shipment::new(seed.id.as_str(), seed.category);
            shipment.created_at = base + Duration::milliseconds(i as i64);
            shipment.updated_at = shipment.created_at;
            if repos.shipments.create_if_absent(&shipment).await? {
                summary.shipments += 1;
            } else {
                debug!(shipment_id = %shipment.id, "Seed shipment already stored, leaving as is");
                summary.existing += 1;
            }
        }

        info!(
            agents = summary.agents,
            shipments = summary.shipments,
            existing = summary.existing,
            "Seed data loaded"
        );
        Ok(summary)
    }
}
