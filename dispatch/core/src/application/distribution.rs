// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Distribution Engine
//!
//! Operator-triggered batch that spreads every pending shipment of one
//! category across the agents currently available for work.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Batch `Pending -> OutForDelivery` transitions
//!
//! The shipment and agent snapshots are read once. Each planned assignment
//! then goes through the same conditional update the claim path uses, so a
//! shipment claimed by an agent after the snapshot is skipped instead of
//! overwritten. Each agent is notified as soon as its write commits; if the
//! store fails partway, the assignments already made stay made and their
//! agents have already been told.

use crate::domain::agent::{Agent, AgentId};
use crate::domain::error::DispatchError;
use crate::domain::events::AgentNotification;
use crate::domain::repository::{AgentFilter, AgentRepository, ShipmentFilter, ShipmentRepository};
use crate::domain::shipment::{Shipment, ShipmentCategory, ShipmentId, ShipmentStatus};
use crate::infrastructure::presence::PresenceRegistry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One planned or applied shipment-to-agent pairing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub shipment_id: ShipmentId,
    pub agent_id: AgentId,
}

/// Pairs shipments with agents. Inputs arrive in stable store order.
pub trait AssignmentPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Plan assignments for `shipments`. Returns an empty plan when `agents`
    /// is empty.
    fn plan(&self, shipments: &[Shipment], agents: &[Agent]) -> Vec<Assignment>;
}

/// Shipment `i` goes to agent `i mod len(agents)`
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobinPolicy;

impl AssignmentPolicy for RoundRobinPolicy {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn plan(&self, shipments: &[Shipment], agents: &[Agent]) -> Vec<Assignment> {
        if agents.is_empty() {
            return Vec::new();
        }

        shipments
            .iter()
            .enumerate()
            .map(|(i, shipment)| Assignment {
                shipment_id: shipment.id.clone(),
                agent_id: agents[i % agents.len()].id.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionReport {
    pub category: ShipmentCategory,
    /// Shipments whose conditional update applied
    pub assigned: usize,
    /// Shipments claimed by someone else between snapshot and write
    pub skipped: usize,
    /// Distinct agents that received at least one shipment
    pub agents_used: usize,
    pub assignments: Vec<Assignment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DistributionOutcome {
    NothingToDistribute {
        category: ShipmentCategory,
    },
    NoAgentsAvailable {
        category: ShipmentCategory,
        pending: usize,
    },
    Distributed(DistributionReport),
}

impl DistributionOutcome {
    pub fn assigned(&self) -> usize {
        match self {
            Self::Distributed(report) => report.assigned,
            _ => 0,
        }
    }
}

#[async_trait]
pub trait DistributionEngine: Send + Sync {
    async fn distribute_pending_batch(
        &self,
        category: ShipmentCategory,
    ) -> Result<DistributionOutcome, DispatchError>;
}

pub struct StandardDistributionEngine {
    shipments: Arc<dyn ShipmentRepository>,
    agents: Arc<dyn AgentRepository>,
    presence: PresenceRegistry,
    policy: Arc<dyn AssignmentPolicy>,
}

impl StandardDistributionEngine {
    pub fn new(
        shipments: Arc<dyn ShipmentRepository>,
        agents: Arc<dyn AgentRepository>,
        presence: PresenceRegistry,
    ) -> Self {
        Self::with_policy(shipments, agents, presence, Arc::new(RoundRobinPolicy))
    }

    pub fn with_policy(
        shipments: Arc<dyn ShipmentRepository>,
        agents: Arc<dyn AgentRepository>,
        presence: PresenceRegistry,
        policy: Arc<dyn AssignmentPolicy>,
    ) -> Self {
        Self {
            shipments,
            agents,
            presence,
            policy,
        }
    }

    async fn run(&self, category: ShipmentCategory) -> Result<DistributionOutcome, DispatchError> {
        let pending = self
            .shipments
            .find_by_filter(&ShipmentFilter::pending(category))
            .await?;
        if pending.is_empty() {
            info!(category = %category, "No pending shipments to distribute");
            return Ok(DistributionOutcome::NothingToDistribute { category });
        }

        let agents = self.agents.find_available(&AgentFilter::dispatchable()).await?;
        if agents.is_empty() {
            info!(category = %category, pending = pending.len(), "No agents available for distribution");
            return Ok(DistributionOutcome::NoAgentsAvailable {
                category,
                pending: pending.len(),
            });
        }

        let plan = self.policy.plan(&pending, &agents);
        debug!(
            category = %category,
            policy = self.policy.name(),
            shipments = pending.len(),
            agents = agents.len(),
            "Distribution planned"
        );

        let mut applied = Vec::with_capacity(plan.len());
        let mut skipped = 0usize;
        for assignment in plan {
            let won = match self
                .shipments
                .conditional_assign(
                    &assignment.shipment_id,
                    ShipmentStatus::OutForDelivery,
                    &assignment.agent_id,
                    ShipmentStatus::Pending,
                )
                .await
            {
                Ok(won) => won,
                Err(e) => {
                    metrics::counter!("courier_distribution_assigned_total").increment(applied.len() as u64);
                    warn!(
                        category = %category,
                        shipment_id = %assignment.shipment_id,
                        committed = applied.len(),
                        skipped,
                        error = %e,
                        "Distribution stopped partway, committed assignments stand"
                    );
                    return Err(e.into());
                }
            };

            if won {
                self.notify_assigned(&assignment);
                applied.push(assignment);
            } else {
                debug!(shipment_id = %assignment.shipment_id, "Shipment taken since snapshot, skipping");
                skipped += 1;
            }
        }

        let agents_used = applied
            .iter()
            .map(|a| &a.agent_id)
            .collect::<BTreeSet<_>>()
            .len();

        Ok(DistributionOutcome::Distributed(DistributionReport {
            category,
            assigned: applied.len(),
            skipped,
            agents_used,
            assignments: applied,
        }))
    }

    fn notify_assigned(&self, assignment: &Assignment) {
        let notification = AgentNotification::NewAssignment {
            shipment_id: assignment.shipment_id.clone(),
        };
        if let Err(e) = self.presence.send_to(&assignment.agent_id, notification) {
            warn!(
                agent_id = %assignment.agent_id,
                shipment_id = %assignment.shipment_id,
                error = %e,
                "Assignment notice not delivered"
            );
        }
    }
}

#[async_trait]
impl DistributionEngine for StandardDistributionEngine {
    async fn distribute_pending_batch(
        &self,
        category: ShipmentCategory,
    ) -> Result<DistributionOutcome, DispatchError> {
        let outcome = self.run(category).await.map_err(|e| {
            error!(category = %category, error = %e, "Distribution batch failed");
            e
        })?;

        if let DistributionOutcome::Distributed(report) = &outcome {
            metrics::counter!("courier_distribution_assigned_total").increment(report.assigned as u64);
            metrics::counter!("courier_distribution_skipped_total").increment(report.skipped as u64);
            info!(
                category = %category,
                assigned = report.assigned,
                skipped = report.skipped,
                agents_used = report.agents_used,
                "Distribution batch complete"
            );
        }

        Ok(outcome)
    }
}
