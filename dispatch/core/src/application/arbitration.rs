// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Claim Arbitration
//!
//! Resolves concurrent claims on a pending shipment to exactly one winner.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** `Pending -> OutForDelivery` transition on agent request
//!
//! The arbitrator holds no lock. Each attempt is a single conditional update
//! against the record store; the store orders concurrent attempts on the same
//! row. The existence lookup only runs after the update has been refused, to
//! tell "already taken" from "no such shipment".

use crate::domain::agent::AgentId;
use crate::domain::claim::{ClaimAttempt, ClaimOutcome, DenialReason};
use crate::domain::error::DispatchError;
use crate::domain::events::AgentNotification;
use crate::domain::repository::ShipmentRepository;
use crate::domain::shipment::{ShipmentId, ShipmentStatus};
use crate::infrastructure::presence::PresenceRegistry;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[async_trait]
pub trait ClaimArbitrator: Send + Sync {
    /// Try to make `agent_id` the assignee of `shipment_id`.
    ///
    /// Expected refusals come back as `ClaimOutcome::Denied`; `Err` means the
    /// caller is not connected or the record store failed.
    async fn attempt_claim(
        &self,
        agent_id: &AgentId,
        shipment_id: &ShipmentId,
    ) -> Result<ClaimOutcome, DispatchError>;
}

pub struct StandardClaimArbitrator {
    shipments: Arc<dyn ShipmentRepository>,
    presence: PresenceRegistry,
}

impl StandardClaimArbitrator {
    pub fn new(shipments: Arc<dyn ShipmentRepository>, presence: PresenceRegistry) -> Self {
        Self { shipments, presence }
    }

    async fn resolve(&self, attempt: &ClaimAttempt) -> Result<ClaimOutcome, DispatchError> {
        let applied = self
            .shipments
            .conditional_assign(
                &attempt.shipment_id,
                ShipmentStatus::OutForDelivery,
                &attempt.agent_id,
                ShipmentStatus::Pending,
            )
            .await?;

        if applied {
            return Ok(ClaimOutcome::Granted {
                shipment_id: attempt.shipment_id.clone(),
            });
        }

        let reason = match self.shipments.find_by_id(&attempt.shipment_id).await? {
            Some(_) => DenialReason::AlreadyTaken,
            None => DenialReason::NotFound,
        };
        Ok(ClaimOutcome::Denied {
            shipment_id: attempt.shipment_id.clone(),
            reason,
        })
    }

    fn notify(&self, attempt: &ClaimAttempt, outcome: &ClaimOutcome) {
        if let Err(e) = self.presence.send_to(&attempt.agent_id, AgentNotification::from(outcome)) {
            warn!(agent_id = %attempt.agent_id, error = %e, "Claim result not delivered to requester");
        }

        if outcome.is_granted() {
            let report = self.presence.broadcast_except(
                &attempt.agent_id,
                AgentNotification::ShipmentClaimed {
                    shipment_id: attempt.shipment_id.clone(),
                },
            );
            debug!(
                shipment_id = %attempt.shipment_id,
                delivered = report.delivered,
                failed = report.failed,
                "Retraction broadcast"
            );
        }
    }
}

#[async_trait]
impl ClaimArbitrator for StandardClaimArbitrator {
    async fn attempt_claim(
        &self,
        agent_id: &AgentId,
        shipment_id: &ShipmentId,
    ) -> Result<ClaimOutcome, DispatchError> {
        if !self.presence.is_connected(agent_id) {
            return Err(DispatchError::AgentNotConnected(agent_id.clone()));
        }

        let attempt = ClaimAttempt::new(agent_id.clone(), shipment_id.clone());

        let outcome = match self.resolve(&attempt).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(agent_id = %agent_id, shipment_id = %shipment_id, error = %e, "Claim attempt failed");
                metrics::counter!("courier_claims_total", "outcome" => "store_error").increment(1);
                return Err(e);
            }
        };

        self.notify(&attempt, &outcome);

        metrics::counter!("courier_claims_total", "outcome" => outcome.label()).increment(1);
        info!(
            agent_id = %agent_id,
            shipment_id = %shipment_id,
            outcome = outcome.label(),
            elapsed_ms = (Utc::now() - attempt.attempted_at).num_milliseconds(),
            "Claim resolved"
        );

        Ok(outcome)
    }
}
