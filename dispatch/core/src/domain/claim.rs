// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::domain::agent::AgentId;
use crate::domain::shipment::ShipmentId;

/// A single claim attempt. Lives for the duration of one arbitration call.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimAttempt {
    pub agent_id: AgentId,
    pub shipment_id: ShipmentId,
    pub attempted_at: DateTime<Utc>,
}

impl ClaimAttempt {
    pub fn new(agent_id: AgentId, shipment_id: ShipmentId) -> Self {
        Self {
            agent_id,
            shipment_id,
            attempted_at: Utc::now(),
        }
    }
}

/// Why a claim was refused. Never names the winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    AlreadyTaken,
    NotFound,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyTaken => "already_taken",
            Self::NotFound => "not_found",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClaimOutcome {
    Granted { shipment_id: ShipmentId },
    Denied { shipment_id: ShipmentId, reason: DenialReason },
}

impl ClaimOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }

    pub fn shipment_id(&self) -> &ShipmentId {
        match self {
            Self::Granted { shipment_id } | Self::Denied { shipment_id, .. } => shipment_id,
        }
    }

    /// Label used for the outcome metric
    pub fn label(&self) -> &'static str {
        match self {
            Self::Granted { .. } => "granted",
            Self::Denied { reason, .. } => reason.as_str(),
        }
    }
}
