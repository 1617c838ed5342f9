// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use crate::domain::agent::AgentId;

/// Opaque shipment identifier (tracking number, e.g. `TRK-1`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShipmentId(pub String);

impl ShipmentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ShipmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShipmentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Shipment lifecycle.
///
/// `Pending -> OutForDelivery -> (Delivered | Returned | Cancelled)`.
/// Only the first edge is contested between agents; the rest are
/// administrative and single-writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Pending,
    OutForDelivery,
    Delivered,
    Returned,
    Cancelled,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Returned => "returned",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, next: ShipmentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::OutForDelivery)
                | (Self::OutForDelivery, Self::Delivered)
                | (Self::OutForDelivery, Self::Returned)
                | (Self::OutForDelivery, Self::Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Returned | Self::Cancelled)
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "out_for_delivery" => Ok(Self::OutForDelivery),
            "delivered" => Ok(Self::Delivered),
            "returned" => Ok(Self::Returned),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown shipment status '{}'", other)),
        }
    }
}

/// Delivery method used to pick distribution candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipmentCategory {
    Land,
    Air,
    Sea,
}

impl ShipmentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Land => "land",
            Self::Air => "air",
            Self::Sea => "sea",
        }
    }
}

impl std::fmt::Display for ShipmentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipmentCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "land" => Ok(Self::Land),
            "air" => Ok(Self::Air),
            "sea" => Ok(Self::Sea),
            other => Err(format!("unknown shipment category '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub status: ShipmentStatus,
    /// Set once by the claim arbitrator or the distribution engine, never overwritten
    pub assigned_agent: Option<AgentId>,
    pub category: ShipmentCategory,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    /// New shipment as handed over by order intake
    pub fn new(id: impl Into<ShipmentId>, category: ShipmentCategory) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: ShipmentStatus::Pending,
            assigned_agent: None,
            category,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_claimable(&self) -> bool {
        self.status == ShipmentStatus::Pending
    }
}

impl From<String> for ShipmentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
