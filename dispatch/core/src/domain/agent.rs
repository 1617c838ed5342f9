// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Delivery agent identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Self-reported availability, written by the agent app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentAvailability {
    Available,
    Busy,
    Offline,
}

impl AgentAvailability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Busy => "busy",
            Self::Offline => "offline",
        }
    }
}

impl FromStr for AgentAvailability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "busy" => Ok(Self::Busy),
            "offline" => Ok(Self::Offline),
            other => Err(format!("unknown agent availability '{}'", other)),
        }
    }
}

/// Account review state. New drivers start in `PendingReview` until an
/// administrator approves them; `Frozen` accounts are disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    PendingReview,
    Frozen,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::PendingReview => "pending_review",
            Self::Frozen => "frozen",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "pending_review" => Ok(Self::PendingReview),
            "frozen" => Ok(Self::Frozen),
            other => Err(format!("unknown account status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub availability: AgentAvailability,
    pub account_status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// Approved, available agent
    pub fn new(id: impl Into<AgentId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            availability: AgentAvailability::Available,
            account_status: AccountStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn with_availability(mut self, availability: AgentAvailability) -> Self {
        self.availability = availability;
        self
    }

    pub fn with_account_status(mut self, status: AccountStatus) -> Self {
        self.account_status = status;
        self
    }

    /// Whether the account may open a realtime channel
    pub fn is_active(&self) -> bool {
        self.account_status == AccountStatus::Active
    }

    /// Eligible for batch distribution
    pub fn is_dispatchable(&self) -> bool {
        self.is_active() && self.availability == AgentAvailability::Available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatchable_requires_active_and_available() {
        let agent = Agent::new("D1", "Driver One");
        assert!(agent.is_dispatchable());

        let busy = agent.clone().with_availability(AgentAvailability::Busy);
        assert!(!busy.is_dispatchable());
        assert!(busy.is_active());

        let frozen = agent.clone().with_account_status(AccountStatus::Frozen);
        assert!(!frozen.is_dispatchable());

        let pending = agent.with_account_status(AccountStatus::PendingReview);
        assert!(!pending.is_active());
    }
}
