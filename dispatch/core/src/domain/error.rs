// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Dispatch error taxonomy.
//!
//! `NotFound`, `Conflict`, `Unavailable` and `TransportFailure` describe
//! expected outcomes of normal operation. The arbitration and distribution
//! services report those through `ClaimOutcome` / `DistributionOutcome`
//! values; the HTTP surface turns a refused claim into `Conflict` or
//! `NotFound`, and an undeliverable targeted notice into `Unavailable` or
//! `TransportFailure` (see `From<DeliveryError>`). Only `Store` is fatal to an
//! individual call.

use crate::domain::agent::AgentId;
use crate::domain::repository::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Agent {0} has no open channel")]
    AgentNotConnected(AgentId),

    #[error("Record store error: {0}")]
    Store(#[from] RepositoryError),
}

impl DispatchError {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Unavailable(_) => "unavailable",
            Self::TransportFailure(_) => "transport_failure",
            Self::AgentNotConnected(_) => "agent_not_connected",
            Self::Store(_) => "store_error",
        }
    }
}
