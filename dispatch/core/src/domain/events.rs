// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Realtime channel messages exchanged with connected agents.
//!
//! Every frame is JSON of the form `{"event": "<name>", "data": {...}}`
//! with camelCase payload fields.

use serde::{Deserialize, Serialize};
use crate::domain::agent::AgentId;
use crate::domain::claim::{ClaimOutcome, DenialReason};
use crate::domain::shipment::ShipmentId;

/// Server -> agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum AgentNotification {
    /// Sent to the winner of a claim
    ClaimGranted { shipment_id: ShipmentId },
    /// Sent to the requester only
    ClaimDenied {
        shipment_id: ShipmentId,
        reason: DenialReason,
    },
    /// Sent to every other connected agent after a successful claim
    ShipmentClaimed { shipment_id: ShipmentId },
    /// Batch distribution assigned this shipment to the recipient
    NewAssignment { shipment_id: ShipmentId },
    /// Operator notice for everybody
    Notice { message: String },
    /// Malformed or rejected inbound frame
    Error { message: String },
}

impl AgentNotification {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::ClaimGranted { .. } => "claim_granted",
            Self::ClaimDenied { .. } => "claim_denied",
            Self::ShipmentClaimed { .. } => "shipment_claimed",
            Self::NewAssignment { .. } => "new_assignment",
            Self::Notice { .. } => "notice",
            Self::Error { .. } => "error",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<&ClaimOutcome> for AgentNotification {
    fn from(outcome: &ClaimOutcome) -> Self {
        match outcome {
            ClaimOutcome::Granted { shipment_id } => Self::ClaimGranted {
                shipment_id: shipment_id.clone(),
            },
            ClaimOutcome::Denied { shipment_id, reason } => Self::ClaimDenied {
                shipment_id: shipment_id.clone(),
                reason: *reason,
            },
        }
    }
}

/// Agent -> server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum InboundMessage {
    AttemptClaim {
        agent_id: AgentId,
        shipment_id: ShipmentId,
    },
}

impl InboundMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notification_wire_shape() {
        let denied = AgentNotification::ClaimDenied {
            shipment_id: ShipmentId::new("TRK-1"),
            reason: DenialReason::AlreadyTaken,
        };
        let value = serde_json::to_value(&denied).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "claim_denied",
                "data": { "shipmentId": "TRK-1", "reason": "already_taken" }
            })
        );
        assert_eq!(denied.event_name(), "claim_denied");

        let claimed = AgentNotification::ShipmentClaimed {
            shipment_id: ShipmentId::new("TRK-9"),
        };
        assert_eq!(
            serde_json::to_value(&claimed).unwrap(),
            json!({ "event": "shipment_claimed", "data": { "shipmentId": "TRK-9" } })
        );
    }

    #[test]
    fn test_parse_attempt_claim() {
        let msg = InboundMessage::parse(
            r#"{"event":"attempt_claim","data":{"agentId":"D1","shipmentId":"TRK-1"}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            InboundMessage::AttemptClaim {
                agent_id: AgentId::new("D1"),
                shipment_id: ShipmentId::new("TRK-1"),
            }
        );

        assert!(InboundMessage::parse(r#"{"event":"cancel_claim","data":{}}"#).is_err());
        assert!(InboundMessage::parse("not json").is_err());
    }

    #[test]
    fn test_outcome_to_notification() {
        let outcome = ClaimOutcome::Granted {
            shipment_id: ShipmentId::new("TRK-2"),
        };
        assert_eq!(
            AgentNotification::from(&outcome),
            AgentNotification::ClaimGranted {
                shipment_id: ShipmentId::new("TRK-2")
            }
        );
    }
}
