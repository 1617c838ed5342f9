// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent realtime channel over WebSocket.
//!
//! One socket per agent. On upgrade the connection is registered with the
//! presence registry and joins the agent's inbox group. A writer task drains
//! the agent's bounded channel into the socket; the reader parses inbound
//! frames and hands `attempt_claim` to the claim arbitrator. Claim results
//! reach the agent through the registry, not as a direct reply.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::agent::AgentId;
use crate::domain::error::DispatchError;
use crate::domain::events::{AgentNotification, InboundMessage};
use crate::infrastructure::presence::AgentChannel;
use crate::presentation::api::{ApiError, AppState};

/// Presence group every agent joins for direct addressing
pub fn inbox_group(agent_id: &AgentId) -> String {
    format!("inbox:{}", agent_id)
}

/// `GET /ws/agents/{agent_id}`
///
/// The agent must exist and have an active account. Those checks run before
/// the upgrade is inspected, so a plain request still gets 404/403.
pub async fn agent_socket(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let agent_id = AgentId::new(agent_id);

    let agent = state
        .agents
        .find_by_id(&agent_id)
        .await
        .map_err(DispatchError::from)?
        .ok_or_else(|| DispatchError::NotFound(format!("agent {}", agent_id)))?;

    if !agent.is_active() {
        warn!(agent_id = %agent_id, account_status = agent.account_status.as_str(), "Refusing channel for inactive account");
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "account_inactive",
            format!("agent {} account is {}", agent_id, agent.account_status.as_str()),
        ));
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    Ok(ws.on_upgrade(move |socket| run_session(socket, state, agent_id)))
}

async fn run_session(socket: WebSocket, state: Arc<AppState>, agent_id: AgentId) {
    let (channel, mut outbound) = state.presence.open_channel();
    let replies = channel.clone();
    let connection_id = state
        .presence
        .register_with_groups(agent_id.clone(), channel, [inbox_group(&agent_id)]);
    info!(agent_id = %agent_id, connection_id = %connection_id, "Agent channel opened");

    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(notification) = outbound.recv().await {
            let text = match notification.to_json() {
                Ok(text) => text,
                Err(e) => {
                    warn!(event = notification.event_name(), error = %e, "Failed to encode notification");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let reader_state = state.clone();
    let reader_agent = agent_id.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    handle_frame(&reader_state, &reader_agent, &replies, text.as_str()).await;
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(agent_id = %reader_agent, error = %e, "Socket read failed");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    let removed = state.presence.unregister_connection(&agent_id, connection_id);
    info!(agent_id = %agent_id, connection_id = %connection_id, superseded = !removed, "Agent channel closed");
}

async fn handle_frame(state: &AppState, agent_id: &AgentId, replies: &AgentChannel, text: &str) {
    let message = match InboundMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            debug!(agent_id = %agent_id, error = %e, "Malformed inbound frame");
            reply_error(replies, agent_id, format!("malformed message: {}", e));
            return;
        }
    };

    match message {
        InboundMessage::AttemptClaim {
            agent_id: claimed_by,
            shipment_id,
        } => {
            if &claimed_by != agent_id {
                warn!(agent_id = %agent_id, claimed_by = %claimed_by, "Claim on behalf of another agent rejected");
                reply_error(replies, agent_id, "agentId does not match this connection".to_string());
                return;
            }

            if let Err(e) = state.claims.attempt_claim(agent_id, &shipment_id).await {
                reply_error(replies, agent_id, e.to_string());
            }
        }
    }
}

fn reply_error(replies: &AgentChannel, agent_id: &AgentId, message: String) {
    if let Err(e) = replies.try_send(agent_id, AgentNotification::Error { message }) {
        warn!(agent_id = %agent_id, error = %e, "Error reply not delivered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repository_factory::Repositories;
    use crate::domain::agent::Agent;
    use crate::domain::shipment::{Shipment, ShipmentCategory, ShipmentId};
    use crate::infrastructure::presence::PresenceRegistry;

    async fn session(agent: &str) -> (Arc<AppState>, AgentChannel, crate::infrastructure::presence::AgentReceiver) {
        let repos = Repositories::in_memory();
        repos.agents.save(&Agent::new(agent, agent)).await.unwrap();
        repos
            .shipments
            .save(&Shipment::new("TRK-1", ShipmentCategory::Land))
            .await
            .unwrap();
        let state = Arc::new(AppState::new(repos, PresenceRegistry::new(8)));

        let (channel, rx) = state.presence.open_channel();
        state.presence.register(AgentId::new(agent), channel.clone());
        (state, channel, rx)
    }

    #[tokio::test]
    async fn test_malformed_frame_gets_error_reply() {
        let (state, replies, mut rx) = session("D1").await;
        handle_frame(&state, &AgentId::new("D1"), &replies, "{not json").await;

        assert!(matches!(rx.recv().await, Some(AgentNotification::Error { .. })));
    }

    #[tokio::test]
    async fn test_claim_for_other_agent_is_refused() {
        let (state, replies, mut rx) = session("D1").await;
        let frame = r#"{"event":"attempt_claim","data":{"agentId":"D2","shipmentId":"TRK-1"}}"#;
        handle_frame(&state, &AgentId::new("D1"), &replies, frame).await;

        assert!(matches!(rx.recv().await, Some(AgentNotification::Error { .. })));
        let shipment = state.shipments.find_by_id(&ShipmentId::new("TRK-1")).await.unwrap().unwrap();
        assert!(shipment.is_claimable());
    }

    #[tokio::test]
    async fn test_claim_frame_reaches_arbitrator() {
        let (state, replies, mut rx) = session("D1").await;
        let frame = r#"{"event":"attempt_claim","data":{"agentId":"D1","shipmentId":"TRK-1"}}"#;
        handle_frame(&state, &AgentId::new("D1"), &replies, frame).await;

        assert_eq!(
            rx.recv().await,
            Some(AgentNotification::ClaimGranted {
                shipment_id: ShipmentId::new("TRK-1")
            })
        );
    }

    #[test]
    fn test_inbox_group_name() {
        assert_eq!(inbox_group(&AgentId::new("D7")), "inbox:D7");
    }
}
