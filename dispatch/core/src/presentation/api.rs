// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HTTP surface of the dispatch core.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `GET /health` | liveness + uptime |
//! | `GET /ws/agents/{agent_id}` | agent realtime channel, see [`super::ws`] |
//! | `POST /api/distribution` | operator-triggered batch distribution |
//! | `GET /api/shipments/{id}` | current shipment state |
//! | `POST /api/shipments/{id}/claim` | claim on behalf of a connected agent |
//! | `POST /api/notices` | notice to every connected agent, or to one |
//! | `GET /api/presence` | connected agent ids |

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::application::arbitration::{ClaimArbitrator, StandardClaimArbitrator};
use crate::application::distribution::{DistributionEngine, DistributionOutcome, StandardDistributionEngine};
use crate::application::repository_factory::Repositories;
use crate::domain::agent::AgentId;
use crate::domain::claim::{ClaimOutcome, DenialReason};
use crate::domain::error::DispatchError;
use crate::domain::events::AgentNotification;
use crate::domain::repository::{AgentRepository, ShipmentRepository};
use crate::domain::shipment::{Shipment, ShipmentCategory, ShipmentId};
use crate::infrastructure::presence::PresenceRegistry;
use crate::presentation::ws;

pub struct AppState {
    pub claims: Arc<dyn ClaimArbitrator>,
    pub distribution: Arc<dyn DistributionEngine>,
    pub shipments: Arc<dyn ShipmentRepository>,
    pub agents: Arc<dyn AgentRepository>,
    pub presence: PresenceRegistry,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the standard services over one set of repositories
    pub fn new(repos: Repositories, presence: PresenceRegistry) -> Self {
        let claims = Arc::new(StandardClaimArbitrator::new(repos.shipments.clone(), presence.clone()));
        let distribution = Arc::new(StandardDistributionEngine::new(
            repos.shipments.clone(),
            repos.agents.clone(),
            presence.clone(),
        ));

        Self {
            claims,
            distribution,
            shipments: repos.shipments,
            agents: repos.agents,
            presence,
            start_time: Instant::now(),
        }
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws/agents/{agent_id}", get(ws::agent_socket))
        .route("/api/distribution", post(distribute_handler))
        .route("/api/shipments/{id}", get(get_shipment_handler))
        .route("/api/shipments/{id}/claim", post(claim_handler))
        .route("/api/notices", post(notice_handler))
        .route("/api/presence", get(presence_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// API error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: message.into(),
                code: code.to_string(),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        let status = match &err {
            DispatchError::NotFound(_) => StatusCode::NOT_FOUND,
            DispatchError::Conflict(_) => StatusCode::CONFLICT,
            DispatchError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::AgentNotConnected(_) => StatusCode::FORBIDDEN,
            DispatchError::TransportFailure(_) => StatusCode::BAD_GATEWAY,
            DispatchError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.code(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "connected_agents": state.presence.connection_count(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct DistributionRequest {
    pub category: ShipmentCategory,
}

async fn distribute_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DistributionRequest>,
) -> Result<Json<DistributionOutcome>, ApiError> {
    info!(category = %request.category, "Distribution requested");
    let outcome = state.distribution.distribute_pending_batch(request.category).await?;
    Ok(Json(outcome))
}

async fn get_shipment_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Shipment>, ApiError> {
    let id = ShipmentId::new(id);
    let shipment = state
        .shipments
        .find_by_id(&id)
        .await
        .map_err(DispatchError::from)?
        .ok_or_else(|| DispatchError::NotFound(format!("shipment {}", id)))?;
    Ok(Json(shipment))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub agent_id: AgentId,
}

/// Same arbitration as an `attempt_claim` frame. The outcome is also pushed
/// to the agent's channel; refusals come back as 409 / 404.
async fn claim_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ClaimRequest>,
) -> Result<Json<ClaimOutcome>, ApiError> {
    let shipment_id = ShipmentId::new(id);
    let outcome = state.claims.attempt_claim(&request.agent_id, &shipment_id).await?;

    match outcome {
        ClaimOutcome::Granted { .. } => Ok(Json(outcome)),
        ClaimOutcome::Denied {
            reason: DenialReason::AlreadyTaken,
            ..
        } => Err(DispatchError::Conflict(format!("shipment {} already taken", shipment_id)).into()),
        ClaimOutcome::Denied {
            reason: DenialReason::NotFound,
            ..
        } => Err(DispatchError::NotFound(format!("shipment {}", shipment_id)).into()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeRequest {
    pub message: String,
    /// Deliver to this agent only
    #[serde(default)]
    pub agent_id: Option<AgentId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NoticeResponse {
    pub delivered: usize,
    pub failed: usize,
}

async fn notice_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NoticeRequest>,
) -> Result<Json<NoticeResponse>, ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "invalid_request", "message must not be empty"));
    }

    let notice = AgentNotification::Notice {
        message: request.message,
    };

    if let Some(agent_id) = request.agent_id {
        state
            .presence
            .send_to(&agent_id, notice)
            .map_err(DispatchError::from)?;
        return Ok(Json(NoticeResponse {
            delivered: 1,
            failed: 0,
        }));
    }

    let report = state.presence.broadcast(notice);
    Ok(Json(NoticeResponse {
        delivered: report.delivered,
        failed: report.failed,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PresenceResponse {
    pub agents: Vec<AgentId>,
}

async fn presence_handler(State(state): State<Arc<AppState>>) -> Json<PresenceResponse> {
    Json(PresenceResponse {
        agents: state.presence.connected_agents(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repository::RepositoryError;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (DispatchError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (DispatchError::Conflict("x".into()), StatusCode::CONFLICT),
            (DispatchError::Unavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (DispatchError::AgentNotConnected(AgentId::new("D1")), StatusCode::FORBIDDEN),
            (DispatchError::TransportFailure("x".into()), StatusCode::BAD_GATEWAY),
            (
                DispatchError::Store(RepositoryError::Database("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }
}
