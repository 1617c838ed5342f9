// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP client for the dispatch server's operator API

use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use courier_core::application::distribution::DistributionOutcome;
use courier_core::domain::shipment::ShipmentCategory;

/// Error body returned by the server
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Server returned {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct DispatchClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub uptime_seconds: u64,
    pub connected_agents: usize,
}

impl DispatchClient {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url(host, port),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .with_context(|| format!("Dispatch server not reachable at {}", self.base_url))?;
        parse(response).await
    }

    pub async fn distribute(&self, category: ShipmentCategory) -> Result<DistributionOutcome> {
        #[derive(Serialize)]
        struct DistributeRequest {
            category: ShipmentCategory,
        }

        let response = self
            .client
            .post(format!("{}/api/distribution", self.base_url))
            .json(&DistributeRequest { category })
            .send()
            .await
            .context("Failed to request distribution")?;
        parse(response).await
    }
}

fn base_url(host: &str, port: u16) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}:{}", host.trim_end_matches('/'), port)
    } else {
        format!("http://{}:{}", host, port)
    }
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => (body.code, body.error),
            Err(_) => ("unknown".to_string(), text),
        };
        return Err(ClientError::Api {
            status: status.as_u16(),
            code,
            message,
        }
        .into());
    }

    response.json::<T>().await.context("Failed to parse server response")
}
