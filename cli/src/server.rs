// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Dispatch server bootstrap
//!
//! Handles:
//! - Record store selection, migrations and seed data
//! - Prometheus exporter
//! - HTTP + WebSocket listener
//! - Graceful shutdown

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use courier_core::application::repository_factory::Repositories;
use courier_core::application::seed::SeedFile;
use courier_core::domain::config::{DispatchConfigManifest, MetricsConfig};
use courier_core::infrastructure::presence::PresenceRegistry;
use courier_core::presentation::api::{app, AppState};

pub async fn start_server(mut config: DispatchConfigManifest, port_override: Option<u16>) -> Result<()> {
    if let Some(port) = port_override {
        config.spec.server.port = port;
    }

    config.validate().context("Configuration validation failed")?;

    info!(
        name = %config.metadata.name,
        backend = ?config.spec.storage.backend,
        "Courier dispatch starting"
    );

    if config.spec.observability.metrics.enabled {
        init_metrics(&config.spec.server.bind_address, &config.spec.observability.metrics)?;
    }

    let repos = Repositories::from_config(&config.spec.storage)
        .await
        .context("Failed to initialize record store")?;

    if let Some(seed_path) = &config.spec.storage.seed_path {
        let summary = SeedFile::from_yaml_file(seed_path)?
            .apply(&repos)
            .await
            .context("Failed to apply seed data")?;
        info!(
            agents = summary.agents,
            shipments = summary.shipments,
            existing = summary.existing,
            "Seeded record store"
        );
    }

    let presence = PresenceRegistry::new(config.spec.presence.channel_capacity);
    let state = Arc::new(AppState::new(repos, presence));
    let router = app(state);

    let addr = format!("{}:{}", config.spec.server.bind_address, config.spec.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Dispatch server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Dispatch server shutting down");

    Ok(())
}

fn init_metrics(bind_address: &str, metrics: &MetricsConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", bind_address, metrics.port)
        .parse()
        .with_context(|| format!("Invalid metrics listen address {}:{}", bind_address, metrics.port))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!("Prometheus metrics exposed on {}", addr);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
