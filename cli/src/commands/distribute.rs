// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Operator trigger for batch distribution

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use courier_core::application::distribution::DistributionOutcome;
use courier_core::domain::config::DispatchConfigManifest;
use courier_core::domain::shipment::ShipmentCategory;

use crate::client::DispatchClient;

#[derive(Args)]
pub struct DistributeArgs {
    /// Shipment category to distribute (land, air, sea)
    #[arg(long, value_parser = parse_category)]
    pub category: ShipmentCategory,

    /// Print the raw JSON outcome
    #[arg(long)]
    pub json: bool,
}

fn parse_category(value: &str) -> Result<ShipmentCategory, String> {
    value.parse()
}

pub async fn handle_command(
    args: DistributeArgs,
    config_path: Option<PathBuf>,
    host: &str,
    port: Option<u16>,
) -> Result<()> {
    let port = match port {
        Some(port) => port,
        None => {
            DispatchConfigManifest::load_or_default(config_path)
                .context("Failed to load configuration")?
                .spec
                .server
                .port
        }
    };

    let client = DispatchClient::new(host, port)?;
    let health = client.health().await?;
    tracing::debug!(uptime_seconds = health.uptime_seconds, connected_agents = health.connected_agents, "Dispatch server healthy");
    let outcome = client
        .distribute(args.category)
        .await
        .with_context(|| format!("Distribution via {} failed", client.base_url()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &DistributionOutcome) {
    match outcome {
        DistributionOutcome::NothingToDistribute { category } => {
            println!("{}", format!("No pending {} shipments", category).yellow());
        }
        DistributionOutcome::NoAgentsAvailable { category, pending } => {
            println!(
                "{}",
                format!("{} pending {} shipments, but no agents are available", pending, category).yellow()
            );
        }
        DistributionOutcome::Distributed(report) => {
            println!(
                "{}",
                format!(
                    "✓ Assigned {} {} shipments to {} agents",
                    report.assigned, report.category, report.agents_used
                )
                .green()
            );
            if report.skipped > 0 {
                println!(
                    "  {}",
                    format!("{} skipped (claimed during the batch)", report.skipped).dimmed()
                );
            }
            for assignment in &report.assignments {
                println!("  {} → {}", assignment.shipment_id, assignment.agent_id.to_string().bold());
            }
        }
    }
}
