// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `courier-core`: Shipment Claim Arbitration
//!
//! Decides which delivery agent gets a pending shipment when several agents
//! race for it over realtime connections, and spreads unclaimed shipments
//! across available agents on operator request.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | shipments, agents, claim outcomes, wire messages, record store traits, config |
//! | [`application`] | Application | `ClaimArbitrator`, `DistributionEngine`, repository factory, seed data |
//! | [`infrastructure`] | Infrastructure | `PresenceRegistry`, in-memory and PostgreSQL repositories, pool |
//! | [`presentation`] | Presentation | axum HTTP + WebSocket surface |
//!
//! ## Consistency
//!
//! Every write to a shipment goes through one conditional update
//! (`status = OutForDelivery WHERE status = Pending`). The core takes no
//! locks of its own; see [`domain::repository`].

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
