// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Dispatch Domain Layer
//!
//! Pure domain types for shipment claiming and distribution. No I/O.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`shipment`] | `Shipment`, `ShipmentId`, `ShipmentStatus`, `ShipmentCategory` |
//! | [`agent`] | `Agent`, `AgentId`, `AgentAvailability`, `AccountStatus` |
//! | [`claim`] | `ClaimAttempt`, `ClaimOutcome`, `DenialReason` |
//! | [`events`] | `AgentNotification`, `InboundMessage` (realtime wire format) |
//! | [`repository`] | `ShipmentRepository`, `AgentRepository` (record store contract) |
//! | [`error`] | `DispatchError` |
//! | [`config`] | `DispatchConfigManifest` |

pub mod agent;
pub mod shipment;
pub mod claim;
pub mod events;
pub mod repository;
pub mod error;
pub mod config;
