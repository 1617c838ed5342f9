// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod presence;
pub mod repositories;
pub mod db;

pub use presence::{AgentChannel, AgentReceiver, ConnectionId, DeliveryError, DeliveryReport, PresenceRegistry};
