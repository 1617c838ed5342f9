// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the courier CLI

pub mod config;
pub mod distribute;

pub use self::config::ConfigCommand;
pub use self::distribute::DistributeArgs;
