// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Dispatch Application Layer
//!
//! Use cases over the domain model. Services are trait objects
//! (`Arc<dyn ClaimArbitrator>`, `Arc<dyn DistributionEngine>`) so the
//! presentation layer and tests can swap implementations.
//!
//! | Module | Service |
//! |--------|---------|
//! | [`arbitration`] | `ClaimArbitrator` / `StandardClaimArbitrator` |
//! | [`distribution`] | `DistributionEngine` / `StandardDistributionEngine`, `AssignmentPolicy` |
//! | [`repository_factory`] | backend selection, `Repositories` |
//! | [`seed`] | startup seed file |

pub mod arbitration;
pub mod distribution;
pub mod repository_factory;
pub mod seed;
