// Copyright 2025 the QuickZone Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame-budgeted round-robin scheduling across groups.
//!
//! [`Scheduler::tick`] runs a caller-supplied flush step (never interrupted by
//! the budget), then round-robins one entity at a time across groups — via
//! [`TickGroups`], implemented by the facade over its group table — until
//! either every group's quota for the tick is spent or the wall-clock budget
//! elapses. [`GroupRotor`] is the underlying loose-round-robin cursor, kept
//! separate so it can be tested without a real clock.

mod rotor;
mod scheduler;

pub use rotor::GroupRotor;
pub use scheduler::{Scheduler, TickGroups, TickReport, DEFAULT_BUDGET};
