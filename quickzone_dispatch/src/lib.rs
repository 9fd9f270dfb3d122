// Copyright 2025 the QuickZone Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-tick enter/exit diffing and callback dispatch.
//!
//! This crate owns the Dispatcher step of the containment engine: once the
//! Scheduler has decided which entity to poll this tick and the containment
//! query has returned the set of zones that currently contain it, [`dispatch`]
//! walks the entity's subscribed observers and applies each one's resulting
//! enter/exit transition via [`quickzone_observer::Observer`].
//!
//! It does not perform the containment query itself, and it does not decide
//! which entities to poll or in what order — those are the ZoneStore's and
//! Scheduler's jobs, respectively. This crate only consumes their output.

pub mod dispatch;

pub use dispatch::{dispatch_entity, DispatchSummary};
