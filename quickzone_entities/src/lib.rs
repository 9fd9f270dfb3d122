// Copyright 2025 the QuickZone Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-group entity storage, the movement filter, and update-rate scheduling.
//!
//! A [`Group`] holds a homogeneously-scheduled set of entities as parallel
//! component arrays (handle, position probe, metadata, last known position),
//! with O(1) add/remove via swap-with-last. Each tick, [`Group::begin_tick`]
//! recomputes a quota from the group's update rate and the elapsed time, and
//! [`Group::poll_one`] hands out entity indices in round-robin order until the
//! quota (or the caller's own budget) runs out.

mod error;
mod group;

pub use error::EntitiesError;
pub use group::{Group, GroupId, Probe};
