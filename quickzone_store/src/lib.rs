// Copyright 2025 the QuickZone Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Zone records and the spatial partition that backs containment queries.
//!
//! A [`ZoneStore`] owns every [`Zone`] and keeps two [`quickzone_lbvh::Lbvh`] trees
//! over their AABBs: one for zones created as static (immutable after creation) and
//! one for zones created as dynamic (mutable transform/extents). Mutations are
//! staged in the underlying trees and only take effect on [`ZoneStore::flush`],
//! which is expected to run once per tick ahead of scheduling.
//!
//! [`ZoneId`] is a generational handle: destroying a zone frees its slot for reuse
//! but bumps the generation, so a stale id never resolves to whatever gets
//! allocated into that slot afterward.

mod error;
mod store;
mod zone;

pub use error::StoreError;
pub use store::{FlushReport, ZoneStore};
pub use zone::{ObserverId, Zone, ZoneId};
