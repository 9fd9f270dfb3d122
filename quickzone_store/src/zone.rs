// Copyright 2025 the QuickZone Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Zone records and the generational ids that name them.

use core::any::Any;

use quickzone_geometry::{Aabb3, Extents, Shape, Transform};

/// A generational zone handle: `(slot index, generation, creation order)`.
/// Destroying a zone bumps its slot's generation, so a stale `ZoneId` is never
/// silently confused with whatever gets allocated into that slot afterward —
/// the id itself is never reused, even though the underlying slot index may be.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ZoneId(pub(crate) u32, pub(crate) u32, pub(crate) u64);

impl ZoneId {
    /// The slot index backing this id. Not a stable ordering key across zone
    /// churn — a destroyed zone's slot can be handed to a later `create`, which
    /// is why ordering code reaches for [`creation_order`](Self::creation_order)
    /// instead.
    #[inline]
    pub fn slot(&self) -> u32 {
        self.0
    }

    /// Monotonically increasing per-store counter stamped at creation, never
    /// reused even after the backing slot is freed and recycled. This is what
    /// "ascending zone id" ordering (the priority tie-break in `Observer`)
    /// actually orders by.
    #[inline]
    pub fn creation_order(&self) -> u64 {
        self.2
    }
}

/// An opaque observer id, as tracked from the zone side for attachment cleanup on
/// destroy. [`quickzone_observer`] is the crate that gives this value meaning.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub u32);

/// A closed convex volume tracked by a [`crate::ZoneStore`].
#[derive(Debug)]
pub struct Zone {
    pub(crate) generation: u32,
    pub(crate) creation_order: u64,
    /// Which of the four convex primitives this zone is.
    pub shape: Shape,
    /// World-space origin and orientation.
    pub transform: Transform,
    /// Per-axis half-extents.
    pub extents: Extents,
    /// Whether this zone's transform/extents may change after creation.
    pub is_dynamic: bool,
    /// Conservative world-space AABB, recomputed whenever `transform`/`extents` change.
    pub aabb: Aabb3,
    /// Opaque host payload; the engine never inspects it.
    pub metadata: Option<Box<dyn Any + Send>>,
}

impl Zone {
    pub(crate) fn recompute_aabb(&mut self) {
        self.aabb = quickzone_geometry::aabb_of(self.shape, &self.transform, self.extents);
    }
}
