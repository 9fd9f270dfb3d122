// Copyright 2025 the QuickZone Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Owns all zones, partitions them into static/dynamic LBVHs, and flushes dirty
//! state once per tick ahead of scheduling.

use core::cell::RefCell;

use glam::Vec3;
use hashbrown::HashMap;
use quickzone_geometry::{Extents, Shape, Transform};
use quickzone_lbvh::{BuildAction, Lbvh};
use smallvec::SmallVec;

use crate::error::StoreError;
use crate::zone::{ObserverId, Zone, ZoneId};

/// Result of [`ZoneStore::flush`]: which tree actions were taken, and the ids that
/// were destroyed since the previous flush (queued here so the dispatcher can emit
/// their synthetic exits *before* the corresponding rebuild completes).
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Zones destroyed since the last flush, each paired with the observers that
    /// had it in their attachment set at the moment of destruction.
    pub destroyed: Vec<(ZoneId, SmallVec<[ObserverId; 4]>)>,
    /// Action taken on the static tree.
    pub static_action: BuildAction,
    /// Action taken on the dynamic tree.
    pub dynamic_action: BuildAction,
}

impl FlushReport {
    /// Whether either tree actually rebuilt its topology this flush. The movement
    /// filter must be bypassed for entities under a tree that rebuilt.
    pub fn any_rebuild(&self) -> bool {
        self.static_action == BuildAction::Rebuild || self.dynamic_action == BuildAction::Rebuild
    }
}

struct Slot {
    generation: u32,
    zone: Option<Zone>,
}

/// Owns every zone and the dual static/dynamic LBVH partition over their AABBs.
#[derive(Debug)]
pub struct ZoneStore {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    attached_observers: HashMap<ZoneId, SmallVec<[ObserverId; 4]>>,
    pending_destroyed: Vec<(ZoneId, SmallVec<[ObserverId; 4]>)>,
    static_tree: Lbvh,
    dynamic_tree: Lbvh,
    next_creation_order: u64,
    stab_scratch: RefCell<Vec<u32>>,
}

impl Default for ZoneStore {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Slot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Slot")
            .field("generation", &self.generation)
            .field("occupied", &self.zone.is_some())
            .finish()
    }
}

impl ZoneStore {
    /// Creates an empty store with empty static and dynamic trees.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            attached_observers: HashMap::new(),
            pending_destroyed: Vec::new(),
            static_tree: Lbvh::new(),
            dynamic_tree: Lbvh::new(),
            next_creation_order: 0,
            stab_scratch: RefCell::new(Vec::new()),
        }
    }

    fn validate(shape: Shape, transform: &Transform, extents: Extents) -> Result<(), StoreError> {
        let _ = shape;
        if !transform.origin.is_finite() {
            return Err(StoreError::NonFinite { field: "transform.origin" });
        }
        let e = Vec3::new(extents.ex, extents.ey, extents.ez);
        if !e.is_finite() {
            return Err(StoreError::NonFinite { field: "extents" });
        }
        if extents.ex <= 0.0 || extents.ey <= 0.0 || extents.ez <= 0.0 {
            return Err(StoreError::InvalidExtents(e * 2.0));
        }
        Ok(())
    }

    /// Creates a new zone. The id is placed in its tree's inserted set; it only
    /// starts participating in queries after the next [`flush`](Self::flush).
    pub fn create(
        &mut self,
        shape: Shape,
        transform: Transform,
        extents: Extents,
        is_dynamic: bool,
        metadata: Option<Box<dyn core::any::Any + Send>>,
    ) -> Result<ZoneId, StoreError> {
        Self::validate(shape, &transform, extents)?;

        let creation_order = self.next_creation_order;
        self.next_creation_order += 1;

        let mut zone = Zone {
            generation: 0,
            creation_order,
            shape,
            transform,
            extents,
            is_dynamic,
            aabb: quickzone_geometry::Aabb3::empty(),
            metadata,
        };
        zone.recompute_aabb();
        let aabb = zone.aabb;

        let index = if let Some(idx) = self.free_list.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.generation += 1;
            zone.generation = slot.generation;
            slot.zone = Some(zone);
            idx
        } else {
            let idx = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, zone: Some(zone) });
            idx
        };

        let id = ZoneId(index, self.slots[index as usize].generation, creation_order);
        let tree = if is_dynamic { &mut self.dynamic_tree } else { &mut self.static_tree };
        tree.insert(id.slot(), aabb);
        Ok(id)
    }

    fn get_mut(&mut self, id: ZoneId) -> Result<&mut Zone, StoreError> {
        let slot = self.slots.get_mut(id.0 as usize).ok_or(StoreError::Destroyed)?;
        if slot.generation != id.1 {
            return Err(StoreError::Destroyed);
        }
        slot.zone.as_mut().ok_or(StoreError::Destroyed)
    }

    /// Looks up a live zone by id.
    pub fn get(&self, id: ZoneId) -> Option<&Zone> {
        let slot = self.slots.get(id.0 as usize)?;
        if slot.generation != id.1 {
            return None;
        }
        slot.zone.as_ref()
    }

    /// Updates a dynamic zone's transform. Static zones reject this (`StaticZoneImmutable`)
    /// since their AABB must stay immutable after creation.
    pub fn set_transform(&mut self, id: ZoneId, transform: Transform) -> Result<(), StoreError> {
        if !transform.origin.is_finite() {
            return Err(StoreError::NonFinite { field: "transform.origin" });
        }
        let zone = self.get_mut(id)?;
        if !zone.is_dynamic {
            return Err(StoreError::StaticZoneImmutable);
        }
        zone.transform = transform;
        zone.recompute_aabb();
        let aabb = zone.aabb;
        self.dynamic_tree.update(id.slot(), aabb);
        Ok(())
    }

    /// Updates a dynamic zone's extents.
    pub fn set_extents(&mut self, id: ZoneId, extents: Extents) -> Result<(), StoreError> {
        let e = Vec3::new(extents.ex, extents.ey, extents.ez);
        if !e.is_finite() {
            return Err(StoreError::NonFinite { field: "extents" });
        }
        if extents.ex <= 0.0 || extents.ey <= 0.0 || extents.ez <= 0.0 {
            return Err(StoreError::InvalidExtents(e * 2.0));
        }
        let zone = self.get_mut(id)?;
        if !zone.is_dynamic {
            return Err(StoreError::StaticZoneImmutable);
        }
        zone.extents = extents;
        zone.recompute_aabb();
        let aabb = zone.aabb;
        self.dynamic_tree.update(id.slot(), aabb);
        Ok(())
    }

    /// Records that `observer` is attached to `zone`, for cleanup bookkeeping on destroy.
    pub fn record_attachment(&mut self, zone: ZoneId, observer: ObserverId) {
        self.attached_observers.entry(zone).or_default().push(observer);
    }

    /// Removes a previously recorded attachment.
    pub fn record_detachment(&mut self, zone: ZoneId, observer: ObserverId) {
        if let Some(v) = self.attached_observers.get_mut(&zone) {
            v.retain(|&o| o != observer);
        }
    }

    /// The observers currently attached to `zone`.
    pub fn observers_of(&self, zone: ZoneId) -> &[ObserverId] {
        self.attached_observers.get(&zone).map_or(&[], |v| v.as_slice())
    }

    /// Destroys a zone immediately: the id becomes invalid right away (future
    /// `get`/mutation calls fail with `Destroyed`), but its removal from the spatial
    /// tree is staged until the next [`flush`](Self::flush), whose report carries the
    /// id forward so synthetic exits can be emitted before the rebuild lands.
    pub fn destroy(&mut self, id: ZoneId) -> Result<(), StoreError> {
        let slot = self.slots.get_mut(id.0 as usize).ok_or(StoreError::Destroyed)?;
        if slot.generation != id.1 || slot.zone.is_none() {
            return Err(StoreError::Destroyed);
        }
        let zone = slot.zone.take().expect("checked is_some above");
        self.free_list.push(id.0);

        let tree = if zone.is_dynamic { &mut self.dynamic_tree } else { &mut self.static_tree };
        tree.remove(id.slot());

        let observers = self.attached_observers.remove(&id).unwrap_or_default();
        self.pending_destroyed.push((id, observers));
        Ok(())
    }

    /// Pre-tick flush: performs at most one build per tree and drains the
    /// destroyed-zone queue for the dispatcher's synthetic exits.
    pub fn flush(&mut self) -> FlushReport {
        let destroyed = core::mem::take(&mut self.pending_destroyed);
        if !destroyed.is_empty() {
            log::debug!("zone store: {} zones destroyed since last flush", destroyed.len());
        }
        FlushReport {
            destroyed,
            static_action: self.static_tree.commit(),
            dynamic_action: self.dynamic_tree.commit(),
        }
    }

    /// Runs a stabbing query against both trees, appending every matching zone
    /// id (pre-filter by AABB only) into `out`. Reuses an internal scratch buffer
    /// across calls, so this never allocates once warmed up. Does not interact
    /// with scheduling state; safe to call at any time, including outside a tick.
    pub fn stab_aabb(&self, point: Vec3, out: &mut Vec<u32>) {
        out.clear();
        let mut scratch = self.stab_scratch.borrow_mut();
        self.static_tree.stab(point, &mut scratch);
        out.extend_from_slice(&scratch);
        self.dynamic_tree.stab(point, &mut scratch);
        out.extend_from_slice(&scratch);
    }

    /// Resolves a raw tree leaf index (as returned by [`stab_aabb`](Self::stab_aabb))
    /// back into a full [`ZoneId`], or `None` if that slot is no longer occupied
    /// (the zone was destroyed since the query's tree was last rebuilt).
    pub fn resolve_slot(&self, slot: u32) -> Option<ZoneId> {
        let s = self.slots.get(slot as usize)?;
        let zone = s.zone.as_ref()?;
        Some(ZoneId(slot, s.generation, zone.creation_order))
    }

    /// Number of live zone slots (includes zones whose insertion into a tree is
    /// still staged pending the next [`flush`](Self::flush)).
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    /// Whether the store holds no live zones.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
