// Copyright 2025 the QuickZone Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `Engine`: owns every piece of the containment system and exposes the
//! single `tick` entry point the host calls once per frame.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use glam::Vec3;

use quickzone_entities::{Group, GroupId, Probe};
use quickzone_geometry::{Aabb3, Extents, Shape, Transform};
use quickzone_observer::{
    EnterCallback, ExitCallback, GroupEnterCallback, GroupExitCallback, Observer,
};
use quickzone_scheduler::{Scheduler, TickGroups, TickReport};
use quickzone_store::{ObserverId, ZoneId, ZoneStore};

use crate::config::EngineConfig;
use crate::error::QuickZoneError;
use crate::handle::EntityHandle;
use crate::player::PlayerFeed;

fn lifecycle(msg: impl Into<String>) -> QuickZoneError {
    QuickZoneError::Lifecycle(msg.into())
}

/// Owns one [`ZoneStore`], the group table, the observer table, and the
/// [`Scheduler`]. The only mutating per-frame entry point is [`Engine::tick`];
/// everything else either builds up the engine's state or runs an immediate,
/// scheduling-independent query.
///
/// Does not implement `Debug`: its group table holds boxed position-probe
/// closures with no meaningful debug representation.
pub struct Engine {
    config: EngineConfig,
    store: ZoneStore,
    groups: Vec<Group<EntityHandle>>,
    entity_group: HashMap<EntityHandle, GroupId>,
    observers: Vec<Observer<EntityHandle>>,
    scheduler: Scheduler,
    last_tick: Option<Instant>,
    hits_scratch: Vec<u32>,
    zone_scratch: Vec<ZoneId>,
}

impl Engine {
    /// Creates an engine from `config`, validating it first.
    pub fn new(config: EngineConfig) -> Result<Self, QuickZoneError> {
        config.validate()?;
        Ok(Self {
            scheduler: Scheduler::new(config.frame_budget),
            config,
            store: ZoneStore::new(),
            groups: Vec::new(),
            entity_group: HashMap::new(),
            observers: Vec::new(),
            last_tick: None,
            hits_scratch: Vec::new(),
            zone_scratch: Vec::new(),
        })
    }

    // ---- Zones ---------------------------------------------------------

    /// Creates a zone from an explicit shape, transform, and extents.
    pub fn create_zone(
        &mut self,
        shape: Shape,
        transform: Transform,
        extents: Extents,
        is_dynamic: bool,
        metadata: Option<Box<dyn std::any::Any + Send>>,
    ) -> Result<ZoneId, QuickZoneError> {
        Ok(self.store.create(shape, transform, extents, is_dynamic, metadata)?)
    }

    /// Creates a zone from a world-space AABB: origin is the box's center,
    /// rotation is identity, extents are the box's half-size. Stands in for
    /// `Zone.fromPart`/`Zone.fromParts`, which this workspace has no host
    /// "part" type to derive from.
    pub fn create_zone_from_bounds(
        &mut self,
        shape: Shape,
        aabb: Aabb3,
        is_dynamic: bool,
        metadata: Option<Box<dyn std::any::Any + Send>>,
    ) -> Result<ZoneId, QuickZoneError> {
        let origin = aabb.center();
        let size = aabb.max - aabb.min;
        let transform = Transform::new(origin, glam::Quat::IDENTITY);
        let extents = Extents::from_size(size);
        self.create_zone(shape, transform, extents, is_dynamic, metadata)
    }

    /// Moves a dynamic zone, keeping its current rotation (`zone:setPosition`).
    pub fn set_zone_position(&mut self, zone: ZoneId, position: Vec3) -> Result<(), QuickZoneError> {
        let rotation = self.store.get(zone).ok_or_else(|| lifecycle("zone is destroyed or unknown"))?.transform.rotation;
        Ok(self.store.set_transform(zone, Transform::new(position, rotation))?)
    }

    /// Replaces a dynamic zone's full transform.
    pub fn set_zone_transform(&mut self, zone: ZoneId, transform: Transform) -> Result<(), QuickZoneError> {
        Ok(self.store.set_transform(zone, transform)?)
    }

    /// Replaces a dynamic zone's extents.
    pub fn set_zone_extents(&mut self, zone: ZoneId, extents: Extents) -> Result<(), QuickZoneError> {
        Ok(self.store.set_extents(zone, extents)?)
    }

    /// Destroys a zone. Its removal from the spatial tree is staged until the
    /// next [`Engine::tick`]'s flush; at that flush, every observer that had
    /// it attached has a synthetic exit forced for each entity it still
    /// records as INSIDE it (regardless of whether that entity is polled
    /// again this tick), and the zone is then detached from the observer's
    /// attachment set. No exit fires synchronously from this call.
    pub fn destroy_zone(&mut self, zone: ZoneId) -> Result<(), QuickZoneError> {
        Ok(self.store.destroy(zone)?)
    }

    /// Attaches `zone` to `observer`.
    pub fn attach_zone(&mut self, observer: ObserverId, zone: ZoneId) -> Result<(), QuickZoneError> {
        if self.store.get(zone).is_none() {
            return Err(lifecycle("zone is destroyed or unknown"));
        }
        let Some(obs) = self.observers.get_mut(observer.0 as usize) else {
            return Err(lifecycle("observer does not exist"));
        };
        obs.attach_zone(zone);
        self.store.record_attachment(zone, observer);
        Ok(())
    }

    /// Detaches `zone` from `observer`. Does not synthesize an exit; the
    /// zone simply drops out of the observer's next candidate set.
    pub fn detach_zone(&mut self, observer: ObserverId, zone: ZoneId) -> Result<(), QuickZoneError> {
        let Some(obs) = self.observers.get_mut(observer.0 as usize) else {
            return Err(lifecycle("observer does not exist"));
        };
        obs.detach_zone(zone);
        self.store.record_detachment(zone, observer);
        Ok(())
    }

    /// Runs a fresh stabbing query against both trees and returns exactly the
    /// zones that contain `point`, re-testing each AABB hit against the exact
    /// shape. Does not touch scheduling state; safe to call at any time.
    pub fn zones_at_point(&self, point: Vec3) -> Vec<ZoneId> {
        let mut raw = Vec::new();
        self.store.stab_aabb(point, &mut raw);
        raw.into_iter()
            .filter_map(|slot| self.store.resolve_slot(slot))
            .filter(|&id| {
                let zone = self.store.get(id).expect("slot resolved to a live zone");
                quickzone_geometry::contains(zone.shape, &zone.transform, zone.extents, point)
            })
            .collect()
    }

    // ---- Groups ---------------------------------------------------------

    /// Creates a group with an explicit update rate and movement-filter precision.
    pub fn create_group(&mut self, update_rate_hz: f32, precision: f32) -> Result<GroupId, QuickZoneError> {
        let group = Group::new(update_rate_hz, precision)?;
        let id = GroupId(self.groups.len() as u32);
        self.groups.push(group);
        Ok(id)
    }

    /// Creates a group using the engine's configured default rate/precision.
    pub fn create_default_group(&mut self) -> Result<GroupId, QuickZoneError> {
        self.create_group(self.config.default_update_rate_hz, self.config.default_precision)
    }

    /// Creates a group meant to be kept in sync with a [`PlayerFeed`] of every
    /// connected player (`Group.players()`).
    pub fn create_players_group(&mut self) -> Result<GroupId, QuickZoneError> {
        self.create_default_group()
    }

    /// Creates a group meant to be kept in sync with a [`PlayerFeed`] that
    /// reports only the local participant, including across respawns
    /// (`Group.localPlayer()`).
    pub fn create_local_player_group(&mut self) -> Result<GroupId, QuickZoneError> {
        self.create_default_group()
    }

    /// Adds `entity` to `group`, with its position probe and opaque metadata.
    /// An entity may belong to only one group at a time.
    pub fn group_add(
        &mut self,
        group: GroupId,
        entity: EntityHandle,
        probe: Probe,
        metadata: Option<Box<dyn std::any::Any + Send>>,
    ) -> Result<(), QuickZoneError> {
        if self.entity_group.contains_key(&entity) {
            return Err(QuickZoneError::InvalidArgument(
                "entity already belongs to a group".to_string(),
            ));
        }
        let Some(g) = self.groups.get_mut(group.0 as usize) else {
            return Err(lifecycle("group does not exist"));
        };
        g.add(entity, probe, metadata)?;
        self.entity_group.insert(entity, group);
        Ok(())
    }

    /// Removes `entity` from `group`, synthesizing exits for every observer
    /// that currently records it inside one of its zones (this entity will
    /// never be probed again, so unlike zone destruction there is no future
    /// tick that would naturally produce the exit).
    pub fn group_remove(&mut self, group: GroupId, entity: EntityHandle) -> Result<(), QuickZoneError> {
        let Some(g) = self.groups.get_mut(group.0 as usize) else {
            return Err(lifecycle("group does not exist"));
        };
        g.remove(entity)?;
        self.entity_group.remove(&entity);
        for observer in self.observers.iter_mut().filter(|o| o.is_subscribed(group)) {
            if observer.current_zone(entity).is_some() {
                observer.apply_transition(entity, group, None);
            }
        }
        Ok(())
    }

    /// The group `entity` currently belongs to, if any.
    pub fn group_of_entity(&self, entity: EntityHandle) -> Option<GroupId> {
        self.entity_group.get(&entity).copied()
    }

    /// Keeps `group` in sync with a player lifecycle feed: applies every join
    /// and leave the feed reports since the last poll. Intended to be called
    /// once per tick, before [`Engine::tick`].
    pub fn sync_player_group(
        &mut self,
        group: GroupId,
        feed: &mut dyn PlayerFeed,
    ) -> Result<(), QuickZoneError> {
        for (entity, probe) in feed.poll_joined() {
            self.group_add(group, entity, probe, None)?;
        }
        for entity in feed.poll_left() {
            self.group_remove(group, entity)?;
        }
        Ok(())
    }

    // ---- Observers --------------------------------------------------------

    /// Creates a new observer with the given priority (higher wins cross-observer
    /// dispatch ordering; has no bearing on winner selection among one observer's
    /// own attached zones, which always tie-breaks by ascending zone id).
    pub fn create_observer(&mut self, priority: i32) -> ObserverId {
        let id = ObserverId(self.observers.len() as u32);
        self.observers.push(Observer::new(id, priority));
        id
    }

    /// Subscribes `observer` to `group`'s entities.
    pub fn subscribe(&mut self, observer: ObserverId, group: GroupId) -> Result<(), QuickZoneError> {
        let Some(obs) = self.observers.get_mut(observer.0 as usize) else {
            return Err(lifecycle("observer does not exist"));
        };
        obs.subscribe(group);
        Ok(())
    }

    /// Unsubscribes `observer` from `group`.
    pub fn unsubscribe(&mut self, observer: ObserverId, group: GroupId) -> Result<(), QuickZoneError> {
        let Some(obs) = self.observers.get_mut(observer.0 as usize) else {
            return Err(lifecycle("observer does not exist"));
        };
        obs.unsubscribe(group);
        Ok(())
    }

    /// Enables or disables `observer`. Disabling synthesizes exits for every
    /// currently-INSIDE pair; re-enabling simply lets the next tick re-enter
    /// them naturally.
    pub fn set_observer_enabled(&mut self, observer: ObserverId, enabled: bool) -> Result<(), QuickZoneError> {
        let Some(obs) = self.observers.get_mut(observer.0 as usize) else {
            return Err(lifecycle("observer does not exist"));
        };
        obs.set_enabled(enabled);
        Ok(())
    }

    /// Registers the `onEntered`/`observe` callback for `observer`.
    pub fn on_entered(&mut self, observer: ObserverId, cb: EnterCallback<EntityHandle>) -> Result<(), QuickZoneError> {
        let Some(obs) = self.observers.get_mut(observer.0 as usize) else {
            return Err(lifecycle("observer does not exist"));
        };
        obs.set_on_entered(cb);
        Ok(())
    }

    /// Registers the `onExited` callback for `observer`.
    pub fn on_exited(&mut self, observer: ObserverId, cb: ExitCallback<EntityHandle>) -> Result<(), QuickZoneError> {
        let Some(obs) = self.observers.get_mut(observer.0 as usize) else {
            return Err(lifecycle("observer does not exist"));
        };
        obs.set_on_exited(cb);
        Ok(())
    }

    /// Registers the `onGroupEntered`/`observeGroup` callback for `observer`.
    pub fn on_group_entered(&mut self, observer: ObserverId, cb: GroupEnterCallback) -> Result<(), QuickZoneError> {
        let Some(obs) = self.observers.get_mut(observer.0 as usize) else {
            return Err(lifecycle("observer does not exist"));
        };
        obs.set_on_group_entered(cb);
        Ok(())
    }

    /// Registers the `onGroupExited` callback for `observer`.
    pub fn on_group_exited(&mut self, observer: ObserverId, cb: GroupExitCallback) -> Result<(), QuickZoneError> {
        let Some(obs) = self.observers.get_mut(observer.0 as usize) else {
            return Err(lifecycle("observer does not exist"));
        };
        obs.set_on_group_exited(cb);
        Ok(())
    }

    // ---- Scheduling ---------------------------------------------------------

    /// Updates the per-tick wall-clock budget (`setFrameBudget`).
    pub fn set_frame_budget(&mut self, budget: Duration) {
        self.scheduler.set_budget(budget);
    }

    /// The current per-tick wall-clock budget.
    pub fn frame_budget(&self) -> Duration {
        self.scheduler.budget()
    }

    /// Runs one tick: flushes the zone store (at most one rebuild per tree),
    /// then round-robins entity polling across groups until either every
    /// group's quota for this tick is spent or the frame budget elapses.
    ///
    /// `now` is a fresh monotonic reading the host takes immediately before
    /// calling this; Δt since the previous call (or 1/30 s on the very first
    /// tick) drives this tick's per-group quotas.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let dt = match self.last_tick {
            Some(prev) => now.saturating_duration_since(prev),
            None => Duration::from_secs_f32(1.0 / 30.0),
        };
        self.last_tick = Some(now);

        let report = self.store.flush();
        // Every observer that had a destroyed zone attached forces an exit for
        // each entity it still records as INSIDE that zone, rather than
        // waiting for that entity's next scheduled poll (which, under a low
        // update-rate quota or the movement filter, might be many ticks away).
        let entity_group = &self.entity_group;
        for (zone, observer_ids) in &report.destroyed {
            for &oid in observer_ids {
                if let Some(obs) = self.observers.get_mut(oid.0 as usize) {
                    quickzone_dispatch::dispatch_zone_destroyed(*zone, obs, |e| entity_group.get(&e).copied());
                }
            }
        }
        let bypass = report.any_rebuild();
        let flush_elapsed = Instant::now().saturating_duration_since(now);

        if flush_elapsed >= self.scheduler.budget() {
            return TickReport {
                entities_processed: 0,
                truncated_by_budget: true,
                flush_elapsed,
                skipped_queries: true,
            };
        }

        let mut ctx = TickContext {
            groups: &mut self.groups,
            observers: &mut self.observers,
            store: &self.store,
            bypass,
            hits_scratch: &mut self.hits_scratch,
            zone_scratch: &mut self.zone_scratch,
        };
        ctx.begin_tick(dt);
        let (entities_processed, truncated_by_budget) =
            self.scheduler.round_robin(now, flush_elapsed, &mut ctx, Instant::now);
        TickReport { entities_processed, truncated_by_budget, flush_elapsed, skipped_queries: false }
    }
}

/// Borrows the pieces of [`Engine`] one tick's round-robin loop needs, as a
/// disjoint-field view so the flush step (which needs `&mut` access to the
/// store) can complete and release its borrow before this is built.
struct TickContext<'a> {
    groups: &'a mut Vec<Group<EntityHandle>>,
    observers: &'a mut Vec<Observer<EntityHandle>>,
    store: &'a ZoneStore,
    bypass: bool,
    hits_scratch: &'a mut Vec<u32>,
    zone_scratch: &'a mut Vec<ZoneId>,
}

impl TickGroups for TickContext<'_> {
    fn group_count(&self) -> usize {
        self.groups.len()
    }

    fn begin_tick(&mut self, dt: Duration) {
        let dt_seconds = dt.as_secs_f32();
        for group in self.groups.iter_mut() {
            group.begin_tick(dt_seconds);
        }
    }

    fn has_quota(&self, group: usize) -> bool {
        self.groups[group].remaining_quota() > 0
    }

    fn process_one(&mut self, group: usize) {
        let Some(index) = self.groups[group].poll_one() else { return };
        let handle = self.groups[group].handle_at(index);
        let pos = self.groups[group].probe_at(index);
        if self.groups[group].should_skip(index, pos, self.bypass) {
            return;
        }
        self.groups[group].record_position(index, pos);

        self.store.stab_aabb(pos, self.hits_scratch);
        self.zone_scratch.clear();
        for &slot in self.hits_scratch.iter() {
            let Some(id) = self.store.resolve_slot(slot) else { continue };
            let zone = self.store.get(id).expect("resolved slot is live");
            if quickzone_geometry::contains(zone.shape, &zone.transform, zone.extents, pos) {
                self.zone_scratch.push(id);
            }
        }

        let group_id = GroupId(group as u32);
        let mut subscribed: Vec<&mut Observer<EntityHandle>> =
            self.observers.iter_mut().filter(|o| o.is_subscribed(group_id)).collect();
        subscribed.sort_by_key(|o| std::cmp::Reverse(o.priority()));
        quickzone_dispatch::dispatch_entity(handle, group_id, self.zone_scratch, subscribed);
    }
}
