// Copyright 2025 the QuickZone Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-observer state machine: attachment sets, registered callbacks,
//! per-entity INSIDE/OUTSIDE tracking, priority-based winner selection, and
//! per-group enter/exit reference counting.

use std::panic::{self, AssertUnwindSafe};

use hashbrown::{HashMap, HashSet};
use quickzone_entities::GroupId;
use quickzone_store::{ObserverId, ZoneId};

/// A cleanup closure returned from an `observe*`-style callback, run exactly
/// once at the matching exit (or group-exit) transition.
pub type Cleanup = Box<dyn FnMut()>;

/// An `onEntered`/`observe` callback: given the entity and the zone it just
/// entered, optionally returns a cleanup closure to run at the matching exit.
pub type EnterCallback<E> = Box<dyn FnMut(E, ZoneId) -> Option<Cleanup>>;
/// An `onExited` callback.
pub type ExitCallback<E> = Box<dyn FnMut(E, ZoneId)>;
/// An `onGroupEntered`/`observeGroup` callback.
pub type GroupEnterCallback = Box<dyn FnMut(GroupId, ZoneId) -> Option<Cleanup>>;
/// An `onGroupExited` callback.
pub type GroupExitCallback = Box<dyn FnMut(GroupId, ZoneId)>;

struct Callbacks<E> {
    on_entered: Option<EnterCallback<E>>,
    on_exited: Option<ExitCallback<E>>,
    on_group_entered: Option<GroupEnterCallback>,
    on_group_exited: Option<GroupExitCallback>,
}

impl<E> Default for Callbacks<E> {
    fn default() -> Self {
        Self { on_entered: None, on_exited: None, on_group_entered: None, on_group_exited: None }
    }
}

struct EntityState {
    zone: ZoneId,
    cleanup: Option<Cleanup>,
}

#[derive(Default)]
struct GroupCounter {
    count: u32,
    cleanup: Option<Cleanup>,
}

/// What a call to [`Observer::apply_transition`] actually did, for callers that
/// want to assert on it (tests, metrics). Not consulted by the observer itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// The entity's winning zone didn't change.
    Unchanged,
    /// The entity exited its prior zone and entered no new one.
    Exited,
    /// The entity had no prior zone and entered a new one.
    Entered,
    /// The entity exited its prior zone and entered a different one, in the same tick.
    Switched,
}

/// Binds a set of groups to a set of zones and carries the enter/exit callbacks
/// for the (observer, entity) and (observer, group) state machines.
pub struct Observer<E: Copy + Eq + std::hash::Hash> {
    id: ObserverId,
    priority: i32,
    enabled: bool,
    attached_zones: HashSet<ZoneId>,
    subscribed_groups: HashSet<GroupId>,
    entity_state: HashMap<E, EntityState>,
    group_counters: HashMap<GroupId, GroupCounter>,
    callbacks: Callbacks<E>,
}

impl<E: Copy + Eq + std::hash::Hash> std::fmt::Debug for Observer<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("enabled", &self.enabled)
            .field("attached_zones", &self.attached_zones.len())
            .field("subscribed_groups", &self.subscribed_groups.len())
            .finish_non_exhaustive()
    }
}

impl<E: Copy + Eq + std::hash::Hash> Observer<E> {
    /// Creates a disabled-callback observer with the given id and priority.
    /// Register callbacks with [`Observer::set_on_entered`] and friends before use.
    pub fn new(id: ObserverId, priority: i32) -> Self {
        Self {
            id,
            priority,
            enabled: true,
            attached_zones: HashSet::new(),
            subscribed_groups: HashSet::new(),
            entity_state: HashMap::new(),
            group_counters: HashMap::new(),
            callbacks: Callbacks::default(),
        }
    }

    /// This observer's id.
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Priority used by the dispatcher to order which observer is serviced first
    /// for a given entity (descending). Has no bearing on winner selection among
    /// this observer's own attached zones, which always tie-breaks by zone id.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Sets this observer's dispatch priority.
    pub fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    /// Whether this observer is currently enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Registers the `onEntered`/`observe` callback. Its return value, if any, is
    /// stored as the entity's cleanup closure and run at the matching exit.
    pub fn set_on_entered(&mut self, cb: EnterCallback<E>) {
        self.callbacks.on_entered = Some(cb);
    }

    /// Registers the `onExited` callback.
    pub fn set_on_exited(&mut self, cb: ExitCallback<E>) {
        self.callbacks.on_exited = Some(cb);
    }

    /// Registers the `onGroupEntered`/`observeGroup` callback.
    pub fn set_on_group_entered(&mut self, cb: GroupEnterCallback) {
        self.callbacks.on_group_entered = Some(cb);
    }

    /// Registers the `onGroupExited` callback.
    pub fn set_on_group_exited(&mut self, cb: GroupExitCallback) {
        self.callbacks.on_group_exited = Some(cb);
    }

    /// Attaches a zone to this observer.
    pub fn attach_zone(&mut self, zone: ZoneId) {
        self.attached_zones.insert(zone);
    }

    /// Detaches a zone. Does not synthesize an exit on its own; the next dispatch
    /// pass sees the zone missing from the candidate set and exits naturally.
    /// When a zone is destroyed rather than plainly detached, the caller is
    /// expected to force exits first (see `quickzone_dispatch::dispatch_zone_destroyed`)
    /// since a quota-starved or movement-filtered entity might not be visited
    /// again for many more ticks.
    pub fn detach_zone(&mut self, zone: ZoneId) {
        self.attached_zones.remove(&zone);
    }

    /// Whether `zone` is currently attached to this observer.
    pub fn is_attached(&self, zone: ZoneId) -> bool {
        self.attached_zones.contains(&zone)
    }

    /// Subscribes this observer to a group.
    pub fn subscribe(&mut self, group: GroupId) {
        self.subscribed_groups.insert(group);
    }

    /// Unsubscribes from a group.
    pub fn unsubscribe(&mut self, group: GroupId) {
        self.subscribed_groups.remove(&group);
    }

    /// Whether this observer is subscribed to `group`.
    pub fn is_subscribed(&self, group: GroupId) -> bool {
        self.subscribed_groups.contains(&group)
    }

    /// The zone an entity is currently recorded as INSIDE, if any.
    pub fn current_zone(&self, entity: E) -> Option<ZoneId> {
        self.entity_state.get(&entity).map(|s| s.zone)
    }

    /// Entities this observer currently records as INSIDE `zone`. Used to force
    /// synthetic exits when `zone` is destroyed, since a quota-starved or
    /// movement-filtered entity might not otherwise be re-queried for many
    /// more ticks.
    pub fn entities_inside(&self, zone: ZoneId) -> Vec<E> {
        self.entity_state.iter().filter(|(_, s)| s.zone == zone).map(|(&e, _)| e).collect()
    }

    /// Picks the winning zone among `candidates` (already filtered to zones that
    /// both contain the entity and are attached to this observer): since all of
    /// this observer's zones share its priority, the winner is simply the
    /// one created first (ascending creation-order tie-break).
    pub fn select_winner(&self, candidates: impl IntoIterator<Item = ZoneId>) -> Option<ZoneId> {
        candidates
            .into_iter()
            .filter(|z| self.attached_zones.contains(z))
            .min_by_key(ZoneId::creation_order)
    }

    fn fire_entered(&mut self, entity: E, zone: ZoneId) -> Option<Cleanup> {
        let Some(cb) = self.callbacks.on_entered.as_mut() else { return None };
        match panic::catch_unwind(AssertUnwindSafe(|| cb(entity, zone))) {
            Ok(cleanup) => cleanup,
            Err(_) => {
                log::error!("onEntered callback panicked; state advances regardless");
                None
            }
        }
    }

    fn fire_exited(&mut self, entity: E, zone: ZoneId) {
        if let Some(cb) = self.callbacks.on_exited.as_mut()
            && panic::catch_unwind(AssertUnwindSafe(|| cb(entity, zone))).is_err()
        {
            log::error!("onExited callback panicked; state advances regardless");
        }
    }

    fn fire_group_entered(&mut self, group: GroupId, zone: ZoneId) -> Option<Cleanup> {
        let Some(cb) = self.callbacks.on_group_entered.as_mut() else { return None };
        match panic::catch_unwind(AssertUnwindSafe(|| cb(group, zone))) {
            Ok(cleanup) => cleanup,
            Err(_) => {
                log::error!("onGroupEntered callback panicked; state advances regardless");
                None
            }
        }
    }

    fn fire_group_exited(&mut self, group: GroupId, zone: ZoneId) {
        if let Some(cb) = self.callbacks.on_group_exited.as_mut()
            && panic::catch_unwind(AssertUnwindSafe(|| cb(group, zone))).is_err()
        {
            log::error!("onGroupExited callback panicked; state advances regardless");
        }
    }

    fn run_cleanup(mut cleanup: Cleanup) {
        if panic::catch_unwind(AssertUnwindSafe(|| cleanup())).is_err() {
            log::error!("cleanup closure panicked; suppressed");
        }
    }

    /// Applies the per-entity diff for one tick: `winner` is the zone this
    /// observer's candidate set resolved to for `entity` (or `None`), already
    /// selected via [`Observer::select_winner`]. Fires `onExited`/`onEntered` and
    /// the matching group-level events, and advances state unconditionally even
    /// if a user callback panics.
    pub fn apply_transition(&mut self, entity: E, group: GroupId, winner: Option<ZoneId>) -> Transition {
        let prior = self.entity_state.get(&entity).map(|s| s.zone);
        if prior == winner {
            return Transition::Unchanged;
        }

        if let Some(z0) = prior {
            self.fire_exited(entity, z0);
            if let Some(state) = self.entity_state.remove(&entity)
                && let Some(cleanup) = state.cleanup
            {
                Self::run_cleanup(cleanup);
            }
            if let Some(counter) = self.group_counters.get_mut(&group) {
                counter.count -= 1;
                if counter.count == 0 {
                    self.fire_group_exited(group, z0);
                    if let Some(cleanup) = self.group_counters.remove(&group).and_then(|c| c.cleanup) {
                        Self::run_cleanup(cleanup);
                    }
                }
            }
        }

        if let Some(z1) = winner {
            let cleanup = self.fire_entered(entity, z1);
            self.entity_state.insert(entity, EntityState { zone: z1, cleanup });
            let counter = self.group_counters.entry(group).or_default();
            counter.count += 1;
            if counter.count == 1 {
                let group_cleanup = self.fire_group_entered(group, z1);
                self.group_counters.entry(group).or_default().cleanup = group_cleanup;
            }
        }

        match (prior, winner) {
            (Some(_), Some(_)) => Transition::Switched,
            (Some(_), None) => Transition::Exited,
            (None, Some(_)) => Transition::Entered,
            (None, None) => unreachable!("prior == winner case already handled"),
        }
    }

    /// `setEnabled(false)`: synthesizes an exit for every currently-INSIDE entity
    /// (and the matching group exits), then clears all state. `setEnabled(true)`
    /// simply flips the flag; entities are treated as OUTSIDE and re-enter
    /// naturally on the next tick that finds them inside an attached zone.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled == self.enabled {
            return;
        }
        if !enabled {
            let entities: Vec<(E, ZoneId)> =
                self.entity_state.iter().map(|(&e, s)| (e, s.zone)).collect();
            for (entity, zone) in entities {
                self.fire_exited(entity, zone);
                if let Some(state) = self.entity_state.remove(&entity)
                    && let Some(cleanup) = state.cleanup
                {
                    Self::run_cleanup(cleanup);
                }
            }
            let groups: Vec<GroupId> = self.group_counters.keys().copied().collect();
            for group in groups {
                if let Some(counter) = self.group_counters.get(&group)
                    && counter.count > 0
                {
                    // No single triggering zone for a bulk disable; the last
                    // known winner isn't tracked per group. Use the
                    // earliest-created attached zone as a representative,
                    // falling back to skipping the event entirely when there
                    // is none (shouldn't happen in practice).
                    if let Some(zone) = self.attached_zones.iter().copied().min_by_key(ZoneId::creation_order) {
                        self.fire_group_exited(group, zone);
                    }
                }
                if let Some(cleanup) = self.group_counters.remove(&group).and_then(|c| c.cleanup) {
                    Self::run_cleanup(cleanup);
                }
            }
        }
        self.enabled = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::{Quat, Vec3};
    use quickzone_geometry::{Extents, Shape, Transform};
    use quickzone_store::ZoneStore;

    /// A handful of distinct `ZoneId`s in ascending slot order, minted from a
    /// throwaway store (these unit tests care only about relative ordering).
    fn zones(n: usize) -> Vec<ZoneId> {
        let mut store = ZoneStore::new();
        (0..n)
            .map(|_| {
                store
                    .create(
                        Shape::Block,
                        Transform::new(Vec3::ZERO, Quat::IDENTITY),
                        Extents::from_size(Vec3::splat(1.0)),
                        false,
                        None,
                    )
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn winner_selection_tie_breaks_ascending_zone_id() {
        let ids = zones(2);
        let mut obs = Observer::<u32>::new(ObserverId(1), 0);
        obs.attach_zone(ids[1]);
        obs.attach_zone(ids[0]);
        let winner = obs.select_winner([ids[1], ids[0]]);
        assert_eq!(winner, Some(ids[0]));
    }

    #[test]
    fn winner_ignores_unattached_candidates() {
        let ids = zones(2);
        let mut obs = Observer::<u32>::new(ObserverId(1), 0);
        obs.attach_zone(ids[1]);
        let winner = obs.select_winner([ids[0], ids[1]]);
        assert_eq!(winner, Some(ids[1]));
    }

    #[test]
    fn enter_then_exit_fires_callbacks_and_runs_cleanup() {
        let entered = Rc::new(RefCell::new(Vec::new()));
        let exited = Rc::new(RefCell::new(Vec::new()));
        let cleaned_up = Rc::new(RefCell::new(false));

        let mut obs = Observer::<u32>::new(ObserverId(1), 0);
        {
            let entered = entered.clone();
            let cleaned_up = cleaned_up.clone();
            obs.set_on_entered(Box::new(move |e, z| {
                entered.borrow_mut().push((e, z));
                let cleaned_up = cleaned_up.clone();
                Some(Box::new(move || *cleaned_up.borrow_mut() = true) as Cleanup)
            }));
        }
        {
            let exited = exited.clone();
            obs.set_on_exited(Box::new(move |e, z| exited.borrow_mut().push((e, z))));
        }

        let ids = zones(1);
        obs.attach_zone(ids[0]);
        let t = obs.apply_transition(42, GroupId(0), Some(ids[0]));
        assert_eq!(t, Transition::Entered);
        assert_eq!(*entered.borrow(), vec![(42, ids[0])]);
        assert!(!*cleaned_up.borrow());

        let t = obs.apply_transition(42, GroupId(0), None);
        assert_eq!(t, Transition::Exited);
        assert_eq!(*exited.borrow(), vec![(42, ids[0])]);
        assert!(*cleaned_up.borrow());
    }

    #[test]
    fn group_counter_fires_on_transition_edges_only() {
        let group_entries = Rc::new(RefCell::new(0));
        let group_exits = Rc::new(RefCell::new(0));

        let mut obs = Observer::<u32>::new(ObserverId(1), 0);
        {
            let group_entries = group_entries.clone();
            obs.set_on_group_entered(Box::new(move |_, _| {
                *group_entries.borrow_mut() += 1;
                None
            }));
        }
        {
            let group_exits = group_exits.clone();
            obs.set_on_group_exited(Box::new(move |_, _| *group_exits.borrow_mut() += 1));
        }
        let ids = zones(1);
        obs.attach_zone(ids[0]);

        obs.apply_transition(1, GroupId(0), Some(ids[0]));
        assert_eq!(*group_entries.borrow(), 1);
        obs.apply_transition(2, GroupId(0), Some(ids[0]));
        assert_eq!(*group_entries.borrow(), 1, "second entity shouldn't re-fire group entered");

        obs.apply_transition(1, GroupId(0), None);
        assert_eq!(*group_exits.borrow(), 0, "one of two still inside, no group exit yet");
        obs.apply_transition(2, GroupId(0), None);
        assert_eq!(*group_exits.borrow(), 1);
    }

    #[test]
    fn unchanged_winner_is_a_no_op() {
        let ids = zones(1);
        let mut obs = Observer::<u32>::new(ObserverId(1), 0);
        obs.attach_zone(ids[0]);
        obs.apply_transition(1, GroupId(0), Some(ids[0]));
        let t = obs.apply_transition(1, GroupId(0), Some(ids[0]));
        assert_eq!(t, Transition::Unchanged);
    }

    #[test]
    fn panicking_callback_is_caught_and_state_still_advances() {
        let ids = zones(1);
        let mut obs = Observer::<u32>::new(ObserverId(1), 0);
        obs.set_on_entered(Box::new(|_, _| panic!("boom")));
        obs.attach_zone(ids[0]);
        let prev_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(|_| {}));
        let t = obs.apply_transition(1, GroupId(0), Some(ids[0]));
        std::panic::set_hook(prev_hook);
        assert_eq!(t, Transition::Entered);
        assert_eq!(obs.current_zone(1), Some(ids[0]));
    }

    #[test]
    fn disabling_synthesizes_exits_and_clears_state() {
        let ids = zones(1);
        let exited = Rc::new(RefCell::new(Vec::new()));
        let mut obs = Observer::<u32>::new(ObserverId(1), 0);
        {
            let exited = exited.clone();
            obs.set_on_exited(Box::new(move |e, z| exited.borrow_mut().push((e, z))));
        }
        obs.attach_zone(ids[0]);
        obs.apply_transition(1, GroupId(0), Some(ids[0]));

        obs.set_enabled(false);
        assert_eq!(*exited.borrow(), vec![(1, ids[0])]);
        assert_eq!(obs.current_zone(1), None);
        assert!(!obs.is_enabled());
    }
}
