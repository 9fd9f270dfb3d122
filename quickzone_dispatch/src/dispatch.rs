// Copyright 2025 the QuickZone Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-entity enter/exit diffing against a group's subscribed observers.
//!
//! [`dispatch_entity`] is the per-tick inner loop: given the set of zones an
//! entity is currently contained by (the containment query's result set,
//! intersected per observer against that observer's attached zones inside
//! [`Observer::select_winner`]), it walks every observer subscribed to the
//! entity's group and applies the resulting enter/exit transition. Observers
//! are visited in the order given by the caller, which is expected to be
//! descending priority — the facade owns that ordering, this crate only
//! walks it, the way `dispatcher::run` walked a pre-ordered capture → target
//! → bubble sequence rather than computing the order itself.
//!
//! A panicking callback never aborts the walk: [`Observer::apply_transition`]
//! bounds each callback in its own `catch_unwind`, so one observer's failure
//! never prevents the rest of the group's observers from seeing this tick's
//! transition.
//!
//! [`dispatch_zone_destroyed`] is the companion pass for zone destruction: it
//! forces an exit for every entity an observer still records as INSIDE the
//! destroyed zone, rather than waiting for that entity's next scheduled poll.

use quickzone_entities::GroupId;
use quickzone_observer::{Observer, Transition};
use quickzone_store::ZoneId;
use std::hash::Hash;

/// Tally of what happened while walking one entity's observers this tick.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Observers that newly entered a zone (including a zone switch).
    pub entered: u32,
    /// Observers that exited their previous zone with no new winner.
    pub exited: u32,
    /// Observers that switched directly from one zone to another.
    pub switched: u32,
}

impl DispatchSummary {
    fn record(&mut self, transition: Transition) {
        match transition {
            Transition::Unchanged => {}
            Transition::Entered => self.entered += 1,
            Transition::Exited => self.exited += 1,
            Transition::Switched => self.switched += 1,
        }
    }
}

/// Diffs one entity's current containment hits against every observer in
/// `observers`, in the order given.
///
/// `hits` is the full result set returned by the containment query this tick
/// (both the static and dynamic tree stabbing queries, merged); each observer
/// intersects it against its own attached zones via
/// [`Observer::select_winner`], so callers do not need to pre-filter per
/// observer. Observers not subscribed to `group`, or currently disabled, are
/// skipped without consulting `hits` at all.
pub fn dispatch_entity<'o, E, I>(
    entity: E,
    group: GroupId,
    hits: &[ZoneId],
    observers: I,
) -> DispatchSummary
where
    E: Copy + Eq + Hash,
    I: IntoIterator<Item = &'o mut Observer<E>>,
{
    let mut summary = DispatchSummary::default();
    for observer in observers {
        if !observer.is_enabled() || !observer.is_subscribed(group) {
            continue;
        }
        let winner = observer.select_winner(hits.iter().copied());
        let transition = observer.apply_transition(entity, group, winner);
        summary.record(transition);
    }
    summary
}

/// Forces an exit for every entity `observer` currently records as INSIDE
/// `zone`, then detaches the zone from its attachment set. Used when `zone`
/// has been destroyed: unlike the per-tick diff in [`dispatch_entity`], this
/// doesn't wait for the entity to be re-queried, since a quota-starved or
/// movement-filtered entity might not be visited again for many more ticks.
///
/// `entity_group` resolves each affected entity to the group its exit should
/// be attributed to; an entity with no resolvable group (already removed from
/// its group through some other path) is skipped.
pub fn dispatch_zone_destroyed<E>(
    zone: ZoneId,
    observer: &mut Observer<E>,
    mut entity_group: impl FnMut(E) -> Option<GroupId>,
) -> DispatchSummary
where
    E: Copy + Eq + Hash,
{
    let mut summary = DispatchSummary::default();
    for entity in observer.entities_inside(zone) {
        let Some(group) = entity_group(entity) else { continue };
        let transition = observer.apply_transition(entity, group, None);
        summary.record(transition);
    }
    observer.detach_zone(zone);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};
    use quickzone_geometry::{Extents, Shape, Transform};
    use quickzone_store::ZoneStore;

    fn zones(store: &mut ZoneStore, n: usize) -> Vec<ZoneId> {
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
    fn entering_observer_fires_entered_and_increments_group_counter() {
        let mut store = ZoneStore::new();
        let ids = zones(&mut store, 1);
        let group = GroupId(0);

        let mut observer = Observer::<u32>::new(quickzone_store::ObserverId(0), 0);
        observer.attach_zone(ids[0]);
        observer.subscribe(group);
        let entered = std::cell::Cell::new(0u32);
        let group_entered = std::cell::Cell::new(0u32);
        observer.set_on_entered(Box::new(|_, _| {
            entered.set(entered.get() + 1);
            None
        }));
        observer.set_on_group_entered(Box::new(|_, _| {
            group_entered.set(group_entered.get() + 1);
            None
        }));

        let mut observers = vec![&mut observer];
        let summary = dispatch_entity(1u32, group, &ids, observers.drain(..));
        assert_eq!(summary.entered, 1);
        assert_eq!(entered.get(), 1);
        assert_eq!(group_entered.get(), 1);
    }

    #[test]
    fn unsubscribed_observer_is_skipped() {
        let mut store = ZoneStore::new();
        let ids = zones(&mut store, 1);
        let group = GroupId(0);
        let other_group = GroupId(1);

        let mut observer = Observer::<u32>::new(quickzone_store::ObserverId(0), 0);
        observer.attach_zone(ids[0]);
        observer.subscribe(other_group);

        let mut observers = vec![&mut observer];
        let summary = dispatch_entity(1u32, group, &ids, observers.drain(..));
        assert_eq!(summary, DispatchSummary::default());
    }

    #[test]
    fn disabled_observer_is_skipped() {
        let mut store = ZoneStore::new();
        let ids = zones(&mut store, 1);
        let group = GroupId(0);

        let mut observer = Observer::<u32>::new(quickzone_store::ObserverId(0), 0);
        observer.attach_zone(ids[0]);
        observer.subscribe(group);
        observer.set_enabled(false);

        let mut observers = vec![&mut observer];
        let summary = dispatch_entity(1u32, group, &ids, observers.drain(..));
        assert_eq!(summary, DispatchSummary::default());
    }

    #[test]
    fn empty_hits_exits_a_previously_inside_observer() {
        let mut store = ZoneStore::new();
        let ids = zones(&mut store, 1);
        let group = GroupId(0);

        let mut observer = Observer::<u32>::new(quickzone_store::ObserverId(0), 0);
        observer.attach_zone(ids[0]);
        observer.subscribe(group);
        {
            let mut observers = vec![&mut observer];
            dispatch_entity(1u32, group, &ids, observers.drain(..));
        }

        let no_hits: Vec<ZoneId> = Vec::new();
        let mut observers = vec![&mut observer];
        let summary = dispatch_entity(1u32, group, &no_hits, observers.drain(..));
        assert_eq!(summary.exited, 1);
    }

    #[test]
    fn one_observer_panicking_does_not_block_the_next_observer() {
        let prev_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(|_| {}));

        let mut store = ZoneStore::new();
        let ids = zones(&mut store, 1);
        let group = GroupId(0);

        let mut panicking = Observer::<u32>::new(quickzone_store::ObserverId(0), 1);
        panicking.attach_zone(ids[0]);
        panicking.subscribe(group);
        panicking.set_on_entered(Box::new(|_, _| panic!("boom")));

        let mut healthy = Observer::<u32>::new(quickzone_store::ObserverId(1), 0);
        healthy.attach_zone(ids[0]);
        healthy.subscribe(group);
        let entered = std::cell::Cell::new(0u32);
        healthy.set_on_entered(Box::new(|_, _| {
            entered.set(entered.get() + 1);
            None
        }));

        let mut observers = vec![&mut panicking, &mut healthy];
        let summary = dispatch_entity(1u32, group, &ids, observers.drain(..));

        std::panic::set_hook(prev_hook);

        assert_eq!(summary.entered, 2);
        assert_eq!(entered.get(), 1);
    }
}
