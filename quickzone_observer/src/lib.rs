// Copyright 2025 the QuickZone Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The Observer state machine: per-(observer, entity) INSIDE/OUTSIDE tracking,
//! priority-ordered winner selection among an observer's attached zones, and
//! per-(observer, group) enter/exit reference counting.
//!
//! [`Observer`] owns the user-registered callbacks and invokes them itself
//! through [`Observer::apply_transition`], catching panics at each callback
//! boundary so one failing callback never stops the others from running.
//! [`quickzone_dispatch`] drives this per tick: it computes the containment
//! query result set, intersects it with each subscribed observer's attached
//! zones, resolves the winner, and calls into this state machine.

mod observer;

pub use observer::{
    Cleanup, EnterCallback, ExitCallback, GroupEnterCallback, GroupExitCallback, Observer,
    Transition,
};
