// Copyright 2025 the QuickZone Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A point-in-zone containment engine.
//!
//! [`Engine`] owns a set of zones (spatially indexed by a static and a dynamic
//! tree), a set of scheduled entity groups, and a set of observers watching
//! combinations of the two. Call [`Engine::tick`] once per frame; everything
//! else is immediate, ordinary method calls that stage state for the next tick
//! (or, for [`Engine::zones_at_point`], run an out-of-band query against the
//! current committed state).
//!
//! The crate is organized the way the engine itself is layered:
//! `quickzone_geometry` (shape math) under `quickzone_lbvh` (spatial index)
//! under `quickzone_store` (zone lifecycle) alongside `quickzone_entities`
//! (scheduled entity groups) and `quickzone_observer` (per-entity enter/exit
//! state machines), tied together per tick by `quickzone_scheduler` and
//! `quickzone_dispatch`. This crate is the facade over all of them.

mod config;
mod engine;
mod error;
mod handle;
mod player;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::QuickZoneError;
pub use handle::EntityHandle;
pub use player::PlayerFeed;

pub use quickzone_entities::{GroupId, Probe};
pub use quickzone_geometry::{Aabb3, Extents, Shape, Transform};
pub use quickzone_observer::{Cleanup, Transition};
pub use quickzone_scheduler::TickReport;
pub use quickzone_store::{ObserverId, ZoneId};

/// An `onEntered`/`observe` callback for this engine's entity handles.
pub type EnterCallback = quickzone_observer::EnterCallback<EntityHandle>;
/// An `onExited` callback for this engine's entity handles.
pub type ExitCallback = quickzone_observer::ExitCallback<EntityHandle>;
/// An `onGroupEntered`/`observeGroup` callback.
pub type GroupEnterCallback = quickzone_observer::GroupEnterCallback;
/// An `onGroupExited` callback.
pub type GroupExitCallback = quickzone_observer::GroupExitCallback;
