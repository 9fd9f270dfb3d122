// Copyright 2025 the QuickZone Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host-supplied player lifecycle feed.
//!
//! This workspace has no Roblox `Players` service (or any host) to bind to, so
//! `Group::players`/`Group::local_player` are realized as a plain [`Group`]
//! (see [`crate::Engine::create_players_group`]/[`crate::Engine::create_local_player_group`])
//! kept in sync with the host's own join/leave bookkeeping through this trait,
//! rather than a concrete binding this crate would otherwise have no way to
//! implement.

use crate::handle::EntityHandle;
use quickzone_entities::Probe;

/// A host-supplied feed of player join/leave notifications. The engine polls
/// this once per tick (via [`crate::Engine::sync_player_group`]) rather than
/// subscribing to host events itself; this workspace ships no implementation.
pub trait PlayerFeed {
    /// Entities that joined since the last poll, each paired with the position
    /// probe the engine should use for it going forward.
    fn poll_joined(&mut self) -> Vec<(EntityHandle, Probe)>;
    /// Entities that left since the last poll. A local-player respawn is
    /// reported as a leave of the old handle followed by a join of a fresh one.
    fn poll_left(&mut self) -> Vec<EntityHandle>;
}
