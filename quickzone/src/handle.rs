// Copyright 2025 the QuickZone Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Opaque entity handles.

/// An opaque entity handle, supplied by the host and never interpreted by the
/// engine. A single `EntityHandle` space is shared across every group; an
/// entity belongs to at most one group at a time.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle(pub u64);
