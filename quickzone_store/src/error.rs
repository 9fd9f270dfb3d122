// Copyright 2025 the QuickZone Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typed errors for zone construction and mutation.

/// Errors a [`crate::ZoneStore`] call can fail with. Never raised for callback
/// failures — those are caught and logged at the dispatch boundary, not here.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A vector or scalar argument was non-finite (NaN or infinite).
    #[error("non-finite value in {field}")]
    NonFinite {
        /// Name of the offending field, for diagnostics.
        field: &'static str,
    },
    /// An extent was not strictly positive.
    #[error("extents must be positive on every axis, got {0:?}")]
    InvalidExtents(glam::Vec3),
    /// The operation targeted a zone id that no longer exists (destroyed, or never
    /// existed in this store).
    #[error("zone is destroyed or unknown")]
    Destroyed,
    /// A mutation was attempted on a static zone, whose AABB must stay immutable
    /// after creation.
    #[error("cannot mutate a static zone after creation")]
    StaticZoneImmutable,
}
