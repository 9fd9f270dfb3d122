// Copyright 2025 the QuickZone Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typed errors for group construction and membership changes.

/// Errors a [`crate::Group`] call can fail with.
#[derive(Debug, thiserror::Error)]
pub enum EntitiesError {
    /// `updateRate` must be strictly positive.
    #[error("update rate must be > 0 Hz, got {0}")]
    InvalidUpdateRate(f32),
    /// `precision` must be non-negative.
    #[error("precision must be >= 0, got {0}")]
    InvalidPrecision(f32),
    /// The handle is already a member of this group.
    #[error("entity is already a member of this group")]
    DuplicateHandle,
    /// The handle is not a member of this group.
    #[error("entity is not a member of this group")]
    UnknownHandle,
}
