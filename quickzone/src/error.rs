// Copyright 2025 the QuickZone Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The engine's public error type.

/// Errors the engine can return synchronously from a public call. Callback
/// panics are never surfaced here — they are caught, logged, and suppressed
/// at the dispatch boundary (see [`quickzone_dispatch`]); `CallbackFailure` only
/// exists so the logger hook and tests can name that failure mode uniformly.
#[derive(Debug, thiserror::Error)]
pub enum QuickZoneError {
    /// A non-finite value, an out-of-range rate/precision, or similar bad input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// An operation on a zone or entity that no longer exists.
    #[error("lifecycle error: {0}")]
    Lifecycle(String),
    /// A user callback panicked. Carried for logging only; never returned from
    /// a call the host made directly, since callbacks run on the engine's own
    /// schedule rather than synchronously under host code.
    #[error("callback failed: {0}")]
    CallbackFailure(String),
}

impl From<quickzone_store::StoreError> for QuickZoneError {
    fn from(err: quickzone_store::StoreError) -> Self {
        match err {
            quickzone_store::StoreError::Destroyed => {
                Self::Lifecycle("operation on a destroyed zone".to_string())
            }
            quickzone_store::StoreError::StaticZoneImmutable => {
                Self::InvalidArgument("static zones cannot be mutated after creation".to_string())
            }
            other => Self::InvalidArgument(other.to_string()),
        }
    }
}

impl From<quickzone_entities::EntitiesError> for QuickZoneError {
    fn from(err: quickzone_entities::EntitiesError) -> Self {
        match err {
            quickzone_entities::EntitiesError::UnknownHandle => {
                Self::Lifecycle("operation on an entity not in this group".to_string())
            }
            other => Self::InvalidArgument(other.to_string()),
        }
    }
}
