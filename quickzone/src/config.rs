// Copyright 2025 the QuickZone Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Engine construction parameters.

use std::time::Duration;

use crate::error::QuickZoneError;

/// Parameters the engine is constructed with. Validated at construction and
/// whenever [`crate::Engine::set_frame_budget`] changes the budget afterward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Per-tick wall-clock budget. Default 1 ms.
    pub frame_budget: Duration,
    /// Update rate new groups get when created through a convenience
    /// constructor that doesn't take an explicit rate. Default 30 Hz.
    pub default_update_rate_hz: f32,
    /// Movement-filter precision new groups get under the same convenience
    /// constructors. Default 0 (always query).
    pub default_precision: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_budget: Duration::from_micros(1_000),
            default_update_rate_hz: 30.0,
            default_precision: 0.0,
        }
    }
}

impl EngineConfig {
    pub(crate) fn validate(&self) -> Result<(), QuickZoneError> {
        if self.frame_budget.is_zero() {
            return Err(QuickZoneError::InvalidArgument("frame_budget must be non-zero".to_string()));
        }
        if !(self.default_update_rate_hz > 0.0) {
            return Err(QuickZoneError::InvalidArgument(format!(
                "default_update_rate_hz must be > 0, got {}",
                self.default_update_rate_hz
            )));
        }
        if !(self.default_precision >= 0.0) {
            return Err(QuickZoneError::InvalidArgument(format!(
                "default_precision must be >= 0, got {}",
                self.default_precision
            )));
        }
        Ok(())
    }
}
