// Copyright 2025 the QuickZone Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! 3D AABB math and convex-shape containment tests.
//!
//! This crate has no notion of zones, entities, or ticks — it is pure geometry:
//! an [`Aabb3`] type, a [`Transform`] (origin + orthonormal basis), a [`Shape`] tag
//! for the four supported convex primitives, and the two operations higher layers
//! build on: [`aabb_of`] (conservative world AABB for a shape) and [`contains`]
//! (exact point-in-shape test). Every test here runs with no heap allocation.

mod shape;
mod types;

pub use shape::{Extents, Shape, aabb_of, contains};
pub use types::{Aabb3, Transform};
