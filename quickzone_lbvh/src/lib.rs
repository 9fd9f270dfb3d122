// Copyright 2025 the QuickZone Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A Linear Bounding Volume Hierarchy (LBVH) over zone AABBs.
//!
//! Leaves are staged via [`Lbvh::insert`]/[`Lbvh::update`]/[`Lbvh::remove`] and take
//! effect on [`Lbvh::commit`], which decides between a cheap in-place refit and a full
//! Morton-sort rebuild per the rule in the LBVH component design, and returns which one
//! it performed. [`Lbvh::stab`] runs an iterative stabbing query with a reused scratch
//! stack, returning every leaf id whose AABB contains a point.
//!
//! This crate owns no notion of "zone" beyond an opaque `u32` id; [`quickzone_store`]
//! is the layer that maps zone records onto two of these trees (static and dynamic).

mod morton;
mod radix;
mod tree;

pub use tree::{BuildAction, Lbvh};
