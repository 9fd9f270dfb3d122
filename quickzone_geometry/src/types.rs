// Copyright 2025 the QuickZone Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Primitive 3D geometry types.

use glam::{Quat, Vec3};

/// Axis-aligned bounding box in world space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb3 {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb3 {
    /// Creates an AABB from min/max corners.
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// An AABB that contains nothing; any `union` with it returns the other operand unchanged.
    #[inline]
    pub const fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(f32::MIN),
        }
    }

    /// Whether this AABB contains the point (boundary-inclusive).
    #[inline]
    pub fn contains_point(&self, p: Vec3) -> bool {
        self.min.x <= p.x
            && p.x <= self.max.x
            && self.min.y <= p.y
            && p.y <= self.max.y
            && self.min.z <= p.z
            && p.z <= self.max.z
    }

    /// Whether this AABB overlaps another (edges touching counts as overlap).
    #[inline]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// The smallest AABB enclosing both operands.
    #[inline]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Whether this AABB is empty (inverted or zero-extent on any axis).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.max.x <= self.min.x || self.max.y <= self.min.y || self.max.z <= self.min.z
    }

    /// Center of the AABB.
    #[inline]
    pub fn center(&self) -> Vec3 {
        0.5 * (self.min + self.max)
    }

    /// Expands the AABB by `amount` on every axis, in both directions.
    #[inline]
    pub fn inflate(&self, amount: f32) -> Self {
        let v = Vec3::splat(amount);
        Self {
            min: self.min - v,
            max: self.max + v,
        }
    }
}

/// A rigid transform: world-space origin plus an orthonormal basis, expressed as a
/// rotation quaternion. Zones have no shear or non-uniform world scale beyond their
/// per-axis `extents`, so a quaternion plus a translation is a complete description.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    /// World-space origin of the local frame.
    pub origin: Vec3,
    /// Orientation of the local frame relative to world axes.
    pub rotation: Quat,
}

impl Transform {
    /// The identity transform: local frame coincides with world axes at the world origin.
    #[inline]
    pub const fn identity() -> Self {
        Self {
            origin: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }

    /// Creates a transform from an origin and rotation.
    #[inline]
    pub const fn new(origin: Vec3, rotation: Quat) -> Self {
        Self { origin, rotation }
    }

    /// Transforms a world-space point into this frame's local space.
    #[inline]
    pub fn to_local(&self, world_point: Vec3) -> Vec3 {
        self.rotation.inverse() * (world_point - self.origin)
    }

    /// Transforms a local-space point into world space.
    #[inline]
    pub fn to_world(&self, local_point: Vec3) -> Vec3 {
        self.origin + self.rotation * local_point
    }

    /// The three local basis axes, expressed in world space.
    #[inline]
    pub fn basis(&self) -> [Vec3; 3] {
        [
            self.rotation * Vec3::X,
            self.rotation * Vec3::Y,
            self.rotation * Vec3::Z,
        ]
    }
}
