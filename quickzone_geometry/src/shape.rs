// Copyright 2025 the QuickZone Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Convex shape tags and the point-in-shape / AABB-from-shape operations.

use glam::Vec3;

use crate::types::{Aabb3, Transform};

/// A convex volume kind. All hot paths switch on this tag directly rather than
/// going through dynamic dispatch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    /// An oriented box (the common "part" shape).
    Block,
    /// A sphere-like volume; only the largest extent is used as the diameter.
    Ball,
    /// A cylinder whose axis is the local Y axis.
    Cylinder,
    /// A right-triangular prism: an AABB cut by one diagonal half-space.
    Wedge,
}

/// Per-axis half-extents are stored pre-halved as `extents = size / 2` so hot paths
/// never divide by two. `ex`/`ey`/`ez` correspond to the zone's local X/Y/Z axes.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Extents {
    /// Half-size along the local X axis.
    pub ex: f32,
    /// Half-size along the local Y axis.
    pub ey: f32,
    /// Half-size along the local Z axis.
    pub ez: f32,
}

impl Extents {
    /// Builds half-extents from a full size vector (width, height, depth).
    #[inline]
    pub fn from_size(size: Vec3) -> Self {
        Self {
            ex: size.x * 0.5,
            ey: size.y * 0.5,
            ez: size.z * 0.5,
        }
    }

    #[inline]
    fn max_half(&self) -> f32 {
        self.ex.max(self.ey).max(self.ez)
    }
}

/// Computes the world-space AABB enclosing `shape` with the given `transform` and
/// `extents`. Always conservative: the returned AABB contains the shape but may be
/// larger (e.g. a Ball's AABB is the full bounding cube, not the tightest box).
pub fn aabb_of(shape: Shape, transform: &Transform, extents: Extents) -> Aabb3 {
    match shape {
        Shape::Block | Shape::Wedge => {
            let corners_local = [
                Vec3::new(-extents.ex, -extents.ey, -extents.ez),
                Vec3::new(extents.ex, -extents.ey, -extents.ez),
                Vec3::new(-extents.ex, extents.ey, -extents.ez),
                Vec3::new(extents.ex, extents.ey, -extents.ez),
                Vec3::new(-extents.ex, -extents.ey, extents.ez),
                Vec3::new(extents.ex, -extents.ey, extents.ez),
                Vec3::new(-extents.ex, extents.ey, extents.ez),
                Vec3::new(extents.ex, extents.ey, extents.ez),
            ];
            let mut aabb = Aabb3::empty();
            for c in corners_local {
                let w = transform.to_world(c);
                aabb.min = aabb.min.min(w);
                aabb.max = aabb.max.max(w);
            }
            aabb
        }
        Shape::Ball => {
            let r = extents.max_half();
            let half = Vec3::splat(r);
            Aabb3::new(transform.origin - half, transform.origin + half)
        }
        Shape::Cylinder => {
            let r = extents.ex.min(extents.ez);
            let corners_local = [
                Vec3::new(-r, -extents.ey, -r),
                Vec3::new(r, -extents.ey, -r),
                Vec3::new(-r, extents.ey, -r),
                Vec3::new(r, extents.ey, -r),
                Vec3::new(-r, -extents.ey, r),
                Vec3::new(r, -extents.ey, r),
                Vec3::new(-r, extents.ey, r),
                Vec3::new(r, extents.ey, r),
            ];
            let mut aabb = Aabb3::empty();
            for c in corners_local {
                let w = transform.to_world(c);
                aabb.min = aabb.min.min(w);
                aabb.max = aabb.max.max(w);
            }
            aabb
        }
    }
}

/// Exact point-in-shape test in world space.
pub fn contains(shape: Shape, transform: &Transform, extents: Extents, point: Vec3) -> bool {
    let local = transform.to_local(point);
    match shape {
        Shape::Block => {
            local.x.abs() <= extents.ex && local.y.abs() <= extents.ey && local.z.abs() <= extents.ez
        }
        Shape::Ball => {
            let r = extents.max_half();
            local.length_squared() <= r * r
        }
        Shape::Cylinder => {
            let r = extents.ex.min(extents.ez);
            local.y.abs() <= extents.ey && (local.x * local.x + local.z * local.z) <= r * r
        }
        Shape::Wedge => {
            let in_box = local.x.abs() <= extents.ex
                && local.y.abs() <= extents.ey
                && local.z.abs() <= extents.ez;
            if !in_box {
                return false;
            }
            // Diagonal half-space cutting the box along Y/Z, in the box's own
            // normalized [-1, 1] coordinates: y/ey + z/ez <= 1/2.
            let ny = if extents.ey > 0.0 { local.y / extents.ey } else { 0.0 };
            let nz = if extents.ez > 0.0 { local.z / extents.ez } else { 0.0 };
            ny + nz <= 0.5
        }
    }
}
