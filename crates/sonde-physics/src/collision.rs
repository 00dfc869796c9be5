//! Collision geometry that rays can hit.

use bitflags::bitflags;
use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::pose::Pose;

bitflags! {
    /// Collision categories.
    ///
    /// A ray only considers collisions whose category intersects the
    /// probe's collide mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CollideMask: u32 {
        /// Fixed world geometry
        const STATIC = 1 << 0;
        /// Geometry attached to model links
        const LINK = 1 << 1;
        /// Geometry that only sensors should see
        const SENSOR_ONLY = 1 << 2;
    }
}

impl Default for CollideMask {
    fn default() -> Self {
        Self::all()
    }
}

/// Primitive solid in its own frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Collider {
    /// Infinite plane through the origin with the given normal
    Plane {
        /// Surface normal (need not be unit length)
        normal: DVec3,
    },
    /// Sphere centred on the origin
    Sphere {
        /// Radius
        radius: f64,
    },
    /// Axis-aligned box centred on the origin
    Cuboid {
        /// Half of the box size along each axis
        half_extents: DVec3,
    },
}

impl Collider {
    /// Distance along a unit ray (in the collider's frame) to the first
    /// surface in front of the origin.
    ///
    /// Rays starting inside a sphere or box do not report that solid.
    #[must_use]
    pub fn intersect_local(&self, origin: DVec3, direction: DVec3) -> Option<f64> {
        match *self {
            Collider::Plane { normal } => {
                let n = normal.try_normalize()?;
                let denom = direction.dot(n);
                if denom.abs() < 1e-12 {
                    return None;
                }
                let t = -origin.dot(n) / denom;
                (t >= 0.0).then_some(t)
            }
            Collider::Sphere { radius } => {
                let b = origin.dot(direction);
                let c = origin.length_squared() - radius * radius;
                if c < 0.0 {
                    return None;
                }
                let disc = b * b - c;
                if disc < 0.0 {
                    return None;
                }
                let t = -b - disc.sqrt();
                (t >= 0.0).then_some(t)
            }
            Collider::Cuboid { half_extents } => {
                let mut t_min = f64::NEG_INFINITY;
                let mut t_max = f64::INFINITY;
                for axis in 0..3 {
                    let o = origin[axis];
                    let d = direction[axis];
                    let h = half_extents[axis];
                    if d.abs() < 1e-12 {
                        if o < -h || o > h {
                            return None;
                        }
                        continue;
                    }
                    let t1 = (-h - o) / d;
                    let t2 = (h - o) / d;
                    t_min = t_min.max(t1.min(t2));
                    t_max = t_max.min(t1.max(t2));
                }
                (t_min <= t_max && t_min >= 0.0).then_some(t_min)
            }
        }
    }

    /// Short lowercase name of the primitive.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Collider::Plane { .. } => "plane",
            Collider::Sphere { .. } => "sphere",
            Collider::Cuboid { .. } => "box",
        }
    }
}

/// Optical properties reported to rays that hit a surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    /// Reflected intensity
    pub retro: f64,
    /// Identification tag, `-1` when untagged
    pub fiducial: i32,
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            retro: 0.0,
            fiducial: -1,
        }
    }
}

/// A named, posed collider with surface properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collision {
    /// Name, unique within its owner
    pub name: String,
    /// Solid
    pub collider: Collider,
    /// Pose relative to the owning body (or the world for static geometry)
    pub pose: Pose,
    /// Surface properties
    pub surface: Surface,
    /// Category used for ray filtering
    pub category: CollideMask,
}

impl Collision {
    /// Create a collision with default surface and `STATIC` category.
    #[must_use]
    pub fn new(name: impl Into<String>, collider: Collider, pose: Pose) -> Self {
        Self {
            name: name.into(),
            collider,
            pose,
            surface: Surface::default(),
            category: CollideMask::STATIC,
        }
    }

    /// Set the surface properties.
    #[must_use]
    pub fn with_surface(mut self, retro: f64, fiducial: i32) -> Self {
        self.surface = Surface { retro, fiducial };
        self
    }

    /// Set the category.
    #[must_use]
    pub fn with_category(mut self, category: CollideMask) -> Self {
        self.category = category;
        self
    }

    /// Intersect a world-frame unit ray, given the pose of the owning frame.
    #[must_use]
    pub fn intersect(&self, owner: &Pose, origin: DVec3, direction: DVec3) -> Option<f64> {
        let to_local = (*owner * self.pose).inverse();
        self.collider
            .intersect_local(to_local.transform_point(origin), to_local.rotate_vector(direction))
    }
}
