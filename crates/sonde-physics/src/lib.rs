//! # Sonde Physics
//!
//! Static-geometry substrate for ray-based proximity sensing.
//!
//! This crate provides the collaborators a ray sensor binds to:
//!
//! - **Scene descriptors** ([`sdf`]): hierarchical element trees describing
//!   worlds, models, links and the sensors attached to them
//! - **Worlds** ([`world`]): named registries of models and bodies with their
//!   world poses and collision geometry
//! - **Physics engines** ([`engine`]): geometry creation and raycasting
//! - **Multi-ray probes** ([`multi_ray`]): configurable fans of rays producing
//!   per-ray range, retro and fiducial readings
//!
//! ## Quick Start
//!
//! ```
//! use sonde_physics::{Collider, Collision, Pose, World};
//! use glam::DVec3;
//!
//! let mut world = World::new("default");
//! let model = world.add_model("robot", Pose::IDENTITY);
//! let body = world.add_body(model, "base", Pose::IDENTITY);
//!
//! assert_eq!(world.body(body).map(|b| b.scoped_name()), Some("root::robot::base"));
//!
//! world.add_static(Collision::new(
//!     "wall",
//!     Collider::Cuboid { half_extents: DVec3::new(0.05, 0.5, 0.5) },
//!     Pose::from_position(DVec3::new(3.05, 0.0, 0.0)),
//! ));
//! assert_eq!(world.static_collisions().len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod collision;
pub mod engine;
pub mod error;
pub mod multi_ray;
pub mod pose;
pub mod sdf;
pub mod world;

use std::fmt;

use serde::{Deserialize, Serialize};

// Re-exports for convenience
pub use collision::{Collider, CollideMask, Collision, Surface};
pub use engine::{
    BruteForceEngine, Geometry, GeometryKind, GeometryShape, PhysicsEngine, Ray, RayHit,
};
pub use error::{ConfigError, DescriptorError, PhysicsError};
pub use multi_ray::{MultiRayConfig, MultiRayShape, RayReading, MAX_RAYS};
pub use pose::Pose;
pub use sdf::{Element, ElementId, ElementSpec, SceneDescriptor};
pub use world::{Body, BodyId, Model, ModelId, World, WorldRegistry};

/// Plane angle in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Angle(f64);

impl Angle {
    /// The zero angle.
    pub const ZERO: Self = Self(0.0);

    /// Creates an angle from radians.
    #[must_use]
    pub const fn from_radians(radians: f64) -> Self {
        Self(radians)
    }

    /// Creates an angle from degrees.
    #[must_use]
    pub fn from_degrees(degrees: f64) -> Self {
        Self(degrees.to_radians())
    }

    /// Returns the angle in radians.
    #[must_use]
    pub const fn radians(self) -> f64 {
        self.0
    }

    /// Returns the angle in degrees.
    #[must_use]
    pub fn degrees(self) -> f64 {
        self.0.to_degrees()
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rad", self.0)
    }
}

impl From<f64> for Angle {
    fn from(radians: f64) -> Self {
        Self(radians)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angle_conversions() {
        let angle = Angle::from_degrees(180.0);
        assert!((angle.radians() - std::f64::consts::PI).abs() < 1e-12);
        assert!((Angle::from_radians(std::f64::consts::FRAC_PI_2).degrees() - 90.0).abs() < 1e-12);
    }

    #[test]
    fn test_angle_ordering() {
        assert!(Angle::from_radians(-1.57) < Angle::from_radians(1.57));
        assert_eq!(Angle::default(), Angle::ZERO);
    }
}
