//! Physics engine interface and the default brute-force implementation.
//!
//! The engine is the world's factory for geometry and its raycasting
//! back-end. Geometry created for a body is returned as an owned
//! [`Geometry`]; callers that need a specific facet ask for it with a typed
//! capability query such as [`Geometry::multi_ray`], which fails with
//! [`PhysicsError::WrongGeometryKind`] instead of returning a null handle.

use std::fmt;
use std::str::FromStr;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::collision::{Collider, CollideMask, Collision, Surface};
use crate::error::PhysicsError;
use crate::multi_ray::MultiRayShape;
use crate::pose::Pose;
use crate::world::{BodyId, World};

// =============================================================================
// Rays
// =============================================================================

/// A half-line in the world frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    /// Start point
    pub origin: DVec3,
    /// Unit direction
    pub direction: DVec3,
}

impl Ray {
    /// Create a ray, normalizing the direction.
    #[must_use]
    pub fn new(origin: DVec3, direction: DVec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Point at distance `t` along the ray.
    #[must_use]
    pub fn at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }
}

/// Nearest surface found by a raycast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RayHit {
    /// Distance from the ray origin
    pub distance: f64,
    /// Surface properties of the hit collision
    pub surface: Surface,
    /// Body owning the collision, `None` for static geometry
    pub body: Option<BodyId>,
    /// Name of the hit collision
    pub collision: String,
}

// =============================================================================
// Geometry
// =============================================================================

/// Kinds of geometry an engine can create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    /// A fan of rays
    MultiRay,
    /// Unit box
    Box,
    /// Unit sphere
    Sphere,
    /// Plane with +Z normal
    Plane,
}

impl GeometryKind {
    /// Identifier used in descriptors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MultiRay => "multiray",
            Self::Box => "box",
            Self::Sphere => "sphere",
            Self::Plane => "plane",
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeometryKind {
    type Err = PhysicsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiray" => Ok(Self::MultiRay),
            "box" => Ok(Self::Box),
            "sphere" => Ok(Self::Sphere),
            "plane" => Ok(Self::Plane),
            other => Err(PhysicsError::UnknownGeometryKind(other.to_string())),
        }
    }
}

/// The shape held by a [`Geometry`].
#[derive(Debug, Clone)]
pub enum GeometryShape {
    /// Ray probe
    MultiRay(Box<MultiRayShape>),
    /// Solid collider
    Solid(Collision),
}

/// Geometry attached to a body, exclusively owned by its creator.
#[derive(Debug, Clone)]
pub struct Geometry {
    name: String,
    body: BodyId,
    shape: GeometryShape,
}

impl Geometry {
    /// Geometry name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the geometry.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The body this geometry is attached to.
    #[must_use]
    pub fn body(&self) -> BodyId {
        self.body
    }

    /// Kind of the held shape.
    #[must_use]
    pub fn kind(&self) -> GeometryKind {
        match &self.shape {
            GeometryShape::MultiRay(_) => GeometryKind::MultiRay,
            GeometryShape::Solid(collision) => solid_kind(collision),
        }
    }

    /// The held shape.
    #[must_use]
    pub fn shape(&self) -> &GeometryShape {
        &self.shape
    }

    /// The ray-probe facet.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::WrongGeometryKind`] for non-probe geometry.
    pub fn multi_ray(&self) -> Result<&MultiRayShape, PhysicsError> {
        match &self.shape {
            GeometryShape::MultiRay(shape) => Ok(&**shape),
            GeometryShape::Solid(collision) => Err(wrong_kind(&self.name, solid_kind(collision))),
        }
    }

    /// Mutable ray-probe facet.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::WrongGeometryKind`] for non-probe geometry.
    pub fn multi_ray_mut(&mut self) -> Result<&mut MultiRayShape, PhysicsError> {
        let Self { name, shape, .. } = self;
        match shape {
            GeometryShape::MultiRay(shape) => Ok(&mut **shape),
            GeometryShape::Solid(collision) => Err(wrong_kind(name, solid_kind(collision))),
        }
    }
}

fn solid_kind(collision: &Collision) -> GeometryKind {
    match collision.collider {
        Collider::Cuboid { .. } => GeometryKind::Box,
        Collider::Sphere { .. } => GeometryKind::Sphere,
        Collider::Plane { .. } => GeometryKind::Plane,
    }
}

fn wrong_kind(name: &str, found: GeometryKind) -> PhysicsError {
    PhysicsError::WrongGeometryKind {
        name: name.to_string(),
        expected: GeometryKind::MultiRay.as_str(),
        found: found.as_str(),
    }
}

// =============================================================================
// Physics Engine
// =============================================================================

/// Geometry factory and raycasting back-end of a world.
///
/// Engines hold no per-world state; the world is passed to every call.
pub trait PhysicsEngine: Send + Sync {
    /// Engine name, for diagnostics.
    fn name(&self) -> &'static str;

    /// Create geometry of `kind` attached to `body`.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::BodyNotFound`] if the body is not in `world`.
    fn create_geometry(
        &self,
        world: &World,
        kind: GeometryKind,
        body: BodyId,
        name: &str,
    ) -> Result<Geometry, PhysicsError>;

    /// Find the nearest surface along `ray` with distance in `[near, far]`.
    ///
    /// Only collisions whose category intersects `mask` are considered, and
    /// collisions of the `exclude` body are skipped.
    fn cast_ray(
        &self,
        world: &World,
        ray: &Ray,
        near: f64,
        far: f64,
        mask: CollideMask,
        exclude: Option<BodyId>,
    ) -> Option<RayHit>;
}

/// Tests every collision in the world against every ray.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceEngine;

impl BruteForceEngine {
    /// Create the engine.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl PhysicsEngine for BruteForceEngine {
    fn name(&self) -> &'static str {
        "brute-force"
    }

    fn create_geometry(
        &self,
        world: &World,
        kind: GeometryKind,
        body: BodyId,
        name: &str,
    ) -> Result<Geometry, PhysicsError> {
        if world.body(body).is_none() {
            return Err(PhysicsError::BodyNotFound(body));
        }

        let shape = match kind {
            GeometryKind::MultiRay => GeometryShape::MultiRay(Box::new(MultiRayShape::new(body))),
            GeometryKind::Box => GeometryShape::Solid(Collision::new(
                name,
                Collider::Cuboid {
                    half_extents: DVec3::splat(0.5),
                },
                Pose::IDENTITY,
            )),
            GeometryKind::Sphere => GeometryShape::Solid(Collision::new(
                name,
                Collider::Sphere { radius: 0.5 },
                Pose::IDENTITY,
            )),
            GeometryKind::Plane => GeometryShape::Solid(Collision::new(
                name,
                Collider::Plane { normal: DVec3::Z },
                Pose::IDENTITY,
            )),
        };

        Ok(Geometry {
            name: name.to_string(),
            body,
            shape,
        })
    }

    fn cast_ray(
        &self,
        world: &World,
        ray: &Ray,
        near: f64,
        far: f64,
        mask: CollideMask,
        exclude: Option<BodyId>,
    ) -> Option<RayHit> {
        let statics = world
            .static_collisions()
            .iter()
            .map(|collision| (None, Pose::IDENTITY, collision));
        let attached = world
            .bodies()
            .filter(|body| Some(body.id()) != exclude)
            .flat_map(|body| {
                body.collisions()
                    .iter()
                    .map(move |collision| (Some(body.id()), body.world_pose(), collision))
            });

        statics
            .chain(attached)
            .filter(|(_, _, collision)| collision.category.intersects(mask))
            .filter_map(|(body, owner, collision)| {
                let t = collision.intersect(&owner, ray.origin, ray.direction)?;
                (near..=far).contains(&t).then_some((t, body, collision))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(distance, body, collision)| RayHit {
                distance,
                surface: collision.surface,
                body,
                collision: collision.name.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_with_wall() -> (World, BodyId) {
        let mut world = World::new("default");
        let robot = world.add_model("robot", Pose::IDENTITY);
        let base = world.add_body(robot, "base", Pose::IDENTITY);
        world.add_static(
            Collision::new(
                "wall",
                Collider::Cuboid {
                    half_extents: DVec3::new(0.05, 0.5, 0.5),
                },
                Pose::from_position(DVec3::new(3.05, 0.0, 0.0)),
            )
            .with_surface(0.8, 4),
        );
        (world, base)
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("multiray".parse::<GeometryKind>().unwrap(), GeometryKind::MultiRay);
        assert!(matches!(
            "laser".parse::<GeometryKind>(),
            Err(PhysicsError::UnknownGeometryKind(ref kind)) if kind == "laser"
        ));
    }

    #[test]
    fn test_create_geometry_requires_body() {
        let (world, base) = world_with_wall();
        let engine = BruteForceEngine::new();

        let geometry = engine
            .create_geometry(&world, GeometryKind::MultiRay, base, "probe")
            .unwrap();
        assert_eq!(geometry.name(), "probe");
        assert_eq!(geometry.body(), base);
        assert!(geometry.multi_ray().is_ok());

        assert!(matches!(
            engine.create_geometry(&world, GeometryKind::MultiRay, BodyId::new(42), "probe"),
            Err(PhysicsError::BodyNotFound(_))
        ));
    }

    #[test]
    fn test_capability_query_reports_wrong_kind() {
        let (world, base) = world_with_wall();
        let mut geometry = BruteForceEngine
            .create_geometry(&world, GeometryKind::Sphere, base, "ball")
            .unwrap();
        assert_eq!(geometry.kind(), GeometryKind::Sphere);
        assert!(matches!(
            geometry.multi_ray_mut(),
            Err(PhysicsError::WrongGeometryKind { found: "sphere", .. })
        ));
    }

    #[test]
    fn test_cast_ray_hits_wall() {
        let (world, _) = world_with_wall();
        let hit = BruteForceEngine
            .cast_ray(
                &world,
                &Ray::new(DVec3::ZERO, DVec3::X),
                0.1,
                10.0,
                CollideMask::all(),
                None,
            )
            .unwrap();
        assert!((hit.distance - 3.0).abs() < 1e-9);
        assert_eq!(hit.surface.fiducial, 4);
        assert_eq!(hit.collision, "wall");
        assert!(hit.body.is_none());
    }

    #[test]
    fn test_cast_ray_respects_range_and_mask() {
        let (world, _) = world_with_wall();
        let ray = Ray::new(DVec3::ZERO, DVec3::X);
        assert!(BruteForceEngine
            .cast_ray(&world, &ray, 0.1, 2.0, CollideMask::all(), None)
            .is_none());
        assert!(BruteForceEngine
            .cast_ray(&world, &ray, 0.1, 10.0, CollideMask::LINK, None)
            .is_none());
    }

    #[test]
    fn test_cast_ray_skips_excluded_body() {
        let (mut world, base) = world_with_wall();
        world
            .attach_collision(
                base,
                Collision::new(
                    "hull",
                    Collider::Sphere { radius: 0.2 },
                    Pose::from_position(DVec3::new(1.0, 0.0, 0.0)),
                )
                .with_category(CollideMask::LINK),
            )
            .unwrap();
        let ray = Ray::new(DVec3::ZERO, DVec3::X);

        let hit = BruteForceEngine
            .cast_ray(&world, &ray, 0.0, 10.0, CollideMask::all(), None)
            .unwrap();
        assert_eq!(hit.body, Some(base));
        assert!((hit.distance - 0.8).abs() < 1e-9);

        let hit = BruteForceEngine
            .cast_ray(&world, &ray, 0.0, 10.0, CollideMask::all(), Some(base))
            .unwrap();
        assert_eq!(hit.collision, "wall");
    }
}
