//! Worlds, models and bodies.
//!
//! A [`World`] owns the physical description of one simulated scene: its
//! models, their links (bodies) with world poses and attached collisions, and
//! free-standing static geometry. Bodies are addressed by [`BodyId`] or by
//! their scoped name `root::<model>::<link>`.
//!
//! Worlds are kept in a [`WorldRegistry`] that callers pass explicitly to
//! whatever needs to resolve names; there is no process-wide world table.
//!
//! # Example
//!
//! ```
//! use sonde_physics::{Pose, World, WorldRegistry};
//!
//! let mut world = World::new("default");
//! let robot = world.add_model("robot", Pose::IDENTITY);
//! let base = world.add_body(robot, "base", Pose::IDENTITY);
//!
//! let mut worlds = WorldRegistry::new();
//! worlds.insert(world);
//!
//! let world = worlds.get("default").unwrap();
//! assert_eq!(world.body_by_scoped_name("root::robot::base").map(|b| b.id()), Some(base));
//! assert!(world.model_by_name("robot").is_some());
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::collision::{Collider, CollideMask, Collision};
use crate::engine::{BruteForceEngine, PhysicsEngine};
use crate::error::{ConfigError, DescriptorError, PhysicsError};
use crate::pose::Pose;
use crate::sdf::{Element, SceneDescriptor};

/// Prefix of every scoped body name.
pub const SCOPE_ROOT: &str = "root";

/// Separator between scope components.
pub const SCOPE_DELIMITER: &str = "::";

/// Compose the scoped name of a link: `root::<model>::<link>`.
#[must_use]
pub fn scoped_name(model: &str, link: &str) -> String {
    format!("{SCOPE_ROOT}{SCOPE_DELIMITER}{model}{SCOPE_DELIMITER}{link}")
}

// =============================================================================
// Identifiers
// =============================================================================

/// Identifier of a body within its world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BodyId(u32);

impl BodyId {
    /// Create an id from its raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body#{}", self.0)
    }
}

/// Identifier of a model within its world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModelId(u32);

impl ModelId {
    /// Raw value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model#{}", self.0)
    }
}

// =============================================================================
// Body & Model
// =============================================================================

/// A rigid body (link) with its world pose and collisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    id: BodyId,
    model: ModelId,
    name: String,
    scoped_name: String,
    pose: Pose,
    collisions: Vec<Collision>,
}

impl Body {
    /// Id of this body.
    #[must_use]
    pub fn id(&self) -> BodyId {
        self.id
    }

    /// Owning model.
    #[must_use]
    pub fn model(&self) -> ModelId {
        self.model
    }

    /// Link name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scoped name, `root::<model>::<link>`.
    #[must_use]
    pub fn scoped_name(&self) -> &str {
        &self.scoped_name
    }

    /// Current pose in the world frame.
    #[must_use]
    pub fn world_pose(&self) -> Pose {
        self.pose
    }

    /// Collisions attached to this body.
    #[must_use]
    pub fn collisions(&self) -> &[Collision] {
        &self.collisions
    }
}

/// A named group of bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    id: ModelId,
    name: String,
    pose: Pose,
    bodies: Vec<BodyId>,
}

impl Model {
    /// Id of this model.
    #[must_use]
    pub fn id(&self) -> ModelId {
        self.id
    }

    /// Model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pose of the model frame in the world.
    #[must_use]
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Bodies belonging to this model, in creation order.
    #[must_use]
    pub fn bodies(&self) -> &[BodyId] {
        &self.bodies
    }
}

// =============================================================================
// World
// =============================================================================

/// One simulated scene.
#[derive(Clone)]
pub struct World {
    name: String,
    models: BTreeMap<ModelId, Model>,
    bodies: BTreeMap<BodyId, Body>,
    by_scoped_name: HashMap<String, BodyId>,
    static_collisions: Vec<Collision>,
    engine: Arc<dyn PhysicsEngine>,
    next_model: u32,
    next_body: u32,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("name", &self.name)
            .field("models", &self.models.len())
            .field("bodies", &self.bodies.len())
            .field("static_collisions", &self.static_collisions.len())
            .field("engine", &self.engine.name())
            .finish()
    }
}

impl World {
    /// Create an empty world using the [`BruteForceEngine`].
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_engine(name, Arc::new(BruteForceEngine::new()))
    }

    /// Create an empty world with a specific physics engine.
    #[must_use]
    pub fn with_engine(name: impl Into<String>, engine: Arc<dyn PhysicsEngine>) -> Self {
        Self {
            name: name.into(),
            models: BTreeMap::new(),
            bodies: BTreeMap::new(),
            by_scoped_name: HashMap::new(),
            static_collisions: Vec::new(),
            engine,
            next_model: 0,
            next_body: 0,
        }
    }

    /// Build a world from a `world` descriptor element.
    ///
    /// Every `model` becomes a model, every `link` inside it a body, and every
    /// `collision` inside a link a collider attached to that body.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::Descriptor`] for malformed attributes and
    /// [`PhysicsError::Config`] for collision elements without a usable
    /// geometry.
    pub fn load(element: Element<'_>) -> Result<Self, PhysicsError> {
        let name = element.value_string("name").unwrap_or_default();
        let mut world = Self::new(name);

        for model_el in element.children().filter(|e| e.name() == "model") {
            let model_name = model_el.value_string("name").unwrap_or_default();
            let model_pose = model_el.pose_value("pose")?.unwrap_or_default();
            let model = world.add_model(model_name, model_pose);

            for link_el in model_el.children().filter(|e| e.name() == "link") {
                let link_name = link_el.value_string("name").unwrap_or_default();
                let link_pose = link_el.pose_value("pose")?.unwrap_or_default();
                let body = world.add_body(model, link_name, model_pose * link_pose);

                for collision_el in link_el.children().filter(|e| e.name() == "collision") {
                    let collision = load_collision(collision_el, CollideMask::LINK)?;
                    world.attach_collision(body, collision)?;
                }
            }
        }

        for collision_el in element.children().filter(|e| e.name() == "collision") {
            world.add_static(load_collision(collision_el, CollideMask::STATIC)?);
        }

        debug!(
            world = %world.name,
            models = world.models.len(),
            bodies = world.bodies.len(),
            "world loaded"
        );
        Ok(world)
    }

    /// World name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The physics engine of this world.
    #[must_use]
    pub fn physics_engine(&self) -> &Arc<dyn PhysicsEngine> {
        &self.engine
    }

    /// Add a model and return its id.
    pub fn add_model(&mut self, name: impl Into<String>, pose: Pose) -> ModelId {
        let id = ModelId(self.next_model);
        self.next_model += 1;
        self.models.insert(
            id,
            Model {
                id,
                name: name.into(),
                pose,
                bodies: Vec::new(),
            },
        );
        id
    }

    /// Add a body to a model at the given world pose and return its id.
    ///
    /// # Panics
    ///
    /// Panics if `model` does not belong to this world.
    pub fn add_body(&mut self, model: ModelId, name: impl Into<String>, pose: Pose) -> BodyId {
        let id = BodyId(self.next_body);
        self.next_body += 1;
        let name = name.into();
        let owner = self
            .models
            .get_mut(&model)
            .unwrap_or_else(|| panic!("{model} is not in world '{}'", self.name));
        let scoped = scoped_name(&owner.name, &name);
        owner.bodies.push(id);

        if self.by_scoped_name.insert(scoped.clone(), id).is_some() {
            warn!(body = %scoped, "scoped body name reused; lookups now resolve to the newest body");
        }
        self.bodies.insert(
            id,
            Body {
                id,
                model,
                name,
                scoped_name: scoped,
                pose,
                collisions: Vec::new(),
            },
        );
        id
    }

    /// Remove a body. Returns it if it existed.
    pub fn remove_body(&mut self, id: BodyId) -> Option<Body> {
        let body = self.bodies.remove(&id)?;
        if self.by_scoped_name.get(&body.scoped_name) == Some(&id) {
            self.by_scoped_name.remove(&body.scoped_name);
        }
        if let Some(model) = self.models.get_mut(&body.model) {
            model.bodies.retain(|b| *b != id);
        }
        Some(body)
    }

    /// Attach a collision to a body.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::BodyNotFound`] if the body does not exist.
    pub fn attach_collision(&mut self, body: BodyId, collision: Collision) -> Result<(), PhysicsError> {
        self.bodies
            .get_mut(&body)
            .ok_or(PhysicsError::BodyNotFound(body))?
            .collisions
            .push(collision);
        Ok(())
    }

    /// Add free-standing geometry in the world frame.
    pub fn add_static(&mut self, collision: Collision) {
        self.static_collisions.push(collision);
    }

    /// Free-standing geometry.
    #[must_use]
    pub fn static_collisions(&self) -> &[Collision] {
        &self.static_collisions
    }

    /// Move a body.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::BodyNotFound`] if the body does not exist.
    pub fn set_body_pose(&mut self, body: BodyId, pose: Pose) -> Result<(), PhysicsError> {
        self.bodies
            .get_mut(&body)
            .ok_or(PhysicsError::BodyNotFound(body))?
            .pose = pose;
        Ok(())
    }

    /// Look up a body by id.
    #[must_use]
    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(&id)
    }

    /// Look up a body by its scoped name.
    #[must_use]
    pub fn body_by_scoped_name(&self, scoped: &str) -> Option<&Body> {
        self.by_scoped_name
            .get(scoped)
            .and_then(|id| self.bodies.get(id))
    }

    /// Look up a model by id.
    #[must_use]
    pub fn model(&self, id: ModelId) -> Option<&Model> {
        self.models.get(&id)
    }

    /// Look up a model by name.
    #[must_use]
    pub fn model_by_name(&self, name: &str) -> Option<&Model> {
        self.models.values().find(|m| m.name == name)
    }

    /// Bodies in id order.
    pub fn bodies(&self) -> impl Iterator<Item = &Body> {
        self.bodies.values()
    }

    /// Models in id order.
    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }
}

fn load_collision(element: Element<'_>, category: CollideMask) -> Result<Collision, PhysicsError> {
    let name = element.value_string("name").unwrap_or_default();
    let pose = element.pose_value("pose")?.unwrap_or_default();
    let retro = element.parse_value::<f64>("laser_retro", "a number")?.unwrap_or(0.0);
    let fiducial = element.parse_value::<i32>("fiducial", "an integer")?.unwrap_or(-1);

    let geometry = element.child("geometry").ok_or_else(|| ConfigError::MissingElement {
        parent: element.path(),
        child: "geometry",
    })?;

    let collider = if let Some(shape) = geometry.child("box") {
        let size = vector_value(shape, "size")?.unwrap_or(DVec3::ONE);
        Collider::Cuboid {
            half_extents: size * 0.5,
        }
    } else if let Some(shape) = geometry.child("sphere") {
        Collider::Sphere {
            radius: shape.parse_value::<f64>("radius", "a number")?.unwrap_or(1.0),
        }
    } else if let Some(shape) = geometry.child("plane") {
        Collider::Plane {
            normal: vector_value(shape, "normal")?.unwrap_or(DVec3::Z),
        }
    } else {
        return Err(ConfigError::MissingElement {
            parent: geometry.path(),
            child: "box|sphere|plane",
        }
        .into());
    };

    trace!(collision = %name, shape = collider.kind(), "collision loaded");
    Ok(Collision::new(name, collider, pose)
        .with_surface(retro, fiducial)
        .with_category(category))
}

fn vector_value(element: Element<'_>, key: &str) -> Result<Option<DVec3>, DescriptorError> {
    let Some(raw) = element.value_string(key) else {
        return Ok(None);
    };
    let parsed: Option<Vec<f64>> = raw.split_whitespace().map(|t| t.parse().ok()).collect();
    match parsed.as_deref() {
        Some([x, y, z]) => Ok(Some(DVec3::new(*x, *y, *z))),
        _ => Err(DescriptorError::InvalidValue {
            element: element.name().to_string(),
            key: key.to_string(),
            value: raw.to_string(),
            expected: "three numbers",
        }),
    }
}

// =============================================================================
// World Registry
// =============================================================================

/// Named worlds, passed explicitly to anything that resolves bodies.
#[derive(Debug, Clone, Default)]
pub struct WorldRegistry {
    worlds: BTreeMap<String, World>,
}

impl WorldRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one world per `world` element of a descriptor.
    ///
    /// # Errors
    ///
    /// Propagates the first [`World::load`] failure.
    pub fn load(descriptor: &SceneDescriptor) -> Result<Self, PhysicsError> {
        let mut registry = Self::new();
        for element in descriptor.elements_named("world") {
            registry.insert(World::load(element)?);
        }
        Ok(registry)
    }

    /// Insert a world, replacing any world with the same name.
    pub fn insert(&mut self, world: World) -> Option<World> {
        self.worlds.insert(world.name.clone(), world)
    }

    /// Look up a world by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&World> {
        self.worlds.get(name)
    }

    /// Mutable lookup.
    #[must_use]
    pub fn get_mut(&mut self, name: &str) -> Option<&mut World> {
        self.worlds.get_mut(name)
    }

    /// Number of worlds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.worlds.len()
    }

    /// True when no worlds are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.worlds.is_empty()
    }

    /// World names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.worlds.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf::ElementSpec;

    #[test]
    fn test_scoped_name() {
        assert_eq!(scoped_name("robot", "base"), "root::robot::base");
    }

    #[test]
    fn test_add_and_lookup() {
        let mut world = World::new("default");
        let robot = world.add_model("robot", Pose::IDENTITY);
        let base = world.add_body(robot, "base", Pose::IDENTITY);
        let arm = world.add_body(robot, "arm", Pose::IDENTITY);

        assert_eq!(world.model(robot).unwrap().bodies(), &[base, arm]);
        assert_eq!(world.body(arm).unwrap().scoped_name(), "root::robot::arm");
        assert_eq!(world.body(base).unwrap().model(), robot);
        assert!(world.body_by_scoped_name("root::robot::leg").is_none());
        assert!(world.model_by_name("other").is_none());
    }

    #[test]
    fn test_remove_body() {
        let mut world = World::new("default");
        let robot = world.add_model("robot", Pose::IDENTITY);
        let base = world.add_body(robot, "base", Pose::IDENTITY);

        assert!(world.remove_body(base).is_some());
        assert!(world.body(base).is_none());
        assert!(world.body_by_scoped_name("root::robot::base").is_none());
        assert!(world.model(robot).unwrap().bodies().is_empty());
        assert!(world.remove_body(base).is_none());
        assert!(matches!(
            world.set_body_pose(base, Pose::IDENTITY),
            Err(PhysicsError::BodyNotFound(id)) if id == base
        ));
    }

    #[test]
    fn test_load_from_descriptor() {
        let descriptor = SceneDescriptor::from_spec(
            &ElementSpec::new("world")
                .attr("name", "default")
                .child(
                    ElementSpec::new("model")
                        .attr("name", "robot")
                        .attr("pose", "1 0 0")
                        .child(
                            ElementSpec::new("link")
                                .attr("name", "base")
                                .attr("pose", "0 2 0")
                                .child(
                                    ElementSpec::new("collision")
                                        .attr("name", "hull")
                                        .attr("laser_retro", "0.5")
                                        .child(ElementSpec::new("geometry").child(
                                            ElementSpec::new("sphere").attr("radius", "0.25"),
                                        )),
                                ),
                        ),
                )
                .child(
                    ElementSpec::new("collision")
                        .attr("name", "wall")
                        .attr("fiducial", "7")
                        .child(
                            ElementSpec::new("geometry")
                                .child(ElementSpec::new("box").attr("size", "0.1 1 1")),
                        ),
                ),
        );

        let world = World::load(descriptor.root()).unwrap();
        assert_eq!(world.name(), "default");

        let base = world.body_by_scoped_name("root::robot::base").unwrap();
        assert_eq!(base.world_pose().position, DVec3::new(1.0, 2.0, 0.0));
        assert_eq!(base.collisions().len(), 1);
        assert_eq!(base.collisions()[0].category, CollideMask::LINK);
        assert_eq!(base.collisions()[0].collider.kind(), "sphere");
        assert!((base.collisions()[0].surface.retro - 0.5).abs() < 1e-12);

        let wall = &world.static_collisions()[0];
        assert_eq!(wall.surface.fiducial, 7);
        assert_eq!(wall.collider.kind(), "box");
        assert_eq!(
            wall.collider,
            Collider::Cuboid {
                half_extents: DVec3::new(0.05, 0.5, 0.5)
            }
        );
    }

    #[test]
    fn test_load_rejects_collision_without_geometry() {
        let descriptor = SceneDescriptor::from_spec(
            &ElementSpec::new("world").child(ElementSpec::new("collision").attr("name", "x")),
        );
        assert!(matches!(
            World::load(descriptor.root()),
            Err(PhysicsError::Config(ConfigError::MissingElement { child: "geometry", .. }))
        ));
    }

    #[test]
    fn test_registry_load() {
        let descriptor = SceneDescriptor::from_spec(
            &ElementSpec::new("sdf")
                .child(ElementSpec::new("world").attr("name", "a"))
                .child(ElementSpec::new("world").attr("name", "b")),
        );
        let registry = WorldRegistry::load(&descriptor).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(registry.get("c").is_none());
    }
}
