//! # Sonde Sensors
//!
//! Simulated ray sensors for Sonde.
//!
//! A sensor is declared by a `sensor` element nested inside a
//! world/model/link hierarchy. Loading it resolves that hierarchy to a body,
//! asks the world's physics engine for a multi-ray probe attached to the body
//! and configures the probe from the declaration. Each update casts the
//! probe's rays and replaces the reading set.
//!
//! ## Modules
//!
//! - [`resolver`]: find the link, model and world enclosing a declaration
//! - [`sensor`]: the [`Sensor`] trait and lifecycle state
//! - [`sensors`]: built-in sensor types ([`RaySensor`])
//! - [`registry`]: type identifier to constructor map
//! - [`manager`]: creates, steps and tears down a set of sensors
//!
//! ## Usage
//!
//! ```
//! use sonde_physics::{Collider, Collision, ElementSpec, Pose, SceneDescriptor, WorldRegistry};
//! use sonde_sensors::{Sensor, SensorRegistry};
//!
//! let descriptor = SceneDescriptor::from_spec(
//!     &ElementSpec::new("world").attr("name", "default").child(
//!         ElementSpec::new("model").attr("name", "robot").child(
//!             ElementSpec::new("link").attr("name", "base").child(
//!                 ElementSpec::new("sensor")
//!                     .attr("name", "ray1")
//!                     .attr("type", "ray")
//!                     .child(
//!                         ElementSpec::new("ray")
//!                             .child(ElementSpec::new("range").attr("min", 0.1).attr("max", 10.0)),
//!                     ),
//!             ),
//!         ),
//!     ),
//! );
//! let mut worlds = WorldRegistry::load(&descriptor).unwrap();
//! worlds.get_mut("default").unwrap().add_static(Collision::new(
//!     "wall",
//!     Collider::Plane { normal: glam::DVec3::X },
//!     Pose::from_position(glam::DVec3::new(4.0, 0.0, 0.0)),
//! ));
//!
//! let mut sensor = SensorRegistry::global().create("ray").unwrap();
//! let element = descriptor.elements_named("sensor").next().unwrap();
//! sensor.load(element, &worlds).unwrap();
//! sensor.init(&worlds).unwrap();
//! sensor.update(&worlds, 0.0, true).unwrap();
//!
//! let ray = sensor.as_ray().unwrap();
//! assert!((ray.range(0).unwrap() - 4.0).abs() < 1e-9);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod manager;
pub mod registry;
pub mod resolver;
pub mod sensor;
pub mod sensors;

pub use error::{ResolutionError, SensorError};
pub use manager::{LoadPolicy, SceneLoadReport, SensorManager, StepReport};
pub use registry::{SensorConstructor, SensorRegistry};
pub use resolver::{resolve, Ancestry};
pub use sensor::{Sensor, SensorCore, SensorState};
pub use sensors::{RayScan, RaySensor, RAY_SENSOR_TYPE};

#[cfg(test)]
mod tests;
