//! Scene builders for sensor tests.

use glam::DVec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sonde_physics::{Collider, Collision, ElementSpec, Pose, SceneDescriptor, World, WorldRegistry};

use crate::sensor::Sensor;
use crate::sensors::RaySensor;

/// Name of the world every helper scene uses.
pub const WORLD: &str = "default";

/// Horizontal fan layout used by the reference scenario.
pub const SCENARIO_RAYS: usize = 5;

// =============================================================================
// Descriptor Builders
// =============================================================================

/// A `ray` element with a horizontal fan and a range block.
pub fn ray_spec(samples: usize, min_angle: f64, max_angle: f64, min: f64, max: f64) -> ElementSpec {
    ElementSpec::new("ray")
        .child(
            ElementSpec::new("scan").child(
                ElementSpec::new("horizontal")
                    .attr("samples", samples)
                    .attr("min_angle", min_angle)
                    .attr("max_angle", max_angle),
            ),
        )
        .child(ElementSpec::new("range").attr("min", min).attr("max", max))
}

/// A ray sensor element.
pub fn sensor_spec(name: &str, ray: ElementSpec) -> ElementSpec {
    ElementSpec::new("sensor")
        .attr("name", name)
        .attr("type", "ray")
        .attr("always_on", "true")
        .child(ray)
}

/// `world "default" / model "robot" / link "base"` holding the given sensors.
pub fn robot_scene(sensors: Vec<ElementSpec>) -> ElementSpec {
    let link = sensors
        .into_iter()
        .fold(ElementSpec::new("link").attr("name", "base"), ElementSpec::child);
    ElementSpec::new("world")
        .attr("name", WORLD)
        .child(ElementSpec::new("model").attr("name", "robot").child(link))
}

/// Five rays over `[-1.57, 1.57]` with range `[0.1, 10.0]`, named `ray1`.
pub fn scenario_descriptor() -> SceneDescriptor {
    SceneDescriptor::from_spec(&robot_scene(vec![sensor_spec(
        "ray1",
        ray_spec(SCENARIO_RAYS, -1.57, 1.57, 0.1, 10.0),
    )]))
}

// =============================================================================
// Sensor Setup
// =============================================================================

/// Load and initialize the first sensor named `name` in the descriptor.
pub fn ready_sensor(descriptor: &SceneDescriptor, worlds: &WorldRegistry, name: &str) -> RaySensor {
    let element = descriptor
        .elements_named("sensor")
        .find(|e| e.value_string("name") == Some(name))
        .expect("sensor element present");
    let mut sensor = RaySensor::new();
    sensor.load(element, worlds).expect("sensor loads");
    sensor.init(worlds).expect("sensor initializes");
    sensor
}

/// The reference scenario, loaded and initialized.
pub fn scenario() -> (SceneDescriptor, WorldRegistry, RaySensor) {
    let descriptor = scenario_descriptor();
    let worlds = WorldRegistry::load(&descriptor).expect("scenario world loads");
    let sensor = ready_sensor(&descriptor, &worlds, "ray1");
    (descriptor, worlds, sensor)
}

// =============================================================================
// Obstacles
// =============================================================================

/// A thin wall whose near face is at `x = distance`, centered on the x axis.
pub fn wall_at(distance: f64) -> Collision {
    Collision::new(
        "wall",
        Collider::Cuboid {
            half_extents: DVec3::new(0.05, 0.5, 0.5),
        },
        Pose::from_position(DVec3::new(distance + 0.05, 0.0, 0.0)),
    )
}

/// Mutable access to the helper world.
pub fn world_mut(worlds: &mut WorldRegistry) -> &mut World {
    worlds.get_mut(WORLD).expect("helper world present")
}

/// Scatter `count` boxes and spheres around the origin, avoiding a clear
/// radius of one unit, seeded for repeatability.
pub fn scatter_obstacles(world: &mut World, count: usize, seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for i in 0..count {
        let radius = rng.gen_range(1.5..9.0);
        let bearing = rng.gen_range(-std::f64::consts::PI..std::f64::consts::PI);
        let position = DVec3::new(radius * bearing.cos(), radius * bearing.sin(), 0.0);
        let collider = if rng.gen_bool(0.5) {
            Collider::Sphere {
                radius: rng.gen_range(0.1..0.5),
            }
        } else {
            Collider::Cuboid {
                half_extents: DVec3::splat(rng.gen_range(0.1..0.5)),
            }
        };
        let fiducial = rng.gen_range(-1..8);
        world.add_static(
            Collision::new(format!("obstacle{i}"), collider, Pose::from_position(position))
                .with_surface(rng.gen_range(0.0..1.0), fiducial),
        );
    }
}
