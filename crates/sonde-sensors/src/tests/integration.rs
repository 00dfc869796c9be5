//! Scene loading and stepping through the sensor manager.

use sonde_physics::{ElementSpec, SceneDescriptor, WorldRegistry};

use super::*;
use crate::error::{ResolutionError, SensorError};
use crate::manager::{LoadPolicy, SensorManager};
use crate::registry::SensorRegistry;
use crate::sensor::{Sensor, SensorState};

const EPS: f64 = 1e-9;

/// A robot with a good sensor, a sensor of an unknown type and a sensor
/// outside any link.
fn mixed_scene() -> SceneDescriptor {
    SceneDescriptor::from_spec(
        &ElementSpec::new("world").attr("name", WORLD).child(
            ElementSpec::new("model")
                .attr("name", "robot")
                .child(
                    ElementSpec::new("link")
                        .attr("name", "base")
                        .child(sensor_spec("front", ray_spec(3, -0.2, 0.2, 0.1, 10.0)))
                        .child(
                            ElementSpec::new("sensor")
                                .attr("name", "sonar")
                                .attr("type", "sonar"),
                        ),
                )
                .child(sensor_spec("stray", ray_spec(1, 0.0, 0.0, 0.1, 10.0))),
        ),
    )
}

#[test]
fn test_load_scene_and_step() {
    let (descriptor, mut worlds, _) = scenario();
    world_mut(&mut worlds).add_static(wall_at(3.0));

    let mut manager = SensorManager::new();
    let report = manager
        .load_scene(&descriptor, &worlds, SensorRegistry::global())
        .unwrap();
    assert_eq!(report.loaded, vec!["ray1".to_string()]);
    assert!(report.is_clean());

    let init = manager.init_all(&worlds).unwrap();
    assert_eq!(init.loaded, vec!["ray1".to_string()]);

    let step = manager.step(&worlds, 0.0);
    assert_eq!(step.refreshed, vec!["ray1".to_string()]);
    assert!(step.failures.is_empty());

    let sensor = manager.ray_sensor("ray1").unwrap();
    assert!((sensor.range(2).unwrap() - 3.0).abs() < EPS);
    assert!((sensor.range(0).unwrap() - 10.0).abs() < EPS);
}

#[test]
fn test_abort_policy_stops_at_first_failure() {
    let descriptor = mixed_scene();
    let worlds = WorldRegistry::load(&descriptor).unwrap();
    let mut manager = SensorManager::new();

    let err = manager
        .load_scene(&descriptor, &worlds, SensorRegistry::global())
        .unwrap_err();
    assert!(matches!(err, SensorError::UnknownSensorType(ref t) if t == "sonar"));
    assert_eq!(manager.names(), vec!["front"]);
}

#[test]
fn test_skip_policy_keeps_good_sensors() {
    let descriptor = mixed_scene();
    let worlds = WorldRegistry::load(&descriptor).unwrap();
    let mut manager = SensorManager::with_policy(LoadPolicy::Skip);

    let report = manager
        .load_scene(&descriptor, &worlds, SensorRegistry::global())
        .unwrap();
    assert_eq!(report.loaded, vec!["front".to_string()]);
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(report.skipped[0].0, "sonar");
    assert!(matches!(report.skipped[0].1, SensorError::UnknownSensorType(_)));
    assert_eq!(report.skipped[1].0, "stray");
    assert_eq!(
        report.skipped[1].1.resolution(),
        Some(ResolutionError::MissingLink)
    );

    manager.init_all(&worlds).unwrap();
    let step = manager.step(&worlds, 0.0);
    assert_eq!(step.refreshed, vec!["front".to_string()]);
}

#[test]
fn test_duplicate_names_rejected() {
    let descriptor = SceneDescriptor::from_spec(&robot_scene(vec![
        sensor_spec("twin", ray_spec(1, 0.0, 0.0, 0.1, 10.0)),
        sensor_spec("twin", ray_spec(2, -0.1, 0.1, 0.1, 10.0)),
    ]));
    let worlds = WorldRegistry::load(&descriptor).unwrap();

    let mut manager = SensorManager::new();
    let err = manager
        .load_scene(&descriptor, &worlds, SensorRegistry::global())
        .unwrap_err();
    assert!(matches!(err, SensorError::DuplicateSensor(ref n) if n == "twin"));
    assert_eq!(manager.len(), 1);
    assert_eq!(manager.ray_sensor("twin").unwrap().ray_count().unwrap(), 1);
}

#[test]
fn test_unnamed_sensor_takes_type_name() {
    let spec = ElementSpec::new("sensor")
        .attr("type", "ray")
        .attr("always_on", "true")
        .child(ray_spec(1, 0.0, 0.0, 0.1, 10.0));
    let descriptor = SceneDescriptor::from_spec(&robot_scene(vec![spec]));
    let worlds = WorldRegistry::load(&descriptor).unwrap();

    let mut manager = SensorManager::new();
    manager
        .load_scene(&descriptor, &worlds, SensorRegistry::global())
        .unwrap();
    assert_eq!(manager.names(), vec!["ray"]);
    assert_eq!(
        manager.ray_sensor("ray").unwrap().geometry().unwrap().name(),
        "ray::ray"
    );
}

#[test]
fn test_step_isolates_failures() {
    let descriptor = SceneDescriptor::from_spec(
        &ElementSpec::new("world").attr("name", WORLD).child(
            ElementSpec::new("model")
                .attr("name", "robot")
                .child(
                    ElementSpec::new("link")
                        .attr("name", "base")
                        .child(sensor_spec("keeper", ray_spec(1, 0.0, 0.0, 0.1, 10.0))),
                )
                .child(
                    ElementSpec::new("link")
                        .attr("name", "arm")
                        .child(sensor_spec("goner", ray_spec(1, 0.0, 0.0, 0.1, 10.0))),
                ),
        ),
    );
    let mut worlds = WorldRegistry::load(&descriptor).unwrap();

    let mut manager = SensorManager::new();
    manager
        .load_scene(&descriptor, &worlds, SensorRegistry::global())
        .unwrap();
    manager.init_all(&worlds).unwrap();

    let arm = manager.ray_sensor("goner").unwrap().body().unwrap();
    world_mut(&mut worlds).remove_body(arm).unwrap();

    let step = manager.step(&worlds, 0.0);
    assert_eq!(step.refreshed, vec!["keeper".to_string()]);
    assert_eq!(step.failures.len(), 1);
    assert_eq!(step.failures[0].0, "goner");
}

#[test]
fn test_force_update_and_fini() {
    let spec = ElementSpec::new("sensor")
        .attr("name", "idle")
        .attr("type", "ray")
        .child(ray_spec(1, 0.0, 0.0, 0.1, 10.0));
    let descriptor = SceneDescriptor::from_spec(&robot_scene(vec![spec]));
    let worlds = WorldRegistry::load(&descriptor).unwrap();

    let mut manager = SensorManager::new();
    manager
        .load_scene(&descriptor, &worlds, SensorRegistry::global())
        .unwrap();
    manager.init_all(&worlds).unwrap();

    let step = manager.step(&worlds, 0.0);
    assert!(step.refreshed.is_empty());
    assert_eq!(step.idle, 1);

    assert!(manager.force_update("idle", &worlds, 0.0).unwrap());
    assert_eq!(manager.ray_sensor("idle").unwrap().update_count().unwrap(), 1);

    manager.fini_all();
    let sensor = manager.get("idle").unwrap();
    assert_eq!(sensor.state(), SensorState::Finalized);
    assert_eq!(manager.step(&worlds, 1.0).idle, 1);
}

#[test]
fn test_scan_serializes() {
    let (descriptor, worlds, _) = scenario();
    let mut manager = SensorManager::new();
    manager
        .load_scene(&descriptor, &worlds, SensorRegistry::global())
        .unwrap();
    manager.init_all(&worlds).unwrap();
    manager.step(&worlds, 0.25);

    let scan = manager.ray_sensor("ray1").unwrap().scan().unwrap();
    let json = serde_json::to_value(&scan).unwrap();
    assert_eq!(json["sensor"], "ray1");
    assert_eq!(json["time"], 0.25);
    assert_eq!(json["readings"].as_array().unwrap().len(), SCENARIO_RAYS);
}
