//! Sensor manager: the single scheduling authority for a set of sensors.
//!
//! The manager creates sensors from a scene descriptor, initializes them and
//! updates each one once per simulation step, in load order. Setup failures
//! are handled by a [`LoadPolicy`]; runtime failures of one sensor never stop
//! the others.
//!
//! # Example
//!
//! ```
//! use sonde_physics::{ElementSpec, SceneDescriptor, WorldRegistry};
//! use sonde_sensors::{SensorManager, SensorRegistry};
//!
//! let descriptor = SceneDescriptor::from_spec(
//!     &ElementSpec::new("world").attr("name", "default").child(
//!         ElementSpec::new("model").attr("name", "robot").child(
//!             ElementSpec::new("link").attr("name", "base").child(
//!                 ElementSpec::new("sensor")
//!                     .attr("name", "ray1")
//!                     .attr("type", "ray")
//!                     .attr("always_on", "true")
//!                     .child(
//!                         ElementSpec::new("ray")
//!                             .child(ElementSpec::new("range").attr("min", 0.1).attr("max", 10.0)),
//!                     ),
//!             ),
//!         ),
//!     ),
//! );
//! let worlds = WorldRegistry::load(&descriptor).unwrap();
//!
//! let mut manager = SensorManager::new();
//! manager.load_scene(&descriptor, &worlds, SensorRegistry::global()).unwrap();
//! manager.init_all(&worlds).unwrap();
//!
//! let report = manager.step(&worlds, 0.0);
//! assert_eq!(report.refreshed, vec!["ray1".to_string()]);
//! assert_eq!(manager.ray_sensor("ray1").unwrap().range(0).unwrap(), 10.0);
//! ```

use std::fmt;

use sonde_physics::{SceneDescriptor, WorldRegistry};
use tracing::{debug, info, warn};

use crate::error::SensorError;
use crate::registry::SensorRegistry;
use crate::sensor::{Sensor, SensorState};
use crate::sensors::RaySensor;

/// What to do when a sensor fails to set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
    /// Stop at the first failure and return it
    #[default]
    Abort,
    /// Log the failure, drop the sensor and continue
    Skip,
}

/// Outcome of a setup pass.
#[derive(Debug, Default)]
pub struct SceneLoadReport {
    /// Sensors that completed the pass
    pub loaded: Vec<String>,
    /// Sensors dropped under [`LoadPolicy::Skip`], with the reason
    pub skipped: Vec<(String, SensorError)>,
}

impl SceneLoadReport {
    /// True when nothing was skipped.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Outcome of one simulation step.
#[derive(Debug, Default)]
pub struct StepReport {
    /// Sensors whose readings were refreshed
    pub refreshed: Vec<String>,
    /// Number of sensors that were not due (inactive or throttled)
    pub idle: usize,
    /// Sensors whose update failed, with the reason
    pub failures: Vec<(String, SensorError)>,
}

/// Owns sensors and drives their lifecycle.
pub struct SensorManager {
    sensors: Vec<Box<dyn Sensor>>,
    policy: LoadPolicy,
}

impl fmt::Debug for SensorManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorManager")
            .field("sensors", &self.names())
            .field("policy", &self.policy)
            .finish()
    }
}

impl Default for SensorManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorManager {
    /// Creates an empty manager that aborts on setup failures.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(LoadPolicy::Abort)
    }

    /// Creates an empty manager with the given setup policy.
    #[must_use]
    pub fn with_policy(policy: LoadPolicy) -> Self {
        Self {
            sensors: Vec::new(),
            policy,
        }
    }

    /// The setup policy.
    #[must_use]
    pub fn policy(&self) -> LoadPolicy {
        self.policy
    }

    // =========================================================================
    // Setup
    // =========================================================================

    /// Create and load every `sensor` element of the descriptor, in
    /// document order.
    ///
    /// Under [`LoadPolicy::Abort`] sensors loaded before the failure stay in
    /// the manager.
    ///
    /// # Errors
    ///
    /// The first setup failure under [`LoadPolicy::Abort`]: unknown type,
    /// load failure or [`SensorError::DuplicateSensor`].
    pub fn load_scene(
        &mut self,
        descriptor: &SceneDescriptor,
        worlds: &WorldRegistry,
        registry: &SensorRegistry,
    ) -> Result<SceneLoadReport, SensorError> {
        let mut report = SceneLoadReport::default();

        for element in descriptor.elements_named("sensor") {
            let type_id = element.value_string("type").unwrap_or_default();
            let label = element.value_string("name").unwrap_or(type_id).to_string();

            let mut sensor = match registry.create(type_id) {
                Ok(sensor) => sensor,
                Err(e) => {
                    self.handle_setup_failure(&mut report, label, e)?;
                    continue;
                }
            };

            if let Err(e) = sensor.load(element, worlds) {
                self.handle_setup_failure(&mut report, label, e)?;
                continue;
            }

            let name = sensor.name().to_string();
            if let Err(e) = self.add(sensor) {
                self.handle_setup_failure(&mut report, name, e)?;
                continue;
            }
            report.loaded.push(name);
        }

        info!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            "sensor scene loaded"
        );
        Ok(report)
    }

    /// Add an already loaded sensor.
    ///
    /// # Errors
    ///
    /// [`SensorError::DuplicateSensor`] when the name is taken;
    /// [`SensorError::InvalidState`] when the sensor is not loaded.
    pub fn add(&mut self, sensor: Box<dyn Sensor>) -> Result<(), SensorError> {
        if self.contains(sensor.name()) {
            return Err(SensorError::DuplicateSensor(sensor.name().to_string()));
        }
        sensor.core().require("join a manager", |state| {
            state == SensorState::Loaded || state.is_initialized()
        })?;
        debug!(sensor = %sensor.name(), sensor_type = sensor.type_name(), "sensor added");
        self.sensors.push(sensor);
        Ok(())
    }

    /// Initialize every loaded sensor.
    ///
    /// Sensors that are already initialized are left alone. Under
    /// [`LoadPolicy::Skip`] sensors that fail are finalized and removed.
    ///
    /// # Errors
    ///
    /// The first failure under [`LoadPolicy::Abort`].
    pub fn init_all(&mut self, worlds: &WorldRegistry) -> Result<SceneLoadReport, SensorError> {
        let mut report = SceneLoadReport::default();
        let mut failed = Vec::new();

        for (index, sensor) in self.sensors.iter_mut().enumerate() {
            if sensor.state() != SensorState::Loaded {
                continue;
            }
            match sensor.init(worlds) {
                Ok(()) => report.loaded.push(sensor.name().to_string()),
                Err(e) if self.policy == LoadPolicy::Abort => return Err(e),
                Err(e) => failed.push((index, e)),
            }
        }

        for (index, error) in failed.into_iter().rev() {
            let mut sensor = self.sensors.remove(index);
            sensor.fini();
            warn!(sensor = %sensor.name(), error = %error, "sensor failed to initialize, skipping");
            report.skipped.push((sensor.name().to_string(), error));
        }
        report.skipped.reverse();
        Ok(report)
    }

    fn handle_setup_failure(
        &self,
        report: &mut SceneLoadReport,
        name: String,
        error: SensorError,
    ) -> Result<(), SensorError> {
        match self.policy {
            LoadPolicy::Abort => Err(error),
            LoadPolicy::Skip => {
                warn!(sensor = %name, error = %error, "sensor failed to load, skipping");
                report.skipped.push((name, error));
                Ok(())
            }
        }
    }

    // =========================================================================
    // Stepping
    // =========================================================================

    /// Update every initialized sensor once, in load order.
    pub fn step(&mut self, worlds: &WorldRegistry, sim_time: f64) -> StepReport {
        let mut report = StepReport::default();

        for sensor in &mut self.sensors {
            if !sensor.state().is_initialized() {
                report.idle += 1;
                continue;
            }
            match sensor.update(worlds, sim_time, false) {
                Ok(true) => report.refreshed.push(sensor.name().to_string()),
                Ok(false) => report.idle += 1,
                Err(e) => {
                    warn!(sensor = %sensor.name(), error = %e, sim_time, "sensor update failed");
                    report.failures.push((sensor.name().to_string(), e));
                }
            }
        }
        report
    }

    /// Refresh one sensor regardless of activation and update rate.
    ///
    /// # Errors
    ///
    /// [`SensorError::UnknownSensor`] if no sensor has that name, otherwise
    /// whatever the sensor's update returns.
    pub fn force_update(
        &mut self,
        name: &str,
        worlds: &WorldRegistry,
        sim_time: f64,
    ) -> Result<bool, SensorError> {
        let sensor = self
            .get_mut(name)
            .ok_or_else(|| SensorError::UnknownSensor(name.to_string()))?;
        sensor.update(worlds, sim_time, true)
    }

    /// Finalize every sensor. Sensors stay in the manager.
    pub fn fini_all(&mut self) {
        for sensor in &mut self.sensors {
            sensor.fini();
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Sensor with the given name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Sensor> {
        self.sensors
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.as_ref())
    }

    /// Mutable sensor with the given name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn Sensor + 'static)> {
        self.sensors
            .iter_mut()
            .find(|s| s.name() == name)
            .map(|s| s.as_mut())
    }

    /// Ray sensor with the given name; `None` if absent or of another type.
    #[must_use]
    pub fn ray_sensor(&self, name: &str) -> Option<&RaySensor> {
        self.get(name).and_then(|sensor| sensor.as_ray())
    }

    /// True if a sensor has the given name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate over the sensors in load order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Sensor> {
        self.sensors.iter().map(|s| s.as_ref())
    }

    /// Sensor names in load order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.sensors.iter().map(|s| s.name()).collect()
    }

    /// Number of sensors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    /// True if the manager holds no sensors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

impl Drop for SensorManager {
    fn drop(&mut self) {
        self.fini_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_manager() {
        let mut manager = SensorManager::default();
        assert!(manager.is_empty());
        assert_eq!(manager.policy(), LoadPolicy::Abort);

        let report = manager.step(&WorldRegistry::new(), 0.0);
        assert!(report.refreshed.is_empty());
        assert_eq!(report.idle, 0);
    }

    #[test]
    fn test_add_requires_loaded_sensor() {
        let mut manager = SensorManager::new();
        let err = manager.add(RaySensor::boxed()).unwrap_err();
        assert!(matches!(
            err,
            SensorError::InvalidState {
                state: SensorState::Uninitialized,
                ..
            }
        ));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_force_update_unknown_sensor() {
        let mut manager = SensorManager::new();
        let err = manager
            .force_update("ghost", &WorldRegistry::new(), 0.0)
            .unwrap_err();
        assert!(matches!(err, SensorError::UnknownSensor(ref n) if n == "ghost"));
        assert_eq!(err.to_string(), "no sensor named 'ghost'");
    }
}
