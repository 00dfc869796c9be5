//! Sensor type registry.
//!
//! Maps a type identifier (the `type` attribute of a sensor element) to a
//! constructor. A process-wide registry with the built-in types is available
//! through [`SensorRegistry::global`]; owned registries can be extended with
//! custom types.
//!
//! # Example
//!
//! ```
//! use sonde_sensors::registry::SensorRegistry;
//!
//! let sensor = SensorRegistry::global().create("ray").unwrap();
//! assert_eq!(sensor.type_name(), "ray");
//! assert!(SensorRegistry::global().create("sonar").is_err());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use tracing::debug;

use crate::error::SensorError;
use crate::sensor::Sensor;
use crate::sensors::{RaySensor, RAY_SENSOR_TYPE};

/// Builds a fresh, unloaded sensor.
pub type SensorConstructor = fn() -> Box<dyn Sensor>;

/// Constructors keyed by type identifier.
#[derive(Clone, Default)]
pub struct SensorRegistry {
    constructors: HashMap<String, SensorConstructor>,
}

impl SensorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Creates a registry with every built-in sensor type registered.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(RAY_SENSOR_TYPE, RaySensor::boxed);
        registry
    }

    /// The process-wide registry of built-in types, built on first use.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<SensorRegistry> = OnceLock::new();
        GLOBAL.get_or_init(Self::with_builtins)
    }

    /// Registers a constructor, returning the one it replaces.
    pub fn register(
        &mut self,
        type_id: impl Into<String>,
        constructor: SensorConstructor,
    ) -> Option<SensorConstructor> {
        let type_id = type_id.into();
        debug!(sensor_type = %type_id, "sensor type registered");
        self.constructors.insert(type_id, constructor)
    }

    /// Builds a sensor of the given type.
    ///
    /// # Errors
    ///
    /// [`SensorError::UnknownSensorType`] when nothing is registered under
    /// `type_id`.
    pub fn create(&self, type_id: &str) -> Result<Box<dyn Sensor>, SensorError> {
        self.constructors
            .get(type_id)
            .map(|constructor| constructor())
            .ok_or_else(|| SensorError::UnknownSensorType(type_id.to_string()))
    }

    /// True if a constructor is registered under `type_id`.
    #[must_use]
    pub fn contains(&self, type_id: &str) -> bool {
        self.constructors.contains_key(type_id)
    }

    /// Registered type identifiers, sorted.
    #[must_use]
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// True if no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl fmt::Debug for SensorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorRegistry")
            .field("types", &self.types())
            .finish()
    }
}
