//! Error types for sensor setup and queries.

use sonde_physics::{ConfigError, PhysicsError};
use thiserror::Error;

use crate::sensor::SensorState;

/// An enclosing element required to place a sensor is absent.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionError {
    /// No `link` element above the sensor.
    #[error("no enclosing <link> element")]
    MissingLink,
    /// No `model` element above the sensor.
    #[error("no enclosing <model> element")]
    MissingModel,
    /// No `world` element above the sensor.
    #[error("no enclosing <world> element")]
    MissingWorld,
}

/// Errors raised by sensors, the registry and the manager.
#[derive(Debug, Error)]
pub enum SensorError {
    /// The sensor's declaration is not nested in a link, model and world.
    #[error("cannot place sensor '{sensor}': {source}")]
    Resolution {
        /// Sensor name
        sensor: String,
        /// Which ancestor is missing
        #[source]
        source: ResolutionError,
    },

    /// The resolved names do not match anything in the world registry.
    #[error("sensor '{sensor}' cannot bind: {target} '{name}' not found")]
    Binding {
        /// Sensor name
        sensor: String,
        /// What was looked up: `world` or `body`
        target: &'static str,
        /// The name that failed to resolve
        name: String,
    },

    /// Sensor or probe parameters are malformed.
    #[error("sensor '{sensor}' is misconfigured: {source}")]
    Configuration {
        /// Sensor name
        sensor: String,
        /// Underlying configuration error
        #[source]
        source: ConfigError,
    },

    /// A per-ray accessor was called with an index outside the reading set.
    #[error("ray index {index} out of bounds for {len} readings")]
    Index {
        /// Requested index
        index: usize,
        /// Number of readings
        len: usize,
    },

    /// No constructor is registered for the type identifier.
    #[error("unknown sensor type '{0}'")]
    UnknownSensorType(String),

    /// A lifecycle operation was called in the wrong state.
    #[error("sensor '{sensor}' cannot {operation} while {state}")]
    InvalidState {
        /// Sensor name
        sensor: String,
        /// The attempted operation
        operation: &'static str,
        /// Current state
        state: SensorState,
    },

    /// The sensor holds no probe (not loaded, or already finalized).
    #[error("sensor '{sensor}' has no probe")]
    NoProbe {
        /// Sensor name
        sensor: String,
    },

    /// The physics engine rejected an operation.
    #[error("physics error in sensor '{sensor}': {source}")]
    Physics {
        /// Sensor name
        sensor: String,
        /// Underlying physics error
        #[source]
        source: PhysicsError,
    },

    /// Two sensors share a name.
    #[error("duplicate sensor name '{0}'")]
    DuplicateSensor(String),

    /// No sensor in the manager has the name.
    #[error("no sensor named '{0}'")]
    UnknownSensor(String),
}

impl SensorError {
    /// The missing ancestor, for resolution failures.
    #[must_use]
    pub fn resolution(&self) -> Option<ResolutionError> {
        match self {
            Self::Resolution { source, .. } => Some(*source),
            _ => None,
        }
    }
}
