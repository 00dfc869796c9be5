//! The sensor trait and the lifecycle state shared by every sensor type.
//!
//! A sensor moves through a fixed sequence of states:
//!
//! ```text
//! Uninitialized --load--> Loaded --init--> Active | Inactive --fini--> Finalized
//! ```
//!
//! `Active` and `Inactive` are interchangeable through [`Sensor::set_active`].
//! Only an active sensor refreshes on a regular [`Sensor::update`]; a forced
//! update refreshes an inactive one too. Calling an operation in the wrong
//! state returns [`SensorError::InvalidState`].

use std::fmt;

use serde::{Deserialize, Serialize};
use sonde_physics::{Element, WorldRegistry};
use tracing::debug;

use crate::error::SensorError;
use crate::sensors::RaySensor;

/// Tolerance when comparing elapsed simulation time against the update period.
const PERIOD_EPSILON: f64 = 1e-9;

// =============================================================================
// Lifecycle State
// =============================================================================

/// Where a sensor is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorState {
    /// Constructed, not yet configured
    Uninitialized,
    /// Configured and bound to a body
    Loaded,
    /// Initialized and refreshing on every update
    Active,
    /// Initialized, refreshing only when forced
    Inactive,
    /// Torn down; holds no probe
    Finalized,
}

impl SensorState {
    /// True once `init` has run and before `fini`.
    #[must_use]
    pub fn is_initialized(self) -> bool {
        matches!(self, Self::Active | Self::Inactive)
    }
}

impl fmt::Display for SensorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Loaded => "loaded",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Common Attributes
// =============================================================================

/// Attributes and lifecycle bookkeeping common to every sensor type.
#[derive(Debug, Clone)]
pub struct SensorCore {
    name: String,
    type_name: &'static str,
    state: SensorState,
    always_on: bool,
    update_period: Option<f64>,
    last_update: Option<f64>,
}

impl SensorCore {
    /// Fresh core for a sensor of the given type, named after the type.
    #[must_use]
    pub fn new(type_name: &'static str) -> Self {
        Self {
            name: type_name.to_string(),
            type_name,
            state: SensorState::Uninitialized,
            always_on: false,
            update_period: None,
            last_update: None,
        }
    }

    /// Read `name`, `always_on` and `update_rate` from a sensor element.
    ///
    /// The name is taken first so that later errors can carry it.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Configuration`] when an attribute does not
    /// parse or `update_rate` is negative.
    pub fn load_attributes(&mut self, element: Element<'_>) -> Result<(), SensorError> {
        if let Some(name) = element.value_string("name") {
            self.name = name.to_string();
        }

        let always_on = element.bool_value("always_on").map_err(|e| self.config_error(e))?;
        let rate = element
            .parse_value::<f64>("update_rate", "a rate in Hz")
            .map_err(|e| self.config_error(e))?;

        if let Some(rate) = rate {
            if !rate.is_finite() || rate < 0.0 {
                return Err(self.config_error(sonde_physics::ConfigError::InvalidValue {
                    field: "update_rate",
                    value: rate,
                }));
            }
        }

        self.always_on = always_on.unwrap_or(false);
        self.update_period = rate.filter(|r| *r > 0.0).map(|r| 1.0 / r);
        Ok(())
    }

    /// Sensor name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the sensor.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Registered type identifier.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SensorState {
        self.state
    }

    /// Move to a new state.
    pub fn set_state(&mut self, state: SensorState) {
        if state != self.state {
            debug!(sensor = %self.name, from = %self.state, to = %state, "sensor state change");
        }
        self.state = state;
    }

    /// Whether the sensor starts active after `init`.
    #[must_use]
    pub fn always_on(&self) -> bool {
        self.always_on
    }

    /// Set whether the sensor starts active after `init`.
    pub fn set_always_on(&mut self, always_on: bool) {
        self.always_on = always_on;
    }

    /// Minimum simulation time between refreshes, `None` to refresh every update.
    #[must_use]
    pub fn update_period(&self) -> Option<f64> {
        self.update_period
    }

    /// Set the refresh rate in Hz; zero refreshes on every update.
    pub fn set_update_rate(&mut self, rate: f64) {
        self.update_period = (rate > 0.0).then(|| 1.0 / rate);
    }

    /// Simulation time of the last refresh.
    #[must_use]
    pub fn last_update(&self) -> Option<f64> {
        self.last_update
    }

    /// Fail with [`SensorError::InvalidState`] unless `allowed` accepts the
    /// current state.
    ///
    /// # Errors
    ///
    /// See above.
    pub fn require(
        &self,
        operation: &'static str,
        allowed: impl Fn(SensorState) -> bool,
    ) -> Result<(), SensorError> {
        if allowed(self.state) {
            Ok(())
        } else {
            Err(SensorError::InvalidState {
                sensor: self.name.clone(),
                operation,
                state: self.state,
            })
        }
    }

    /// Whether an update at `sim_time` should refresh the readings.
    #[must_use]
    pub fn should_refresh(&self, sim_time: f64, force: bool) -> bool {
        if force {
            return true;
        }
        if self.state != SensorState::Active {
            return false;
        }
        match (self.update_period, self.last_update) {
            (Some(period), Some(last)) => sim_time - last >= period - PERIOD_EPSILON,
            _ => true,
        }
    }

    /// Record a refresh at `sim_time`.
    pub fn mark_refreshed(&mut self, sim_time: f64) {
        self.last_update = Some(sim_time);
    }

    /// Clear the refresh history.
    pub fn reset_refresh(&mut self) {
        self.last_update = None;
    }

    /// Wrap a configuration error with this sensor's name.
    pub fn config_error(&self, source: impl Into<sonde_physics::ConfigError>) -> SensorError {
        SensorError::Configuration {
            sensor: self.name.clone(),
            source: source.into(),
        }
    }

    /// Wrap a physics error with this sensor's name.
    pub fn physics_error(&self, source: sonde_physics::PhysicsError) -> SensorError {
        SensorError::Physics {
            sensor: self.name.clone(),
            source,
        }
    }
}

// =============================================================================
// Sensor Trait
// =============================================================================

/// A simulated sensor.
///
/// Implementors provide access to their [`SensorCore`] and the four
/// lifecycle hooks; naming, state queries and activation come for free.
///
/// # Example
///
/// ```
/// use sonde_physics::{Element, WorldRegistry};
/// use sonde_sensors::{Sensor, SensorCore, SensorError, SensorState};
///
/// #[derive(Debug)]
/// struct Clock {
///     core: SensorCore,
///     ticks: u32,
/// }
///
/// impl Sensor for Clock {
///     fn core(&self) -> &SensorCore { &self.core }
///     fn core_mut(&mut self) -> &mut SensorCore { &mut self.core }
///
///     fn load(&mut self, element: Element<'_>, _: &WorldRegistry) -> Result<(), SensorError> {
///         self.core.require("load", |s| s == SensorState::Uninitialized)?;
///         self.core.load_attributes(element)?;
///         self.core.set_state(SensorState::Loaded);
///         Ok(())
///     }
///
///     fn init(&mut self, _: &WorldRegistry) -> Result<(), SensorError> {
///         self.core.require("init", |s| s == SensorState::Loaded)?;
///         self.core.set_state(SensorState::Active);
///         Ok(())
///     }
///
///     fn update(&mut self, _: &WorldRegistry, t: f64, force: bool) -> Result<bool, SensorError> {
///         self.core.require("update", SensorState::is_initialized)?;
///         if !self.core.should_refresh(t, force) {
///             return Ok(false);
///         }
///         self.ticks += 1;
///         self.core.mark_refreshed(t);
///         Ok(true)
///     }
///
///     fn fini(&mut self) {
///         self.core.set_state(SensorState::Finalized);
///     }
/// }
///
/// let mut clock = Clock { core: SensorCore::new("clock"), ticks: 0 };
/// assert_eq!(clock.name(), "clock");
/// assert!(clock.init(&WorldRegistry::new()).is_err());
/// ```
pub trait Sensor: Send + fmt::Debug {
    /// Shared attributes and lifecycle state.
    fn core(&self) -> &SensorCore;

    /// Mutable access to the shared attributes.
    fn core_mut(&mut self) -> &mut SensorCore;

    /// Configure the sensor from its declaration and bind it to a body.
    ///
    /// # Errors
    ///
    /// Resolution, binding and configuration failures; `InvalidState` unless
    /// the sensor is uninitialized.
    fn load(&mut self, element: Element<'_>, worlds: &WorldRegistry) -> Result<(), SensorError>;

    /// Prepare the sensor to take measurements.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the sensor is loaded.
    fn init(&mut self, worlds: &WorldRegistry) -> Result<(), SensorError>;

    /// Refresh the measurements if due, returning whether they were refreshed.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the sensor is initialized; physics failures
    /// leave the previous measurements in place.
    fn update(
        &mut self,
        worlds: &WorldRegistry,
        sim_time: f64,
        force: bool,
    ) -> Result<bool, SensorError>;

    /// Release the sensor's resources. Calling it twice is harmless.
    fn fini(&mut self);

    /// Sensor name.
    fn name(&self) -> &str {
        self.core().name()
    }

    /// Registered type identifier.
    fn type_name(&self) -> &'static str {
        self.core().type_name()
    }

    /// Current lifecycle state.
    fn state(&self) -> SensorState {
        self.core().state()
    }

    /// True when the sensor refreshes on regular updates.
    fn is_active(&self) -> bool {
        self.state() == SensorState::Active
    }

    /// Switch between `Active` and `Inactive`.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the sensor is initialized.
    fn set_active(&mut self, active: bool) -> Result<(), SensorError> {
        let core = self.core_mut();
        core.require("change activation", SensorState::is_initialized)?;
        core.set_state(if active {
            SensorState::Active
        } else {
            SensorState::Inactive
        });
        Ok(())
    }

    /// Downcast to a ray sensor.
    fn as_ray(&self) -> Option<&RaySensor> {
        None
    }

    /// Mutable downcast to a ray sensor.
    fn as_ray_mut(&mut self) -> Option<&mut RaySensor> {
        None
    }
}
