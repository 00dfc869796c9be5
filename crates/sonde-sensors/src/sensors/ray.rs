//! Ray sensor: a multi-ray probe attached to a body.
//!
//! The sensor owns a [`Geometry`] carrying a [`MultiRayShape`] and forwards
//! every query to that shape. It does not cache configuration of its own, so
//! the counts and intervals it reports are always the shape's.

use serde::{Deserialize, Serialize};
use sonde_physics::{
    Angle, BodyId, Element, Geometry, GeometryKind, ModelId, MultiRayShape, Pose, RayReading,
    World, WorldRegistry,
};
use tracing::{debug, info, warn};

use crate::error::SensorError;
use crate::resolver;
use crate::sensor::{Sensor, SensorCore, SensorState};

/// Type identifier under which the ray sensor is registered.
pub const RAY_SENSOR_TYPE: &str = "ray";

/// A serializable copy of a ray sensor's latest measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RayScan {
    /// Sensor name
    pub sensor: String,
    /// Scoped name of the body carrying the sensor
    pub body: String,
    /// Simulation time of the last refresh, `None` before the first one
    pub time: Option<f64>,
    /// Horizontal ray count
    pub ray_count: usize,
    /// Vertical ray count
    pub vertical_ray_count: usize,
    /// Start of the horizontal fan
    pub min_angle: Angle,
    /// End of the horizontal fan
    pub max_angle: Angle,
    /// Readings, indexed `vertical * ray_count + horizontal`
    pub readings: Vec<RayReading>,
}

/// Body the sensor is bound to, recorded by a successful load.
#[derive(Debug, Clone)]
struct Binding {
    world: String,
    model: ModelId,
    body: BodyId,
    scoped_body: String,
}

/// Simulated laser range finder.
#[derive(Debug)]
pub struct RaySensor {
    core: SensorCore,
    binding: Option<Binding>,
    geometry: Option<Geometry>,
    init_pose: Option<Pose>,
}

impl RaySensor {
    /// Create an unloaded ray sensor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: SensorCore::new(RAY_SENSOR_TYPE),
            binding: None,
            geometry: None,
            init_pose: None,
        }
    }

    /// Constructor for the sensor registry.
    #[must_use]
    pub fn boxed() -> Box<dyn Sensor> {
        Box::new(Self::new())
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    fn no_probe(&self) -> SensorError {
        SensorError::NoProbe {
            sensor: self.core.name().to_string(),
        }
    }

    fn shape(&self) -> Result<&MultiRayShape, SensorError> {
        let geometry = self.geometry.as_ref().ok_or_else(|| self.no_probe())?;
        geometry.multi_ray().map_err(|e| self.core.physics_error(e))
    }

    fn binding(&self) -> Result<&Binding, SensorError> {
        self.binding.as_ref().ok_or_else(|| self.no_probe())
    }

    fn bound_world<'w>(&self, worlds: &'w WorldRegistry) -> Result<&'w World, SensorError> {
        let binding = self.binding()?;
        worlds.get(&binding.world).ok_or_else(|| SensorError::Binding {
            sensor: self.core.name().to_string(),
            target: "world",
            name: binding.world.clone(),
        })
    }

    fn index_error(&self, index: usize) -> SensorError {
        SensorError::Index {
            index,
            len: self.shape().map_or(0, |shape| shape.readings().len()),
        }
    }

    // =========================================================================
    // Configuration accessors
    // =========================================================================

    /// Start of the horizontal fan.
    ///
    /// # Errors
    ///
    /// [`SensorError::NoProbe`] when no probe is held.
    pub fn min_angle(&self) -> Result<Angle, SensorError> {
        Ok(self.shape()?.min_angle())
    }

    /// End of the horizontal fan.
    ///
    /// # Errors
    ///
    /// [`SensorError::NoProbe`] when no probe is held.
    pub fn max_angle(&self) -> Result<Angle, SensorError> {
        Ok(self.shape()?.max_angle())
    }

    /// Start of the vertical fan.
    ///
    /// # Errors
    ///
    /// [`SensorError::NoProbe`] when no probe is held.
    pub fn vertical_min_angle(&self) -> Result<Angle, SensorError> {
        Ok(self.shape()?.vertical_min_angle())
    }

    /// End of the vertical fan.
    ///
    /// # Errors
    ///
    /// [`SensorError::NoProbe`] when no probe is held.
    pub fn vertical_max_angle(&self) -> Result<Angle, SensorError> {
        Ok(self.shape()?.vertical_max_angle())
    }

    /// Closest distance a ray reports.
    ///
    /// # Errors
    ///
    /// [`SensorError::NoProbe`] when no probe is held.
    pub fn min_range(&self) -> Result<f64, SensorError> {
        Ok(self.shape()?.min_range())
    }

    /// Farthest distance a ray reports.
    ///
    /// # Errors
    ///
    /// [`SensorError::NoProbe`] when no probe is held.
    pub fn max_range(&self) -> Result<f64, SensorError> {
        Ok(self.shape()?.max_range())
    }

    /// Range quantization step, zero for none.
    ///
    /// # Errors
    ///
    /// [`SensorError::NoProbe`] when no probe is held.
    pub fn range_resolution(&self) -> Result<f64, SensorError> {
        Ok(self.shape()?.range_resolution())
    }

    /// Rays per horizontal scan line.
    ///
    /// # Errors
    ///
    /// [`SensorError::NoProbe`] when no probe is held.
    pub fn ray_count(&self) -> Result<usize, SensorError> {
        Ok(self.shape()?.ray_count())
    }

    /// Readings per horizontal scan line.
    ///
    /// # Errors
    ///
    /// [`SensorError::NoProbe`] when no probe is held.
    pub fn range_count(&self) -> Result<usize, SensorError> {
        Ok(self.shape()?.range_count())
    }

    /// Number of scan lines.
    ///
    /// # Errors
    ///
    /// [`SensorError::NoProbe`] when no probe is held.
    pub fn vertical_ray_count(&self) -> Result<usize, SensorError> {
        Ok(self.shape()?.vertical_ray_count())
    }

    /// Readings per vertical column.
    ///
    /// # Errors
    ///
    /// [`SensorError::NoProbe`] when no probe is held.
    pub fn vertical_range_count(&self) -> Result<usize, SensorError> {
        Ok(self.shape()?.vertical_range_count())
    }

    // =========================================================================
    // Readings
    // =========================================================================

    /// The latest reading set.
    ///
    /// # Errors
    ///
    /// [`SensorError::NoProbe`] when no probe is held.
    pub fn readings(&self) -> Result<&[RayReading], SensorError> {
        Ok(self.shape()?.readings())
    }

    /// Reading of ray `index`.
    ///
    /// # Errors
    ///
    /// [`SensorError::Index`] when `index` is out of bounds,
    /// [`SensorError::NoProbe`] when no probe is held.
    pub fn reading(&self, index: usize) -> Result<RayReading, SensorError> {
        self.shape()?
            .reading(index)
            .copied()
            .ok_or_else(|| self.index_error(index))
    }

    /// Distance measured by ray `index`.
    ///
    /// # Errors
    ///
    /// See [`RaySensor::reading`].
    pub fn range(&self, index: usize) -> Result<f64, SensorError> {
        self.shape()?.range(index).ok_or_else(|| self.index_error(index))
    }

    /// Retro-reflectance seen by ray `index`.
    ///
    /// # Errors
    ///
    /// See [`RaySensor::reading`].
    pub fn retro(&self, index: usize) -> Result<f64, SensorError> {
        self.shape()?.retro(index).ok_or_else(|| self.index_error(index))
    }

    /// Fiducial seen by ray `index`, `-1` for none.
    ///
    /// # Errors
    ///
    /// See [`RaySensor::reading`].
    pub fn fiducial(&self, index: usize) -> Result<i32, SensorError> {
        self.shape()?.fiducial(index).ok_or_else(|| self.index_error(index))
    }

    /// Number of completed refreshes.
    ///
    /// # Errors
    ///
    /// [`SensorError::NoProbe`] when no probe is held.
    pub fn update_count(&self) -> Result<u64, SensorError> {
        Ok(self.shape()?.update_count())
    }

    /// Copy the latest measurements into a serializable scan.
    ///
    /// # Errors
    ///
    /// [`SensorError::NoProbe`] when no probe is held.
    pub fn scan(&self) -> Result<RayScan, SensorError> {
        let shape = self.shape()?;
        let binding = self.binding()?;
        Ok(RayScan {
            sensor: self.core.name().to_string(),
            body: binding.scoped_body.clone(),
            time: self.core.last_update(),
            ray_count: shape.ray_count(),
            vertical_ray_count: shape.vertical_ray_count(),
            min_angle: shape.min_angle(),
            max_angle: shape.max_angle(),
            readings: shape.readings().to_vec(),
        })
    }

    // =========================================================================
    // Back-references
    // =========================================================================

    /// World pose of the body recorded by `init`.
    #[must_use]
    pub fn init_pose(&self) -> Option<Pose> {
        self.init_pose
    }

    /// Body the sensor is attached to.
    #[must_use]
    pub fn body(&self) -> Option<BodyId> {
        self.binding.as_ref().map(|b| b.body)
    }

    /// Scoped name of the body the sensor is attached to.
    #[must_use]
    pub fn body_name(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.scoped_body.as_str())
    }

    /// Model owning the body.
    #[must_use]
    pub fn model(&self) -> Option<ModelId> {
        self.binding.as_ref().map(|b| b.model)
    }

    /// Name of the world the sensor lives in.
    #[must_use]
    pub fn world_name(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.world.as_str())
    }

    /// The probe geometry, while held.
    #[must_use]
    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }
}

impl Default for RaySensor {
    fn default() -> Self {
        Self::new()
    }
}

impl Sensor for RaySensor {
    fn core(&self) -> &SensorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SensorCore {
        &mut self.core
    }

    fn load(&mut self, element: Element<'_>, worlds: &WorldRegistry) -> Result<(), SensorError> {
        self.core
            .require("load", |state| state == SensorState::Uninitialized)?;
        self.core.load_attributes(element)?;
        let sensor = self.core.name().to_string();

        let ancestry = resolver::resolve(element).map_err(|source| SensorError::Resolution {
            sensor: sensor.clone(),
            source,
        })?;
        let binding_error = |target: &'static str, name: &str| SensorError::Binding {
            sensor: sensor.clone(),
            target,
            name: name.to_string(),
        };

        let world = worlds
            .get(&ancestry.world)
            .ok_or_else(|| binding_error("world", &ancestry.world))?;
        let scoped_body = ancestry.scoped_body_name();
        let body = world
            .body_by_scoped_name(&scoped_body)
            .ok_or_else(|| binding_error("body", &scoped_body))?;

        let mut geometry = world
            .physics_engine()
            .create_geometry(world, GeometryKind::MultiRay, body.id(), &format!("{sensor}::ray"))
            .map_err(|e| self.core.physics_error(e))?;
        geometry
            .multi_ray_mut()
            .map_err(|e| self.core.physics_error(e))?
            .load(element)
            .map_err(|e| self.core.config_error(e))?;

        info!(
            sensor = %sensor,
            body = %scoped_body,
            rays = geometry.multi_ray().map_or(0, |shape| shape.config().total_rays()),
            "ray sensor loaded"
        );

        self.binding = Some(Binding {
            world: ancestry.world,
            model: body.model(),
            body: body.id(),
            scoped_body,
        });
        self.geometry = Some(geometry);
        self.core.set_state(SensorState::Loaded);
        Ok(())
    }

    fn init(&mut self, worlds: &WorldRegistry) -> Result<(), SensorError> {
        self.core
            .require("init", |state| state == SensorState::Loaded)?;

        let world = self.bound_world(worlds)?;
        let binding = self.binding()?;
        let pose = world
            .body(binding.body)
            .map(sonde_physics::Body::world_pose)
            .ok_or_else(|| SensorError::Binding {
                sensor: self.core.name().to_string(),
                target: "body",
                name: binding.scoped_body.clone(),
            })?;

        let Some(geometry) = self.geometry.as_mut() else {
            return Err(SensorError::NoProbe {
                sensor: self.core.name().to_string(),
            });
        };
        geometry
            .multi_ray_mut()
            .map_err(|e| self.core.physics_error(e))?
            .init();

        self.init_pose = Some(pose);
        self.core.reset_refresh();
        self.core.set_state(if self.core.always_on() {
            SensorState::Active
        } else {
            SensorState::Inactive
        });
        debug!(sensor = %self.core.name(), pose = %pose, "ray sensor initialized");
        Ok(())
    }

    fn update(
        &mut self,
        worlds: &WorldRegistry,
        sim_time: f64,
        force: bool,
    ) -> Result<bool, SensorError> {
        self.core.require("update", SensorState::is_initialized)?;
        if !self.core.should_refresh(sim_time, force) {
            return Ok(false);
        }

        let world = self.bound_world(worlds)?;
        let Some(geometry) = self.geometry.as_mut() else {
            return Err(SensorError::NoProbe {
                sensor: self.core.name().to_string(),
            });
        };
        let shape = geometry
            .multi_ray_mut()
            .map_err(|e| self.core.physics_error(e))?;

        if let Err(e) = shape.update(world) {
            warn!(sensor = %self.core.name(), error = %e, "ray sensor refresh failed, keeping previous readings");
            return Err(self.core.physics_error(e));
        }

        self.core.mark_refreshed(sim_time);
        Ok(true)
    }

    fn fini(&mut self) {
        if self.core.state() == SensorState::Finalized {
            return;
        }
        if self.geometry.take().is_some() {
            debug!(sensor = %self.core.name(), "ray sensor released its probe");
        }
        self.core.set_state(SensorState::Finalized);
    }

    fn as_ray(&self) -> Option<&RaySensor> {
        Some(self)
    }

    fn as_ray_mut(&mut self) -> Option<&mut RaySensor> {
        Some(self)
    }
}
