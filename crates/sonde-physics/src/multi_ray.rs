//! Multi-ray probe.
//!
//! A [`MultiRayShape`] is a fan of rays anchored on a body. Rays are laid out
//! on a grid of `ray_count` horizontal by `vertical_ray_count` vertical
//! samples, spread evenly between the configured minimum and maximum angles.
//! Reading `i` belongs to horizontal sample `i % ray_count` and vertical
//! sample `i / ray_count`.
//!
//! Each [`update`](MultiRayShape::update) casts every ray against the world
//! and replaces the whole reading set at once. If the pass cannot run, the
//! previous readings are left in place.
//!
//! # Descriptor layout
//!
//! Configuration is read from the sensor element:
//!
//! ```text
//! sensor pose="x y z roll pitch yaw"
//! └── ray
//!     ├── scan
//!     │   ├── horizontal samples min_angle max_angle
//!     │   └── vertical   samples min_angle max_angle     (optional)
//!     └── range min max resolution                        (required)
//! ```
//!
//! # Example
//!
//! ```
//! use sonde_physics::{MultiRayConfig, MultiRayShape, Pose, World};
//!
//! let mut world = World::new("default");
//! let robot = world.add_model("robot", Pose::IDENTITY);
//! let base = world.add_body(robot, "base", Pose::IDENTITY);
//!
//! let mut shape = MultiRayShape::new(base);
//! shape
//!     .configure(MultiRayConfig::default().with_horizontal(3, -0.5, 0.5).with_range(0.1, 5.0, 0.0))
//!     .unwrap();
//! shape.init();
//! shape.update(&world).unwrap();
//!
//! assert_eq!(shape.readings().len(), 3);
//! assert!(shape.readings().iter().all(|r| r.range == 5.0));
//! ```

use glam::DVec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collision::CollideMask;
use crate::engine::Ray;
use crate::error::{ConfigError, PhysicsError};
use crate::pose::Pose;
use crate::sdf::Element;
use crate::world::{BodyId, World};
use crate::Angle;

// =============================================================================
// Configuration
// =============================================================================

/// Upper bound on the rays of one probe (`ray_count * vertical_ray_count`).
pub const MAX_RAYS: usize = 1 << 20;

/// Probe layout and range limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MultiRayConfig {
    /// Angle of the first horizontal sample
    pub min_angle: Angle,
    /// Angle of the last horizontal sample
    pub max_angle: Angle,
    /// Angle of the lowest vertical sample
    pub vertical_min_angle: Angle,
    /// Angle of the highest vertical sample
    pub vertical_max_angle: Angle,
    /// Hits closer than this are ignored
    pub min_range: f64,
    /// Reported when nothing is hit
    pub max_range: f64,
    /// Ranges are rounded to multiples of this; `0` disables rounding
    pub range_resolution: f64,
    /// Horizontal samples
    pub ray_count: usize,
    /// Vertical samples
    pub vertical_ray_count: usize,
    /// Probe origin relative to the body
    pub origin: Pose,
    /// Categories the rays can hit
    pub collide_mask: CollideMask,
}

impl Default for MultiRayConfig {
    fn default() -> Self {
        Self {
            min_angle: Angle::ZERO,
            max_angle: Angle::ZERO,
            vertical_min_angle: Angle::ZERO,
            vertical_max_angle: Angle::ZERO,
            min_range: 0.0,
            max_range: 10.0,
            range_resolution: 0.0,
            ray_count: 1,
            vertical_ray_count: 1,
            origin: Pose::IDENTITY,
            collide_mask: CollideMask::all(),
        }
    }
}

impl MultiRayConfig {
    /// Set the horizontal fan.
    #[must_use]
    pub fn with_horizontal(mut self, count: usize, min_angle: f64, max_angle: f64) -> Self {
        self.ray_count = count;
        self.min_angle = Angle::from_radians(min_angle);
        self.max_angle = Angle::from_radians(max_angle);
        self
    }

    /// Set the vertical fan.
    #[must_use]
    pub fn with_vertical(mut self, count: usize, min_angle: f64, max_angle: f64) -> Self {
        self.vertical_ray_count = count;
        self.vertical_min_angle = Angle::from_radians(min_angle);
        self.vertical_max_angle = Angle::from_radians(max_angle);
        self
    }

    /// Set the range limits and resolution.
    #[must_use]
    pub fn with_range(mut self, min: f64, max: f64, resolution: f64) -> Self {
        self.min_range = min;
        self.max_range = max;
        self.range_resolution = resolution;
        self
    }

    /// Set the probe origin relative to the body.
    #[must_use]
    pub fn with_origin(mut self, origin: Pose) -> Self {
        self.origin = origin;
        self
    }

    /// Set the categories rays can hit.
    #[must_use]
    pub fn with_collide_mask(mut self, mask: CollideMask) -> Self {
        self.collide_mask = mask;
        self
    }

    /// Total number of rays.
    #[must_use]
    pub fn total_rays(&self) -> usize {
        self.ray_count.saturating_mul(self.vertical_ray_count)
    }

    /// Read the configuration from a sensor element.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `ray` or `ray/range` is missing, an
    /// attribute does not parse, or the result fails [`validate`](Self::validate).
    pub fn from_element(element: Element<'_>) -> Result<Self, ConfigError> {
        let ray = element.child("ray").ok_or_else(|| ConfigError::MissingElement {
            parent: element.path(),
            child: "ray",
        })?;
        let range = ray.child("range").ok_or_else(|| ConfigError::MissingElement {
            parent: ray.path(),
            child: "range",
        })?;
        let scan = ray.child("scan");

        let mut config = Self::default();
        if let Some(origin) = element.pose_value("pose")? {
            config.origin = origin;
        }

        if let Some(horizontal) = scan.and_then(|s| s.child("horizontal")) {
            let (count, min, max) = read_fan(horizontal, "ray_count")?;
            config.ray_count = count;
            config.min_angle = min;
            config.max_angle = max;
        }
        if let Some(vertical) = scan.and_then(|s| s.child("vertical")) {
            let (count, min, max) = read_fan(vertical, "vertical_ray_count")?;
            config.vertical_ray_count = count;
            config.vertical_min_angle = min;
            config.vertical_max_angle = max;
        }

        config.min_range = range.parse_value("min", "a number")?.unwrap_or(0.0);
        config.max_range = range.parse_value("max", "a number")?.unwrap_or(config.max_range);
        config.range_resolution = range.parse_value("resolution", "a number")?.unwrap_or(0.0);

        config.validate()?;
        Ok(config)
    }

    /// Check the layout invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a count is zero, the grid holds more than
    /// [`MAX_RAYS`] rays, an interval is inverted, or a range parameter is
    /// negative or not finite.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, count) in [
            ("ray_count", self.ray_count),
            ("vertical_ray_count", self.vertical_ray_count),
        ] {
            if count == 0 {
                return Err(ConfigError::InvalidCount { field, value: 0 });
            }
        }
        match self.ray_count.checked_mul(self.vertical_ray_count) {
            Some(total) if total <= MAX_RAYS => {}
            total => {
                return Err(ConfigError::InvalidCount {
                    field: "total_rays",
                    value: total.map_or(i64::MAX, |t| i64::try_from(t).unwrap_or(i64::MAX)),
                });
            }
        }

        for (field, value) in [
            ("min_angle", self.min_angle.radians()),
            ("max_angle", self.max_angle.radians()),
            ("vertical_min_angle", self.vertical_min_angle.radians()),
            ("vertical_max_angle", self.vertical_max_angle.radians()),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::InvalidValue { field, value });
            }
        }

        for (field, value) in [
            ("min_range", self.min_range),
            ("max_range", self.max_range),
            ("range_resolution", self.range_resolution),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue { field, value });
            }
        }
        if self.max_range <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "max_range",
                value: self.max_range,
            });
        }

        for (field, min, max) in [
            ("angle", self.min_angle.radians(), self.max_angle.radians()),
            (
                "vertical_angle",
                self.vertical_min_angle.radians(),
                self.vertical_max_angle.radians(),
            ),
            ("range", self.min_range, self.max_range),
        ] {
            if min > max {
                return Err(ConfigError::InvertedInterval { field, min, max });
            }
        }

        Ok(())
    }
}

fn read_fan(element: Element<'_>, field: &'static str) -> Result<(usize, Angle, Angle), ConfigError> {
    let samples: i64 = element.parse_value("samples", "an integer")?.unwrap_or(1);
    let count = usize::try_from(samples)
        .ok()
        .filter(|count| *count >= 1)
        .ok_or(ConfigError::InvalidCount {
            field,
            value: samples,
        })?;
    let min: f64 = element.parse_value("min_angle", "a number")?.unwrap_or(0.0);
    let max: f64 = element.parse_value("max_angle", "a number")?.unwrap_or(0.0);
    Ok((count, Angle::from_radians(min), Angle::from_radians(max)))
}

/// Evenly spaced sample `index` of `count` across `[min, max]`.
///
/// A single sample sits at the middle of the interval.
fn spread(min: Angle, max: Angle, index: usize, count: usize) -> f64 {
    if count <= 1 {
        return 0.5 * (min.radians() + max.radians());
    }
    #[allow(clippy::cast_precision_loss)]
    let fraction = index as f64 / (count - 1) as f64;
    min.radians() + fraction * (max.radians() - min.radians())
}

// =============================================================================
// Readings
// =============================================================================

/// Measurement of one ray.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RayReading {
    /// Distance to the detected surface, `max_range` when nothing was hit
    pub range: f64,
    /// Reflected intensity of the detected surface
    pub retro: f64,
    /// Tag of the detected surface, `-1` when untagged or nothing was hit
    pub fiducial: i32,
}

impl RayReading {
    /// Reading of a ray that hit nothing.
    #[must_use]
    pub fn no_hit(max_range: f64) -> Self {
        Self {
            range: max_range,
            retro: 0.0,
            fiducial: -1,
        }
    }
}

// =============================================================================
// Shape
// =============================================================================

/// A fan of rays attached to a body.
#[derive(Debug, Clone)]
pub struct MultiRayShape {
    body: BodyId,
    config: MultiRayConfig,
    directions: Vec<DVec3>,
    readings: Vec<RayReading>,
    update_count: u64,
}

impl MultiRayShape {
    /// Create a probe with the default configuration.
    #[must_use]
    pub fn new(body: BodyId) -> Self {
        let config = MultiRayConfig::default();
        Self {
            body,
            readings: vec![RayReading::no_hit(config.max_range); config.total_rays()],
            config,
            directions: Vec::new(),
            update_count: 0,
        }
    }

    /// Configure the probe from a sensor element.
    ///
    /// On failure the previous configuration is kept.
    ///
    /// # Errors
    ///
    /// See [`MultiRayConfig::from_element`].
    pub fn load(&mut self, element: Element<'_>) -> Result<(), ConfigError> {
        let config = MultiRayConfig::from_element(element)?;
        self.apply(config);
        Ok(())
    }

    /// Configure the probe directly.
    ///
    /// # Errors
    ///
    /// See [`MultiRayConfig::validate`].
    pub fn configure(&mut self, config: MultiRayConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.apply(config);
        Ok(())
    }

    fn apply(&mut self, config: MultiRayConfig) {
        debug!(
            body = %self.body,
            rays = config.ray_count,
            vertical_rays = config.vertical_ray_count,
            min_range = config.min_range,
            max_range = config.max_range,
            "multi-ray probe configured"
        );
        self.config = config;
        self.directions.clear();
        self.readings = vec![RayReading::no_hit(config.max_range); config.total_rays()];
    }

    /// Lay out the ray directions and reset the readings to "no hit".
    pub fn init(&mut self) {
        let config = &self.config;
        self.directions = (0..config.vertical_ray_count)
            .flat_map(|v| {
                let pitch = spread(config.vertical_min_angle, config.vertical_max_angle, v, config.vertical_ray_count);
                (0..config.ray_count).map(move |h| {
                    let yaw = spread(config.min_angle, config.max_angle, h, config.ray_count);
                    DVec3::new(pitch.cos() * yaw.cos(), pitch.cos() * yaw.sin(), pitch.sin())
                })
            })
            .collect();
        self.readings = vec![RayReading::no_hit(config.max_range); config.total_rays()];
    }

    /// Cast every ray and replace the reading set.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::BodyNotFound`] if the body left the world; the
    /// previous readings are kept.
    pub fn update(&mut self, world: &World) -> Result<(), PhysicsError> {
        let body = world.body(self.body).ok_or(PhysicsError::BodyNotFound(self.body))?;
        if self.directions.len() != self.config.total_rays() {
            self.init();
        }

        let sensor = body.world_pose() * self.config.origin;
        let engine = world.physics_engine();
        let config = self.config;
        let exclude = Some(self.body);

        let readings: Vec<RayReading> = self
            .directions
            .par_iter()
            .map(|direction| {
                let ray = Ray::new(sensor.position, sensor.rotate_vector(*direction));
                match engine.cast_ray(
                    world,
                    &ray,
                    config.min_range,
                    config.max_range,
                    config.collide_mask,
                    exclude,
                ) {
                    Some(hit) => RayReading {
                        range: quantize(hit.distance, &config),
                        retro: hit.surface.retro,
                        fiducial: hit.surface.fiducial,
                    },
                    None => RayReading::no_hit(config.max_range),
                }
            })
            .collect();

        self.readings = readings;
        self.update_count += 1;
        Ok(())
    }

    /// The body this probe is attached to.
    #[must_use]
    pub fn body(&self) -> BodyId {
        self.body
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &MultiRayConfig {
        &self.config
    }

    /// Number of completed raycast passes.
    #[must_use]
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    /// Angle of the first horizontal sample.
    #[must_use]
    pub fn min_angle(&self) -> Angle {
        self.config.min_angle
    }

    /// Angle of the last horizontal sample.
    #[must_use]
    pub fn max_angle(&self) -> Angle {
        self.config.max_angle
    }

    /// Angle of the lowest vertical sample.
    #[must_use]
    pub fn vertical_min_angle(&self) -> Angle {
        self.config.vertical_min_angle
    }

    /// Angle of the highest vertical sample.
    #[must_use]
    pub fn vertical_max_angle(&self) -> Angle {
        self.config.vertical_max_angle
    }

    /// Minimum range.
    #[must_use]
    pub fn min_range(&self) -> f64 {
        self.config.min_range
    }

    /// Maximum range.
    #[must_use]
    pub fn max_range(&self) -> f64 {
        self.config.max_range
    }

    /// Range resolution.
    #[must_use]
    pub fn range_resolution(&self) -> f64 {
        self.config.range_resolution
    }

    /// Horizontal ray count.
    #[must_use]
    pub fn ray_count(&self) -> usize {
        self.config.ray_count
    }

    /// Horizontal readings per scan line. One reading per ray.
    #[must_use]
    pub fn range_count(&self) -> usize {
        self.config.ray_count
    }

    /// Vertical ray count.
    #[must_use]
    pub fn vertical_ray_count(&self) -> usize {
        self.config.vertical_ray_count
    }

    /// Scan lines. One per vertical ray.
    #[must_use]
    pub fn vertical_range_count(&self) -> usize {
        self.config.vertical_ray_count
    }

    /// Latest readings in index order.
    #[must_use]
    pub fn readings(&self) -> &[RayReading] {
        &self.readings
    }

    /// Latest reading of ray `index`.
    #[must_use]
    pub fn reading(&self, index: usize) -> Option<&RayReading> {
        self.readings.get(index)
    }

    /// Latest range of ray `index`.
    #[must_use]
    pub fn range(&self, index: usize) -> Option<f64> {
        self.reading(index).map(|r| r.range)
    }

    /// Latest retro of ray `index`.
    #[must_use]
    pub fn retro(&self, index: usize) -> Option<f64> {
        self.reading(index).map(|r| r.retro)
    }

    /// Latest fiducial of ray `index`.
    #[must_use]
    pub fn fiducial(&self, index: usize) -> Option<i32> {
        self.reading(index).map(|r| r.fiducial)
    }

    /// Direction of ray `index` in the probe frame, once laid out.
    #[must_use]
    pub fn direction(&self, index: usize) -> Option<DVec3> {
        self.directions.get(index).copied()
    }
}

fn quantize(distance: f64, config: &MultiRayConfig) -> f64 {
    let snapped = if config.range_resolution > 0.0 {
        (distance / config.range_resolution).round() * config.range_resolution
    } else {
        distance
    };
    snapped.clamp(config.min_range, config.max_range)
}
