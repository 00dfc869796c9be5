//! Built-in sensor types.
//!
//! - [`RaySensor`]: multi-ray range finder, registered as `"ray"`
//!
//! # Registration
//!
//! [`SensorRegistry::with_builtins()`](crate::registry::SensorRegistry::with_builtins)
//! registers every type in this module under its type identifier.

mod ray;

pub use ray::{RayScan, RaySensor, RAY_SENSOR_TYPE};
