//! Scenario, determinism and property tests for the sensor stack.
//!
//! - `scenarios.rs`: single-sensor behavior against hand-built worlds
//! - `determinism.rs`: repeated and independent scans of seeded random worlds
//! - `integration.rs`: scene loading and stepping through the manager
//! - `properties.rs`: proptest invariants for resolution and configuration
//! - `helpers.rs`: scene builders shared by the above

mod helpers;
mod integration;

pub use helpers::*;
