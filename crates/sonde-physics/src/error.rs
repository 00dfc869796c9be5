//! Error types for descriptors, probe configuration and physics operations.

use thiserror::Error;

use crate::world::BodyId;

/// Errors raised while reading a scene descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// The descriptor document could not be decoded.
    #[error("malformed descriptor document: {0}")]
    Json(#[from] serde_json::Error),

    /// An attribute value could not be parsed.
    #[error("attribute '{key}' of <{element}> has invalid value '{value}', expected {expected}")]
    InvalidValue {
        /// Tag of the element carrying the attribute
        element: String,
        /// Attribute name
        key: String,
        /// Raw attribute text
        value: String,
        /// Human-readable description of the expected form
        expected: &'static str,
    },
}

/// Malformed multi-ray probe parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required child element is absent.
    #[error("<{parent}> is missing required child <{child}>")]
    MissingElement {
        /// Tag of the element that should contain the child
        parent: String,
        /// Tag of the missing child
        child: &'static str,
    },

    /// An attribute could not be parsed.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// A ray count is below one.
    #[error("{field} must be at least 1, got {value}")]
    InvalidCount {
        /// Which count
        field: &'static str,
        /// The configured value
        value: i64,
    },

    /// A lower bound exceeds its upper bound.
    #[error("{field}: minimum {min} exceeds maximum {max}")]
    InvertedInterval {
        /// Which interval
        field: &'static str,
        /// Configured minimum
        min: f64,
        /// Configured maximum
        max: f64,
    },

    /// A scalar is negative, zero where it must be positive, or not finite.
    #[error("invalid {field}: {value}")]
    InvalidValue {
        /// Which parameter
        field: &'static str,
        /// The configured value
        value: f64,
    },
}

/// Errors from the physics engine and world queries.
#[derive(Debug, Error)]
pub enum PhysicsError {
    /// The body a geometry is attached to does not exist.
    #[error("body not found: {0}")]
    BodyNotFound(BodyId),

    /// `create_geometry` was asked for a kind it does not know.
    #[error("unknown geometry kind '{0}'")]
    UnknownGeometryKind(String),

    /// A capability query asked a geometry for a facet it does not have.
    #[error("geometry '{name}' is a {found} geometry, not {expected}")]
    WrongGeometryKind {
        /// Name of the geometry
        name: String,
        /// The requested kind
        expected: &'static str,
        /// The actual kind
        found: &'static str,
    },

    /// Probe configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Descriptor could not be read.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}
