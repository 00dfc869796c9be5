//! Rigid transforms.

use std::fmt;
use std::ops::Mul;

use glam::{DQuat, DVec3, EulerRot};
use serde::{Deserialize, Serialize};

/// Position and orientation of a frame relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Translation
    pub position: DVec3,
    /// Orientation
    pub rotation: DQuat,
}

impl Pose {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        position: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
    };

    /// Create a pose from a translation and an orientation.
    #[must_use]
    pub fn new(position: DVec3, rotation: DQuat) -> Self {
        Self { position, rotation }
    }

    /// Create a pure translation.
    #[must_use]
    pub fn from_position(position: DVec3) -> Self {
        Self {
            position,
            rotation: DQuat::IDENTITY,
        }
    }

    /// Create a pose from a translation and roll/pitch/yaw angles (radians).
    ///
    /// Rotations are applied about the fixed X, then Y, then Z axes.
    #[must_use]
    pub fn from_xyz_rpy(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Self {
            position: DVec3::new(x, y, z),
            rotation: DQuat::from_euler(EulerRot::ZYX, yaw, pitch, roll),
        }
    }

    /// Parse `"x y z roll pitch yaw"` or `"x y z"`.
    ///
    /// Returns `None` for any other arity or a non-numeric token.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let values = text
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()
            .ok()?;

        match values.as_slice() {
            [x, y, z] => Some(Self::from_position(DVec3::new(*x, *y, *z))),
            [x, y, z, roll, pitch, yaw] => Some(Self::from_xyz_rpy(*x, *y, *z, *roll, *pitch, *yaw)),
            _ => None,
        }
    }

    /// Map a point from this frame into the parent frame.
    #[must_use]
    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.position + self.rotation * point
    }

    /// Rotate a direction from this frame into the parent frame.
    #[must_use]
    pub fn rotate_vector(&self, vector: DVec3) -> DVec3 {
        self.rotation * vector
    }

    /// The inverse transform.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            position: rotation * -self.position,
            rotation,
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// `parent * child` yields the child's pose in the parent's parent frame.
impl Mul for Pose {
    type Output = Pose;

    fn mul(self, child: Pose) -> Pose {
        Pose {
            position: self.transform_point(child.position),
            rotation: (self.rotation * child.rotation).normalize(),
        }
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (yaw, pitch, roll) = self.rotation.to_euler(EulerRot::ZYX);
        write!(
            f,
            "{} {} {} {} {} {}",
            self.position.x, self.position.y, self.position.z, roll, pitch, yaw
        )
    }
}
