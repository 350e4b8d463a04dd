//! Field geometry
//!
//! Truth = meters, pitch-centered: x runs along the length (goal to goal),
//! y across the width, (0, 0) is the center spot.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::error::{PitchControlError, Result};

/// Position on the pitch (meters)
pub type Point = Point2<f64>;

/// Velocity (m/s)
pub type Velocity = Vector2<f64>;

pub const DEFAULT_FIELD_LENGTH_M: f64 = 106.0;
pub const DEFAULT_FIELD_WIDTH_M: f64 = 68.0;

#[inline]
pub fn distance(a: &Point, b: &Point) -> f64 {
    nalgebra::distance(a, b)
}

/// Pitch length and width in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldDimensions {
    pub length: f64,
    pub width: f64,
}

impl Default for FieldDimensions {
    fn default() -> Self {
        Self { length: DEFAULT_FIELD_LENGTH_M, width: DEFAULT_FIELD_WIDTH_M }
    }
}

impl FieldDimensions {
    pub fn new(length: f64, width: f64) -> Result<Self> {
        let dims = Self { length, width };
        dims.validate()?;
        Ok(dims)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("field_length", self.length), ("field_width", self.width)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(PitchControlError::InvalidParameter {
                    name,
                    value,
                    reason: "must be positive and finite",
                });
            }
        }
        Ok(())
    }

    #[inline]
    pub fn half_length(&self) -> f64 {
        self.length / 2.0
    }

    #[inline]
    pub fn half_width(&self) -> f64 {
        self.width / 2.0
    }

    /// Whether a point lies on the pitch (touchlines inclusive)
    pub fn contains(&self, p: &Point) -> bool {
        p.x.abs() <= self.half_length() && p.y.abs() <= self.half_width()
    }
}
