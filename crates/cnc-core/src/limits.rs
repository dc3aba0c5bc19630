//! Soft-limits interface.
//!
//! The concrete bounds checker is an external collaborator per spec.md §1 —
//! the interpreter only depends on the `SoftLimitCheck` trait boundary. A
//! straightforward bounds-based implementation is provided since it is the
//! only usable default and nothing else in the workspace would supply one.

use crate::error::CncError;

/// Validates a machine-space point against configured bounds.
pub trait SoftLimitCheck {
    /// Check one machine-space point, raising `CncError::SoftLimit` with the
    /// offending axis, value, and configured (min, max) on violation.
    fn check_point(&self, point: (f64, f64, f64)) -> crate::error::Result<()>;
}

/// Per-axis min/max bounds in millimeters, machine space.
#[derive(Debug, Clone, Copy, Default)]
pub struct AxisLimits {
    pub x: Option<(f64, f64)>,
    pub y: Option<(f64, f64)>,
    pub z: Option<(f64, f64)>,
}

impl SoftLimitCheck for AxisLimits {
    fn check_point(&self, point: (f64, f64, f64)) -> crate::error::Result<()> {
        let (x, y, z) = point;
        if let Some((min, max)) = self.x {
            if x < min || x > max {
                return Err(CncError::SoftLimit {
                    axis: "X",
                    value: x,
                    min,
                    max,
                });
            }
        }
        if let Some((min, max)) = self.y {
            if y < min || y > max {
                return Err(CncError::SoftLimit {
                    axis: "Y",
                    value: y,
                    min,
                    max,
                });
            }
        }
        if let Some((min, max)) = self.z {
            if z < min || z > max {
                return Err(CncError::SoftLimit {
                    axis: "Z",
                    value: z,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }
}
