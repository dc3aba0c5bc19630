//! Motion primitives: the interpreter's output and the planner's input.

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

/// Tagged motion kind. Only `Rapid` and `Linear` ever reach the planner —
/// `ArcCw`/`ArcCcw` are transient interpreter state, fully expanded into
/// `Linear` primitives before the planner sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum MotionType {
    Rapid,
    Linear,
    ArcCw,
    ArcCcw,
}

/// A single straight-line move in machine coordinates (millimeters).
///
/// Immutable once constructed. `feedrate` is `None` only for `Rapid` moves;
/// the planner substitutes `max_velocity` for those.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct MotionPrimitive {
    pub motion: MotionType,
    pub start: (f64, f64, f64),
    pub end: (f64, f64, f64),
    pub feedrate: Option<f64>,
}

impl MotionPrimitive {
    pub fn new(
        motion: MotionType,
        start: (f64, f64, f64),
        end: (f64, f64, f64),
        feedrate: Option<f64>,
    ) -> Self {
        Self {
            motion,
            start,
            end,
            feedrate,
        }
    }

    /// Euclidean length of `end - start`, in millimeters.
    pub fn length(&self) -> f64 {
        let dx = self.end.0 - self.start.0;
        let dy = self.end.1 - self.start.1;
        let dz = self.end.2 - self.start.2;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_is_euclidean() {
        let p = MotionPrimitive::new(
            MotionType::Linear,
            (0.0, 0.0, 0.0),
            (3.0, 4.0, 0.0),
            Some(100.0),
        );
        assert!((p.length() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn zero_length_move() {
        let p = MotionPrimitive::new(
            MotionType::Rapid,
            (1.0, 1.0, 1.0),
            (1.0, 1.0, 1.0),
            None,
        );
        assert_eq!(p.length(), 0.0);
    }
}
