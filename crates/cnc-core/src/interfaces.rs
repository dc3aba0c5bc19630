//! External collaborator traits the controller drives but never owns a
//! concrete implementation of. Both sides of the pipeline boundary — the
//! line-at-a-time file reader and the downstream motion executor — live
//! outside this crate; only these interfaces are specified here.

use crate::error::Result;
use crate::planner::PlannedPrimitive;

/// A line-at-a-time source of G-code text. Implementations must skip blank
/// lines and lines beginning with `;` or `(` themselves — the controller
/// treats every non-`None` return as a line worth parsing.
pub trait LineSource {
    fn open(&mut self) -> Result<()>;

    /// Returns the next line, or `None` at end of stream.
    fn next_line(&mut self) -> Result<Option<String>>;

    fn close(&mut self) -> Result<()>;
}

/// The downstream motion sink. `execute` must be non-blocking; any queueing
/// depth is the executor's own responsibility.
pub trait MotionExecutor {
    fn execute(&mut self, primitive: &PlannedPrimitive) -> Result<()>;

    /// Block until all previously-submitted motion is complete.
    fn flush(&mut self) -> Result<()>;

    /// Remaining queued motion time in seconds, if the executor can report
    /// it. Used for back-pressure and for the Draining sub-state.
    fn buffer_time(&self, _now: f64) -> Option<f64> {
        None
    }

    /// Feedrate (mm/s) of the most recently executed primitive, if known.
    /// Used only for ETA reporting.
    fn last_feedrate(&self) -> Option<f64> {
        None
    }
}
