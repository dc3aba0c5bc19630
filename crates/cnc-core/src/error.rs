//! Error types for the CNC motion pipeline.
//!
//! The parser never raises: unparseable words are silently dropped (a
//! `ParseWarning` per spec, but there is nothing to construct for it). Every
//! other failure kind below is fatal to the current job and drives the
//! controller into `ControllerState::Cancelled`.

use thiserror::Error;

/// Errors raised while interpreting a line or geometry, planning a window,
/// executing a primitive, or driving the controller state machine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CncError {
    /// A modal precondition was violated (e.g. feedrate missing on a linear
    /// move, or an arc commanded in an unsupported plane).
    #[error("modal error: {0}")]
    Modal(String),

    /// Arc geometry could not be resolved (zero radius, identical endpoints
    /// on an R-form arc, chord longer than the diameter, or neither IJK nor
    /// R supplied).
    #[error("arc geometry error: {0}")]
    Geometry(String),

    /// A machine-space endpoint fell outside the configured soft limits.
    #[error("soft limit exceeded on {axis}: {value:.3} (limits {min:.3}..{max:.3})")]
    SoftLimit {
        axis: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// The executor reported a failure while consuming a planned primitive.
    #[error("executor error: {0}")]
    Executor(String),

    /// A controller command was invalid for the current state (e.g. START
    /// while not Idle, RESUME while not Hold, START after Cancel without
    /// Reset first).
    #[error("invalid controller state transition: {0}")]
    State(String),
}

pub type Result<T> = core::result::Result<T, CncError>;
