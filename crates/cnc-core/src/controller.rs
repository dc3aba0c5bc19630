//! Cooperative controller: owns the planner window, the ready queue, and the
//! line source/executor pair, and advances the whole pipeline one bounded
//! `pump` tick at a time. There is no background thread here — a host is
//! expected to call `pump` from its own periodic tick (e.g. every 10ms).

use std::collections::VecDeque;

use tracing::{error, info, warn};

use crate::error::{CncError, Result};
use crate::interfaces::{LineSource, MotionExecutor};
use crate::interpreter::Interpreter;
use crate::limits::SoftLimitCheck;
use crate::modal::ModalState;
use crate::parser::parse_line;
use crate::planner::{CncPlanner, PlannedPrimitive, PlannerConfig};
use crate::primitives::MotionType;

const REPORT_STEP_MM_DEFAULT: f64 = 10.0;
const EPS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Running,
    Hold,
    Cancelled,
}

/// Tunables governing the controller's cooperative behavior, distinct from
/// the planner's own `PlannerConfig`.
#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    /// Ready queue is refilled only while it holds fewer than this many
    /// planned primitives.
    pub lookahead_size: usize,
    /// Emit a progress report every this many millimeters of executed motion.
    pub report_step_mm: f64,
    /// If set, `pump` checks the executor's `buffer_time` before doing any
    /// work and skips the tick entirely when it exceeds this value.
    pub max_buffered_executor_time: Option<f64>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            lookahead_size: 64,
            report_step_mm: REPORT_STEP_MM_DEFAULT,
            max_buffered_executor_time: None,
        }
    }
}

/// Outcome of a single `pump` call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PumpReport {
    pub lines_read: usize,
    pub primitives_executed: usize,
    pub done: bool,
    pub skipped_for_backpressure: bool,
}

/// Format a duration in seconds as a compact human string: `"1h 2m 3s"`,
/// `"2m 3s"`, or `"3s"`.
pub fn format_eta(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;

    if h > 0 {
        format!("{h}h {m}m {s}s")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}

/// Drives parser → modal state → interpreter → planner → executor.
pub struct Controller<L: LineSource, E: MotionExecutor> {
    line_source: L,
    executor: E,
    modal: ModalState,
    soft_limits: Option<Box<dyn SoftLimitCheck>>,
    planner: CncPlanner,
    ready_queue: VecDeque<PlannedPrimitive>,
    config: ControllerConfig,

    state: ControllerState,
    draining: bool,
    opened: bool,
    eof: bool,

    total_length: f64,
    completed_length: f64,
    last_reported: f64,
}

impl<L: LineSource, E: MotionExecutor> Controller<L, E> {
    pub fn new(
        line_source: L,
        executor: E,
        planner_config: PlannerConfig,
        soft_limits: Option<Box<dyn SoftLimitCheck>>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            line_source,
            executor,
            modal: ModalState::new(),
            soft_limits,
            planner: CncPlanner::new(planner_config),
            ready_queue: VecDeque::new(),
            config,
            state: ControllerState::Idle,
            draining: false,
            opened: false,
            eof: false,
            total_length: 0.0,
            completed_length: 0.0,
            last_reported: 0.0,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Configure the machine-level knobs a host loads from its machine
    /// profile (rapid feedrate, arc chordal tolerance, max segment time).
    /// Call before `start()`; these survive `reset()`.
    pub fn set_machine_defaults(
        &mut self,
        rapid_feedrate_mm_per_min: f64,
        arc_tolerance_mm: f64,
        max_segment_time_s: f64,
    ) {
        self.modal
            .set_machine_defaults(rapid_feedrate_mm_per_min, arc_tolerance_mm, max_segment_time_s);
    }

    /// Configure a work-coordinate-system offset (G54..G59 -> 0..5). Not
    /// driven by any G-code in the accepted dialect; a host sets these out
    /// of band before a job starts.
    pub fn set_work_offset(&mut self, wcs_index: usize, offset: (f64, f64, f64)) {
        self.modal.set_work_offset(wcs_index, offset);
    }

    /// Total program length in millimeters, used only for progress/ETA
    /// reporting. A host typically pre-scans the file to compute this.
    pub fn set_total_length(&mut self, total_length: f64) {
        self.total_length = total_length;
    }

    pub fn start(&mut self) -> Result<()> {
        if self.state == ControllerState::Cancelled {
            return Err(CncError::State(
                "cannot start: controller is cancelled, reset required".into(),
            ));
        }
        if !self.opened {
            self.line_source.open()?;
            self.opened = true;
        }
        self.state = ControllerState::Running;
        info!("controller started");
        Ok(())
    }

    pub fn feed_hold(&mut self) -> Result<()> {
        if self.state != ControllerState::Running {
            return Err(CncError::State("feed_hold while not Running".into()));
        }
        self.state = ControllerState::Hold;
        self.report_progress();
        info!("feed hold");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        if self.state != ControllerState::Hold {
            return Err(CncError::State("resume while not in Hold".into()));
        }
        self.state = ControllerState::Running;
        info!("resumed");
        Ok(())
    }

    pub fn cancel(&mut self) {
        if self.state != ControllerState::Cancelled {
            self.state = ControllerState::Cancelled;
            warn!("controller cancelled");
        }
    }

    pub fn reset(&mut self) -> Result<()> {
        if self.opened {
            self.line_source.close()?;
            self.opened = false;
        }
        self.modal.reset();
        self.planner.reset();
        self.ready_queue.clear();
        self.eof = false;
        self.draining = false;
        self.total_length = 0.0;
        self.completed_length = 0.0;
        self.last_reported = 0.0;
        self.state = ControllerState::Idle;
        info!("controller reset");
        Ok(())
    }

    /// One cooperative slice: refill the ready queue from the line source
    /// (bounded by `max_lines`), then execute up to `max_steps` planned
    /// primitives. `now` is the executor's own clock, used for
    /// back-pressure and Draining.
    pub fn pump(&mut self, max_lines: usize, max_steps: usize, now: f64) -> PumpReport {
        if self.state == ControllerState::Cancelled {
            return PumpReport {
                done: false,
                ..Default::default()
            };
        }

        if let Some(max_buf) = self.config.max_buffered_executor_time {
            if let Some(buffered) = self.executor.buffer_time(now) {
                if buffered > max_buf {
                    return PumpReport {
                        skipped_for_backpressure: true,
                        ..Default::default()
                    };
                }
            }
        }

        let lines_read = match self.refill(max_lines) {
            Ok(n) => n,
            Err(e) => {
                error!(error = %e, "refill failed, cancelling job");
                self.state = ControllerState::Cancelled;
                return PumpReport {
                    lines_read: 0,
                    done: false,
                    ..Default::default()
                };
            }
        };

        let steps = if self.state == ControllerState::Running {
            max_steps
        } else {
            0
        };
        let primitives_executed = match self.execute(steps) {
            Ok(n) => n,
            Err(e) => {
                error!(error = %e, "execution failed, cancelling job");
                self.state = ControllerState::Cancelled;
                return PumpReport {
                    lines_read,
                    primitives_executed: 0,
                    done: false,
                    skipped_for_backpressure: false,
                };
            }
        };

        let done = self.check_done(now);

        PumpReport {
            lines_read,
            primitives_executed,
            done,
            skipped_for_backpressure: false,
        }
    }

    fn refill(&mut self, max_lines: usize) -> Result<usize> {
        let mut lines_read = 0;

        while !self.eof
            && self.ready_queue.len() < self.config.lookahead_size
            && lines_read < max_lines
        {
            match self.line_source.next_line()? {
                None => {
                    self.eof = true;
                    let committed = self.planner.finish();
                    self.ready_queue.extend(committed);
                }
                Some(line) => {
                    lines_read += 1;
                    let parsed = parse_line(&line);
                    let mut interp =
                        Interpreter::new(&mut self.modal, self.soft_limits.as_deref());
                    let primitives = interp.interpret(&parsed)?;
                    for p in primitives {
                        let committed = self.planner.push(p);
                        self.ready_queue.extend(committed);
                    }
                }
            }
        }

        Ok(lines_read)
    }

    fn execute(&mut self, max_steps: usize) -> Result<usize> {
        let mut executed = 0;
        while executed < max_steps {
            let Some(planned) = self.ready_queue.pop_front() else {
                break;
            };

            if planned.primitive.motion == MotionType::Linear && planned.primitive.feedrate.is_none()
            {
                return Err(CncError::Modal(
                    "feedrate unresolved at execute time on a Linear primitive".into(),
                ));
            }

            self.executor.execute(&planned)?;
            executed += 1;
            self.completed_length += planned.primitive.length();

            if self.completed_length - self.last_reported >= self.config.report_step_mm {
                self.last_reported = self.completed_length;
                self.report_progress();
            }
        }
        Ok(executed)
    }

    fn check_done(&mut self, now: f64) -> bool {
        let pipeline_empty = self.eof && self.planner.is_empty() && self.ready_queue.is_empty();
        if !pipeline_empty {
            return false;
        }

        match self.executor.buffer_time(now) {
            None => true,
            Some(buffered) if buffered <= EPS => {
                if self.draining {
                    info!("drain complete");
                }
                true
            }
            Some(_) => {
                if !self.draining {
                    self.draining = true;
                    info!("draining executor buffer before declaring completion");
                }
                false
            }
        }
    }

    pub fn progress_percent(&self) -> Option<f64> {
        if self.total_length <= 0.0 {
            return None;
        }
        Some((self.completed_length / self.total_length) * 100.0)
    }

    pub fn eta_seconds(&self) -> Option<f64> {
        if self.total_length <= 0.0 {
            return None;
        }
        let remaining = (self.total_length - self.completed_length).max(0.0);
        let feed = self.executor.last_feedrate()?;
        if feed <= 0.0 {
            return None;
        }
        Some(remaining / feed)
    }

    fn report_progress(&self) {
        if self.total_length <= 0.0 {
            return;
        }
        let pct = self.progress_percent().unwrap_or(0.0);
        match self.eta_seconds() {
            Some(eta) => info!("{pct:.1}% | ETA {}", format_eta(eta)),
            None => info!("{pct:.1}% | ETA ?"),
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        self.executor.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::PlannerConfig;

    struct VecLineSource {
        lines: VecDeque<String>,
        opened: bool,
    }

    impl VecLineSource {
        fn new(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|s| s.to_string()).collect(),
                opened: false,
            }
        }
    }

    impl LineSource for VecLineSource {
        fn open(&mut self) -> Result<()> {
            self.opened = true;
            Ok(())
        }
        fn next_line(&mut self) -> Result<Option<String>> {
            Ok(self.lines.pop_front())
        }
        fn close(&mut self) -> Result<()> {
            self.opened = false;
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingExecutor {
        executed: Vec<PlannedPrimitive>,
        flushed: bool,
    }

    impl MotionExecutor for RecordingExecutor {
        fn execute(&mut self, primitive: &PlannedPrimitive) -> Result<()> {
            self.executed.push(*primitive);
            Ok(())
        }
        fn flush(&mut self) -> Result<()> {
            self.flushed = true;
            Ok(())
        }
    }

    fn small_planner_config() -> PlannerConfig {
        PlannerConfig {
            max_velocity: 200.0,
            max_accel: 1000.0,
            axis_accels: None,
            junction_deviation: 0.05,
            buffer_time: 0.0,
            keep_tail_moves: 0,
            max_window_moves: 8,
        }
    }

    #[test]
    fn start_while_cancelled_is_state_error() {
        let mut c = Controller::new(
            VecLineSource::new(&[]),
            RecordingExecutor::default(),
            small_planner_config(),
            None,
            ControllerConfig::default(),
        );
        c.cancel();
        assert!(matches!(c.start(), Err(CncError::State(_))));
    }

    #[test]
    fn resume_while_not_hold_is_state_error() {
        let mut c = Controller::new(
            VecLineSource::new(&[]),
            RecordingExecutor::default(),
            small_planner_config(),
            None,
            ControllerConfig::default(),
        );
        assert!(matches!(c.resume(), Err(CncError::State(_))));
    }

    #[test]
    fn full_program_drains_and_reports_done() {
        let mut c = Controller::new(
            VecLineSource::new(&["G1 F600 X10", "G1 X20"]),
            RecordingExecutor::default(),
            small_planner_config(),
            None,
            ControllerConfig::default(),
        );
        c.start().unwrap();

        let mut done = false;
        for _ in 0..10_000 {
            let report = c.pump(10, 10, 0.0);
            if report.done {
                done = true;
                break;
            }
        }
        assert!(done);
        assert_eq!(c.state(), ControllerState::Running);
    }

    #[test]
    fn hold_blocks_execution_but_keeps_refilling() {
        let mut c = Controller::new(
            VecLineSource::new(&["G1 F600 X10"]),
            RecordingExecutor::default(),
            small_planner_config(),
            None,
            ControllerConfig::default(),
        );
        c.start().unwrap();
        c.feed_hold().unwrap();

        let report = c.pump(10, 10, 0.0);
        assert_eq!(report.primitives_executed, 0);
        assert!(report.lines_read > 0 || report.done == false);
    }

    #[test]
    fn cancel_stops_pumping_immediately() {
        let mut c = Controller::new(
            VecLineSource::new(&["G1 F600 X10"]),
            RecordingExecutor::default(),
            small_planner_config(),
            None,
            ControllerConfig::default(),
        );
        c.start().unwrap();
        c.cancel();
        let report = c.pump(10, 10, 0.0);
        assert_eq!(report.lines_read, 0);
        assert_eq!(report.primitives_executed, 0);
    }

    #[test]
    fn reset_after_cancel_returns_to_idle() {
        let mut c = Controller::new(
            VecLineSource::new(&["G1 F600 X10"]),
            RecordingExecutor::default(),
            small_planner_config(),
            None,
            ControllerConfig::default(),
        );
        c.start().unwrap();
        c.cancel();
        c.reset().unwrap();
        assert_eq!(c.state(), ControllerState::Idle);
        c.start().unwrap();
        assert_eq!(c.state(), ControllerState::Running);
    }

    #[test]
    fn format_eta_matches_expected_buckets() {
        assert_eq!(format_eta(5.0), "5s");
        assert_eq!(format_eta(65.0), "1m 5s");
        assert_eq!(format_eta(3665.0), "1h 1m 5s");
    }
}
