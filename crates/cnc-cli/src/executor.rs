//! A mock motion executor: logs each planned primitive instead of driving
//! real hardware. Stands in for the "black-box sink" `cnc-core` is written
//! against, the way `mock_executor.py`'s `MockMotionExecutor` stands in for
//! a real stepper backend during offline testing.

use cnc_core::{CncError, PlannedPrimitive, MotionExecutor, Result};
use tracing::info;

#[derive(Debug, Default)]
pub struct MockExecutor {
    count: u64,
    last_feedrate: Option<f64>,
}

impl MotionExecutor for MockExecutor {
    fn execute(&mut self, primitive: &PlannedPrimitive) -> Result<()> {
        self.count += 1;
        self.last_feedrate = primitive.primitive.feedrate;
        info!(
            n = self.count,
            motion = ?primitive.primitive.motion,
            start = ?primitive.primitive.start,
            end = ?primitive.primitive.end,
            v_peak = primitive.v_peak,
            "executed primitive"
        );
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        info!("flush");
        Ok(())
    }

    fn buffer_time(&self, _now: f64) -> Option<f64> {
        Some(0.0)
    }

    fn last_feedrate(&self) -> Option<f64> {
        self.last_feedrate.map(|f| f / 60.0)
    }
}

/// Wraps any `MotionExecutor` and turns every `execute` after `fail_after`
/// calls into an `ExecutorError`, for exercising the controller's failure
/// path without a real hardware fault.
pub struct FlakyExecutor<E: MotionExecutor> {
    inner: E,
    calls: u64,
    fail_after: u64,
}

impl<E: MotionExecutor> FlakyExecutor<E> {
    pub fn new(inner: E, fail_after: u64) -> Self {
        Self {
            inner,
            calls: 0,
            fail_after,
        }
    }
}

impl<E: MotionExecutor> MotionExecutor for FlakyExecutor<E> {
    fn execute(&mut self, primitive: &PlannedPrimitive) -> Result<()> {
        self.calls += 1;
        if self.calls > self.fail_after {
            return Err(CncError::Executor(format!(
                "simulated executor fault after {} calls",
                self.fail_after
            )));
        }
        self.inner.execute(primitive)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn buffer_time(&self, now: f64) -> Option<f64> {
        self.inner.buffer_time(now)
    }

    fn last_feedrate(&self) -> Option<f64> {
        self.inner.last_feedrate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cnc_core::{
        Controller, ControllerConfig, ControllerState, LineSource, MotionPrimitive, MotionType,
        PlannerConfig,
    };
    use std::collections::VecDeque;

    fn planned(len: f64) -> PlannedPrimitive {
        let primitive =
            MotionPrimitive::new(MotionType::Linear, (0.0, 0.0, 0.0), (len, 0.0, 0.0), Some(600.0));
        PlannedPrimitive {
            primitive,
            v_entry: 0.0,
            v_exit: 0.0,
            v_peak: 10.0,
            accel: 1000.0,
            t_accel: 0.0,
            t_cruise: len / 10.0,
            t_decel: 0.0,
        }
    }

    #[test]
    fn flaky_executor_passes_through_until_fail_after_then_errors() {
        let mut exec = FlakyExecutor::new(MockExecutor::default(), 2);
        assert!(exec.execute(&planned(1.0)).is_ok());
        assert!(exec.execute(&planned(1.0)).is_ok());
        let err = exec.execute(&planned(1.0)).unwrap_err();
        assert!(matches!(err, CncError::Executor(_)));
    }

    struct VecLineSource {
        lines: VecDeque<String>,
    }

    impl VecLineSource {
        fn new(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    impl LineSource for VecLineSource {
        fn open(&mut self) -> Result<()> {
            Ok(())
        }
        fn next_line(&mut self) -> Result<Option<String>> {
            Ok(self.lines.pop_front())
        }
        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn planner_config() -> PlannerConfig {
        PlannerConfig {
            max_velocity: 200.0,
            max_accel: 1000.0,
            axis_accels: None,
            junction_deviation: 0.05,
            buffer_time: 0.0,
            keep_tail_moves: 0,
            max_window_moves: 50,
        }
    }

    #[test]
    fn executor_failure_drives_the_controller_to_cancelled() {
        let line_source = VecLineSource::new(&["G1 F600 X10", "G1 X20", "G1 X30"]);
        let executor = FlakyExecutor::new(MockExecutor::default(), 0);

        let mut controller = Controller::new(
            line_source,
            executor,
            planner_config(),
            None,
            ControllerConfig::default(),
        );
        controller.start().unwrap();

        let mut cancelled = false;
        for _ in 0..50 {
            controller.pump(10, 10, 0.0);
            if controller.state() == ControllerState::Cancelled {
                cancelled = true;
                break;
            }
        }
        assert!(cancelled, "executor failure should cancel the job");
    }
}
