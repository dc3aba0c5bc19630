//! Batch G-code runner.
//!
//! Streams a G-code file through the pipeline end to end against a mock
//! executor, cooperative-ticking the controller until the job completes.
//! Stands in for the host process spec.md places out of scope for the core.

use crate::config::MachineProfile;
use crate::executor::MockExecutor;
use crate::streamer::FileLineSource;
use anyhow::{Context, Result};
use clap::Parser;
use cnc_core::{Controller, ControllerConfig, ControllerState};
use std::path::PathBuf;
use tracing::info;

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the G-code file to run.
    #[arg(required = true)]
    gcode_file: PathBuf,

    /// Path to the machine configuration file.
    #[arg(short, long, default_value = "cnc.cfg")]
    config_path: PathBuf,

    /// Lines read per pump tick.
    #[arg(long, default_value_t = 8)]
    max_lines: usize,

    /// Primitives executed per pump tick.
    #[arg(long, default_value_t = 8)]
    max_steps: usize,

    /// Simulated seconds advanced per pump tick, for the mock executor's
    /// back-pressure and draining queries.
    #[arg(long, default_value_t = 0.01)]
    tick_seconds: f64,
}

/// Runs a G-code file to completion against a mock executor.
pub fn run(args: RunArgs) -> Result<()> {
    let profile = MachineProfile::load(&args.config_path)
        .with_context(|| format!("loading machine config {:?}", args.config_path))?;

    info!(file = ?args.gcode_file, "starting job");

    let line_source = FileLineSource::new(args.gcode_file.clone());
    let executor = MockExecutor::default();

    let mut controller = Controller::new(
        line_source,
        executor,
        profile.planner,
        Some(Box::new(profile.limits)),
        ControllerConfig::default(),
    );
    controller.set_machine_defaults(
        profile.machine.rapid_feedrate_mm_per_min,
        profile.machine.arc_tolerance_mm,
        profile.machine.max_segment_time_s,
    );

    controller.start().context("starting controller")?;

    let mut now = 0.0;
    loop {
        let report = controller.pump(args.max_lines, args.max_steps, now);
        now += args.tick_seconds;

        if controller.state() == ControllerState::Cancelled {
            anyhow::bail!("job cancelled due to a fatal error during execution");
        }
        if report.done {
            break;
        }
    }

    controller.flush().context("flushing executor")?;
    info!("job complete");
    Ok(())
}
