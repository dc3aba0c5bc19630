//! Machine configuration loader.
//!
//! Parses a `cnc.cfg` INI file into a [`cnc_core::PlannerConfig`] plus an
//! [`cnc_core::AxisLimits`], the way `klipper-host::config` loads
//! `printer.cfg` sections into strongly-typed structs.

use anyhow::{Context, Result};
use cnc_core::{AxisLimits, PlannerConfig};
use configparser::ini::Ini;
use std::path::Path;

/// The `[machine]` section: everything the interpreter's modal state needs
/// that isn't a per-line G-code word.
#[derive(Debug, Clone, Copy)]
pub struct MachineConfig {
    pub max_velocity: f64,
    pub max_accel: f64,
    pub rapid_feedrate_mm_per_min: f64,
    pub arc_tolerance_mm: f64,
    pub max_segment_time_s: f64,
}

/// The parsed contents of a `cnc.cfg`: `[machine]`, `[limits]`, `[planner]`.
#[derive(Debug, Clone, Copy)]
pub struct MachineProfile {
    pub machine: MachineConfig,
    pub limits: AxisLimits,
    pub planner: PlannerConfig,
}

impl MachineProfile {
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|e| anyhow::anyhow!(e))
            .with_context(|| format!("failed to load machine config: {:?}", path))?;

        let max_velocity = config
            .getfloat("machine", "max_velocity")
            .ok()
            .flatten()
            .context("[machine] max_velocity not found")?;
        let max_accel = config
            .getfloat("machine", "max_accel")
            .ok()
            .flatten()
            .context("[machine] max_accel not found")?;
        let rapid_feedrate_mm_per_min = config
            .getfloat("machine", "rapid_feedrate")
            .ok()
            .flatten()
            .unwrap_or(3000.0);
        let arc_tolerance_mm = config
            .getfloat("machine", "arc_tolerance_mm")
            .ok()
            .flatten()
            .unwrap_or(0.025);
        let max_segment_time_s = config
            .getfloat("machine", "max_segment_time_s")
            .ok()
            .flatten()
            .unwrap_or(0.01);

        let axis_accels = match (
            config.getfloat("machine", "accel_x").ok().flatten(),
            config.getfloat("machine", "accel_y").ok().flatten(),
            config.getfloat("machine", "accel_z").ok().flatten(),
        ) {
            (Some(ax), Some(ay), Some(az)) => Some((ax, ay, az)),
            _ => None,
        };

        let limits = AxisLimits {
            x: axis_range(&config, "limits", "x_min", "x_max"),
            y: axis_range(&config, "limits", "y_min", "y_max"),
            z: axis_range(&config, "limits", "z_min", "z_max"),
        };

        let planner = PlannerConfig {
            max_velocity,
            max_accel,
            axis_accels,
            junction_deviation: config
                .getfloat("machine", "junction_deviation")
                .ok()
                .flatten()
                .unwrap_or(0.05),
            buffer_time: config
                .getfloat("planner", "buffer_time")
                .ok()
                .flatten()
                .unwrap_or(0.25),
            keep_tail_moves: config
                .getuint("planner", "keep_tail_moves")
                .ok()
                .flatten()
                .unwrap_or(2) as usize,
            max_window_moves: config
                .getuint("planner", "max_window_moves")
                .ok()
                .flatten()
                .unwrap_or(200) as usize,
        };

        Ok(Self {
            machine: MachineConfig {
                max_velocity,
                max_accel,
                rapid_feedrate_mm_per_min,
                arc_tolerance_mm,
                max_segment_time_s,
            },
            limits,
            planner,
        })
    }
}

fn axis_range(config: &Ini, section: &str, min_key: &str, max_key: &str) -> Option<(f64, f64)> {
    let min = config.getfloat(section, min_key).ok().flatten()?;
    let max = config.getfloat(section, max_key).ok().flatten()?;
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_cfg(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{contents}").unwrap();
        f
    }

    #[test]
    fn loads_machine_and_limits_and_planner_sections() {
        let f = write_cfg(
            "[machine]\n\
             max_velocity = 150\n\
             max_accel = 2000\n\
             junction_deviation = 0.03\n\
             [limits]\n\
             x_min = 0\n\
             x_max = 300\n\
             [planner]\n\
             buffer_time = 0.5\n\
             keep_tail_moves = 3\n\
             max_window_moves = 100\n",
        );
        let profile = MachineProfile::load(f.path()).unwrap();
        assert_eq!(profile.machine.max_velocity, 150.0);
        assert_eq!(profile.planner.max_accel, 2000.0);
        assert_eq!(profile.planner.keep_tail_moves, 3);
        assert_eq!(profile.limits.x, Some((0.0, 300.0)));
        assert_eq!(profile.limits.y, None);
    }

    #[test]
    fn missing_required_key_is_an_error() {
        let f = write_cfg("[machine]\nmax_accel = 1000\n");
        assert!(MachineProfile::load(f.path()).is_err());
    }

    #[test]
    fn defaults_apply_when_optional_keys_absent() {
        let f = write_cfg("[machine]\nmax_velocity = 100\nmax_accel = 1000\n");
        let profile = MachineProfile::load(f.path()).unwrap();
        assert_eq!(profile.machine.rapid_feedrate_mm_per_min, 3000.0);
        assert_eq!(profile.planner.buffer_time, 0.25);
        assert_eq!(profile.planner.keep_tail_moves, 2);
    }
}
