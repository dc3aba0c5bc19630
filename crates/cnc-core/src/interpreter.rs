//! G-code interpreter: parsed record + modal state -> raw `MotionPrimitive`s.
//!
//! Arcs are expanded to linear primitives here; only `Rapid`/`Linear`
//! primitives ever leave the interpreter.

use crate::arc::{compute_arc_center_from_r, segment_arc};
use crate::error::{CncError, Result};
use crate::limits::SoftLimitCheck;
use crate::linear::segment_linear;
use crate::modal::{ModalState, Plane};
use crate::parser::ParsedLine;
use crate::primitives::{MotionPrimitive, MotionType};

/// Converts a parsed line into zero or more machine-space motion primitives,
/// mutating the given `ModalState` as modal codes dictate.
pub struct Interpreter<'a> {
    pub state: &'a mut ModalState,
    pub soft_limits: Option<&'a dyn SoftLimitCheck>,
}

impl<'a> Interpreter<'a> {
    pub fn new(state: &'a mut ModalState, soft_limits: Option<&'a dyn SoftLimitCheck>) -> Self {
        Self { state, soft_limits }
    }

    /// Interpret one parsed record. Order of operations per spec.md §4.3:
    /// apply G-codes, update feedrate, collect motion words, bail out early
    /// on a modal-only line, resolve endpoints, apply WCS, check soft
    /// limits, then dispatch on motion mode.
    pub fn interpret(&mut self, parsed: &ParsedLine) -> Result<Vec<MotionPrimitive>> {
        if parsed.is_empty() {
            return Ok(Vec::new());
        }

        for &g in &parsed.gcodes {
            self.state.apply_gcode(g);
        }

        if let Some(&f) = parsed.words.get(&'F') {
            self.state.update_feedrate(f);
        }

        let has_xyz = parsed.words.contains_key(&'X')
            || parsed.words.contains_key(&'Y')
            || parsed.words.contains_key(&'Z');
        let motion = self.state.motion_mode;
        let is_arc = matches!(motion, MotionType::ArcCw | MotionType::ArcCcw);

        if !has_xyz && !is_arc {
            return Ok(Vec::new());
        }

        let start_prog = self.state.position;
        let end_prog = self.state.resolve_target(parsed);
        self.state.position = end_prog;

        let offset = self.state.active_work_offset();
        let start_machine = add(start_prog, offset);
        let end_machine = add(end_prog, offset);

        if let Some(limits) = self.soft_limits {
            limits.check_point(end_machine)?;
        }

        if is_arc {
            self.interpret_arc(motion, start_prog, end_prog, parsed)
        } else {
            self.interpret_linear(motion, start_machine, end_machine)
        }
    }

    fn interpret_linear(
        &self,
        motion: MotionType,
        start: (f64, f64, f64),
        end: (f64, f64, f64),
    ) -> Result<Vec<MotionPrimitive>> {
        let feed = if motion == MotionType::Rapid {
            self.state.rapid_feedrate_mm_per_min
        } else {
            self.state.feedrate_mm_per_min.ok_or_else(|| {
                CncError::Modal("feedrate not set (missing F word) for linear motion".into())
            })?
        };

        let segs = segment_linear(start, end, feed, self.state.max_segment_time_s);
        Ok(segs
            .into_iter()
            .map(|(s0, s1)| MotionPrimitive::new(motion, s0, s1, Some(feed)))
            .collect())
    }

    fn interpret_arc(
        &self,
        motion: MotionType,
        start_prog: (f64, f64, f64),
        end_prog: (f64, f64, f64),
        parsed: &ParsedLine,
    ) -> Result<Vec<MotionPrimitive>> {
        let clockwise = motion == MotionType::ArcCw;
        let plane = self.state.plane;

        // (a, b) is the in-plane axis pair, c is the helical axis.
        let (ax, ay, az): (usize, usize, usize) = match plane {
            Plane::G17 => (0, 1, 2),
            Plane::G18 => (0, 2, 1),
            Plane::G19 => (1, 2, 0),
        };

        let axis = |p: (f64, f64, f64), idx: usize| -> f64 {
            match idx {
                0 => p.0,
                1 => p.1,
                _ => p.2,
            }
        };

        let s2 = (axis(start_prog, ax), axis(start_prog, ay));
        let e2 = (axis(end_prog, ax), axis(end_prog, ay));

        let scale = self.state.units_scale;
        let center = if let Some(&r) = parsed.words.get(&'R') {
            compute_arc_center_from_r(s2, e2, r * scale, clockwise)?
        } else {
            let i = parsed.words.get(&'I').copied().unwrap_or(0.0) * scale;
            let j = parsed.words.get(&'J').copied().unwrap_or(0.0) * scale;
            let k = parsed.words.get(&'K').copied().unwrap_or(0.0) * scale;
            match plane {
                Plane::G17 => {
                    if parsed.words.get(&'I').is_none() && parsed.words.get(&'J').is_none() {
                        return Err(CncError::Geometry(
                            "arc commanded with neither IJK nor R".into(),
                        ));
                    }
                    (s2.0 + i, s2.1 + j)
                }
                Plane::G18 => {
                    if parsed.words.get(&'I').is_none() && parsed.words.get(&'K').is_none() {
                        return Err(CncError::Geometry(
                            "arc commanded with neither IJK nor R".into(),
                        ));
                    }
                    (s2.0 + i, s2.1 + k)
                }
                Plane::G19 => {
                    if parsed.words.get(&'J').is_none() && parsed.words.get(&'K').is_none() {
                        return Err(CncError::Geometry(
                            "arc commanded with neither IJK nor R".into(),
                        ));
                    }
                    (s2.0 + j, s2.1 + k)
                }
            }
        };

        let points = segment_arc(s2, e2, center, clockwise, self.state.arc_tolerance_mm)?;
        if points.is_empty() {
            return Ok(Vec::new());
        }

        let delta_perp = axis(end_prog, az) - axis(start_prog, az);

        // Total in-plane arc length, for helical pitch distribution by
        // accumulated arc-length fraction (not by segment index).
        let mut total_len = 0.0;
        let mut prev2 = s2;
        for p in &points {
            total_len += (p.0 - prev2.0).hypot(p.1 - prev2.1);
            prev2 = *p;
        }
        if total_len <= 1e-12 {
            return Ok(Vec::new());
        }

        let feed = self.state.feedrate_mm_per_min.ok_or_else(|| {
            CncError::Modal("feedrate not set (missing F word) for arc motion".into())
        })?;

        let mut prims = Vec::with_capacity(points.len());
        let mut prev_prog = start_prog;
        let mut prev_machine = add(prev_prog, self.state.active_work_offset());

        let mut traveled = 0.0;
        let mut prev2 = s2;
        for p in points {
            let seg_len = (p.0 - prev2.0).hypot(p.1 - prev2.1);
            traveled += seg_len;
            let frac = (traveled / total_len).min(1.0);

            let mut next_prog = prev_prog;
            set_axis(&mut next_prog, ax, p.0);
            set_axis(&mut next_prog, ay, p.1);
            set_axis(&mut next_prog, az, axis(start_prog, az) + delta_perp * frac);

            let next_machine = add(next_prog, self.state.active_work_offset());

            prims.push(MotionPrimitive::new(
                MotionType::Linear,
                prev_machine,
                next_machine,
                Some(feed),
            ));

            prev_prog = next_prog;
            prev_machine = next_machine;
            prev2 = p;
        }

        Ok(prims)
    }
}

fn add(p: (f64, f64, f64), o: (f64, f64, f64)) -> (f64, f64, f64) {
    (p.0 + o.0, p.1 + o.1, p.2 + o.2)
}

fn set_axis(p: &mut (f64, f64, f64), idx: usize, value: f64) {
    match idx {
        0 => p.0 = value,
        1 => p.1 = value,
        _ => p.2 = value,
    }
}
