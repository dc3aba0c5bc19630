//! # Streaming Lookahead Planner
//!
//! Consumes raw `MotionPrimitive`s one at a time, maintains a sliding
//! window, caps junction speeds with a Klipper-style junction-deviation
//! model, runs backward/forward reachability passes in v² space, computes
//! per-move trapezoidal timing, and commits a prefix once enough buffered
//! time has accumulated — all while preserving velocity continuity across
//! commits via a single carried-over `carry_in_v2` scalar.
//!
//! ## Operation
//!
//! 1. **`push`**: a raw primitive is precomputed into a `WindowEntry` and
//!    appended to the window. If the buffered window time now exceeds
//!    `buffer_time` (or the window has hit `max_window_moves`), the window
//!    is replanned and a safe prefix is committed, leaving `keep_tail_moves`
//!    behind so a future junction can still revise their exit speed.
//! 2. **`finish`**: end of stream — plan the entire remaining window forcing
//!    a final stop, emit everything, and clear state.

use crate::primitives::{MotionPrimitive, MotionType};

const EPS: f64 = 1e-12;

/// Fixed configuration for the planner, all in consistent units (mm, mm/s,
/// mm/s², mm, s).
#[derive(Debug, Clone, Copy)]
pub struct PlannerConfig {
    pub max_velocity: f64,
    pub max_accel: f64,
    /// Optional per-axis acceleration caps (x, y, z). When set, a move's
    /// effective acceleration is the tightest axis cap along its direction,
    /// not the scalar `max_accel`.
    pub axis_accels: Option<(f64, f64, f64)>,
    pub junction_deviation: f64,
    pub buffer_time: f64,
    pub keep_tail_moves: usize,
    pub max_window_moves: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_velocity: 200.0,
            max_accel: 1000.0,
            axis_accels: None,
            junction_deviation: 0.05,
            buffer_time: 0.250,
            keep_tail_moves: 2,
            max_window_moves: 200,
        }
    }
}

/// A `MotionPrimitive` wrapped with planner output: entry/exit/peak speeds
/// (mm/s) and trapezoidal timing (s).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedPrimitive {
    pub primitive: MotionPrimitive,
    pub v_entry: f64,
    pub v_exit: f64,
    pub v_peak: f64,
    pub accel: f64,
    pub t_accel: f64,
    pub t_cruise: f64,
    pub t_decel: f64,
}

impl PlannedPrimitive {
    pub fn duration(&self) -> f64 {
        self.t_accel + self.t_cruise + self.t_decel
    }
}

/// Per-move precomputation kept in the planner's window. Mirrors what the
/// window planner needs without re-deriving it on every replan.
#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    p: MotionPrimitive,
    length: f64,
    unit: (f64, f64, f64),
    vmax: f64,
    accel: f64,
    min_time: f64,
    /// `2 * length * accel`, the maximum v² change this move can produce —
    /// used by the junction-deviation "short segment" cap.
    delta_v2: f64,
}

fn clamp(x: f64, lo: f64, hi: f64) -> f64 {
    x.max(lo).min(hi)
}

fn unit_vec(p: &MotionPrimitive, length: f64) -> (f64, f64, f64) {
    if length < EPS {
        return (0.0, 0.0, 0.0);
    }
    let dx = p.end.0 - p.start.0;
    let dy = p.end.1 - p.start.1;
    let dz = p.end.2 - p.start.2;
    (dx / length, dy / length, dz / length)
}

fn effective_path_accel(
    u: (f64, f64, f64),
    default_accel: f64,
    axis_accels: Option<(f64, f64, f64)>,
) -> f64 {
    let (ax, ay, az) = match axis_accels {
        Some(a) => a,
        None => return default_accel,
    };

    let mut best = f64::INFINITY;
    let mut any = false;
    for (a, u_i) in [(ax, u.0), (ay, u.1), (az, u.2)] {
        if u_i.abs() > EPS {
            any = true;
            best = best.min(a / u_i.abs());
        }
    }
    if any {
        best
    } else {
        default_accel
    }
}

/// Klipper-style junction speed cap between two consecutive segments,
/// returned as v² (mm²/s²). `accel` is `min(prev.accel, cur.accel)`.
fn junction_v2(prev: &WindowEntry, cur: &WindowEntry, jd: f64, accel: f64) -> f64 {
    let dot = clamp(
        prev.unit.0 * cur.unit.0 + prev.unit.1 * cur.unit.1 + prev.unit.2 * cur.unit.2,
        -1.0,
        1.0,
    );
    let cos_theta = -dot;

    let sin_half = (0.5 * (1.0 - cos_theta)).max(0.0).sqrt();
    let cos_half = (0.5 * (1.0 + cos_theta)).max(0.0).sqrt();

    let one_minus_sin = 1.0 - sin_half;
    if one_minus_sin <= EPS || cos_half <= EPS {
        // Moves are colinear (sin_half ~ 0) or reverse directly into
        // themselves (cos_half ~ 0); neither limits the junction here.
        return f64::INFINITY;
    }

    let r = sin_half / one_minus_sin;
    let v2_jd = accel * jd * r;

    let quarter_tan = 0.25 * sin_half / cos_half;
    let v2_short_cur = cur.delta_v2 * quarter_tan;
    let v2_short_prev = prev.delta_v2 * quarter_tan;

    v2_jd.min(v2_short_cur).min(v2_short_prev)
}

/// Plan a list of window entries given the known carry-in v² entering
/// `moves[0]` and whether the final boundary must be a full stop.
fn plan_window(
    moves: &[WindowEntry],
    junction_deviation: f64,
    start_v2: f64,
    stop_at_end: bool,
) -> Vec<PlannedPrimitive> {
    let n = moves.len();
    if n == 0 {
        return Vec::new();
    }

    let mut cap2 = vec![f64::INFINITY; n + 1];
    cap2[0] = start_v2.max(0.0);
    cap2[n] = if stop_at_end { 0.0 } else { f64::INFINITY };

    for (i, m) in moves.iter().enumerate() {
        let vmax2 = m.vmax * m.vmax;
        cap2[i] = cap2[i].min(vmax2);
        cap2[i + 1] = cap2[i + 1].min(vmax2);
    }

    for i in 1..n {
        let prev = &moves[i - 1];
        let cur = &moves[i];
        let a_junc = prev.accel.min(cur.accel);
        let mut v2 = junction_v2(prev, cur, junction_deviation, a_junc);
        v2 = v2.min(prev.vmax * prev.vmax).min(cur.vmax * cur.vmax);
        cap2[i] = cap2[i].min(v2);
    }

    // Backward reachability: moving from the end toward the start, a move
    // can only enter as fast as it can still decelerate to its exit cap.
    for i in (1..n).rev() {
        let a = moves[i].accel;
        let l = moves[i].length;
        let reachable2 = cap2[i + 1] + 2.0 * a * l;
        cap2[i] = cap2[i].min(reachable2);
    }

    // Forward reachability: moving from the start toward the end, a move
    // can only exit as fast as it can accelerate to from its entry.
    for i in 0..n {
        let a = moves[i].accel;
        let l = moves[i].length;
        let reachable2 = cap2[i] + 2.0 * a * l;
        cap2[i + 1] = cap2[i + 1].min(reachable2);
    }

    let mut planned = Vec::with_capacity(n);
    for (i, m) in moves.iter().enumerate() {
        let a = m.accel;
        let l = m.length;
        let v_in2 = cap2[i].max(0.0);
        let v_out2 = cap2[i + 1].max(0.0);
        let vmax2 = m.vmax * m.vmax;

        let v_peak2 = vmax2.min(a * l + 0.5 * (v_in2 + v_out2));
        let v_in = v_in2.sqrt();
        let v_out = v_out2.sqrt();
        let v_peak = v_peak2.max(0.0).sqrt();

        if a <= EPS {
            let t_cruise = if v_peak > EPS { l / v_peak } else { 0.0 };
            planned.push(PlannedPrimitive {
                primitive: m.p,
                v_entry: v_in,
                v_exit: v_out,
                v_peak,
                accel: a,
                t_accel: 0.0,
                t_cruise,
                t_decel: 0.0,
            });
            continue;
        }

        let d_accel = (v_peak2 - v_in2) / (2.0 * a);
        let d_decel = (v_peak2 - v_out2) / (2.0 * a);
        let d_cruise = (l - d_accel - d_decel).max(0.0);

        let t_accel = (v_peak - v_in) / a;
        let t_decel = (v_peak - v_out) / a;
        let t_cruise = if v_peak > EPS { d_cruise / v_peak } else { 0.0 };

        planned.push(PlannedPrimitive {
            primitive: m.p,
            v_entry: v_in,
            v_exit: v_out,
            v_peak,
            accel: a,
            t_accel,
            t_cruise,
            t_decel,
        });
    }

    planned
}

/// Streaming CNC planner. Owns its window exclusively; planned output
/// carries copies of the primitives it describes, never references into the
/// window, so the window can be freely mutated after a commit.
pub struct CncPlanner {
    config: PlannerConfig,
    window: std::collections::VecDeque<WindowEntry>,
    window_time: f64,
    carry_in_v2: f64,
}

impl CncPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            config,
            window: std::collections::VecDeque::new(),
            window_time: 0.0,
            carry_in_v2: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.window_time = 0.0;
        self.carry_in_v2 = 0.0;
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Add a raw primitive. Returns zero or more `PlannedPrimitive`s that
    /// have just been committed and are safe to execute. Zero-length
    /// primitives are silently dropped.
    pub fn push(&mut self, prim: MotionPrimitive) -> Vec<PlannedPrimitive> {
        let entry = match self.make_entry(prim) {
            Some(e) => e,
            None => return Vec::new(),
        };

        self.window.push_back(entry);
        self.window_time += entry.min_time;

        let force = self.window.len() >= self.config.max_window_moves;
        self.flush_if_ready(force)
    }

    /// End of stream: plan the entire remaining window forcing a final
    /// stop, emit everything, and clear all planner state.
    pub fn finish(&mut self) -> Vec<PlannedPrimitive> {
        if self.window.is_empty() {
            return Vec::new();
        }
        let moves: Vec<WindowEntry> = self.window.iter().copied().collect();
        let planned = plan_window(&moves, self.config.junction_deviation, self.carry_in_v2, true);
        self.reset();
        planned
    }

    fn make_entry(&self, prim: MotionPrimitive) -> Option<WindowEntry> {
        let length = prim.length();
        if length < EPS {
            return None;
        }

        let vmax = match prim.motion {
            MotionType::Rapid => self.config.max_velocity,
            _ => match prim.feedrate {
                Some(f) if f > 0.0 => (f / 60.0).min(self.config.max_velocity),
                _ => self.config.max_velocity,
            },
        };

        let u = unit_vec(&prim, length);
        let accel = effective_path_accel(u, self.config.max_accel, self.config.axis_accels);

        let min_time = if vmax > EPS { length / vmax } else { 0.0 };
        let delta_v2 = 2.0 * length * accel;

        Some(WindowEntry {
            p: prim,
            length,
            unit: u,
            vmax,
            accel,
            min_time,
            delta_v2,
        })
    }

    /// Replan the window and commit a safe prefix, keeping `keep_tail_moves`
    /// behind so later junctions can still revise the tail's exit speed.
    /// `force` (window full, or end of stream) overrides the buffer-time
    /// gate so the window always drains.
    fn flush_if_ready(&mut self, force: bool) -> Vec<PlannedPrimitive> {
        if self.window.len() <= self.config.keep_tail_moves {
            return Vec::new();
        }
        if !force && self.window_time < self.config.buffer_time {
            return Vec::new();
        }

        // Plan the whole window pessimistically, as if it had to stop dead
        // at its own tail. `keep_tail_moves` is what keeps that forced-stop
        // boundary out of the committed prefix: only the retained tail ever
        // sees cap2[n] == 0, so a committed move's exit speed never assumes
        // more than the window can actually prove it can still decelerate
        // from, regardless of what arrives next.
        let moves: Vec<WindowEntry> = self.window.iter().copied().collect();
        let planned_all = plan_window(&moves, self.config.junction_deviation, self.carry_in_v2, true);

        let max_flush = self.window.len() - self.config.keep_tail_moves;
        let mut remaining_time = self.window_time;
        let mut flush_count = 0usize;

        while flush_count < max_flush {
            let mi = &self.window[flush_count];
            let next_remaining = remaining_time - mi.min_time;
            if !force && next_remaining < self.config.buffer_time {
                break;
            }
            flush_count += 1;
            remaining_time = next_remaining;
        }

        if flush_count == 0 {
            return Vec::new();
        }

        let committed: Vec<PlannedPrimitive> = planned_all[..flush_count].to_vec();

        self.carry_in_v2 = if flush_count < planned_all.len() {
            let new_head = planned_all[flush_count];
            new_head.v_entry * new_head.v_entry
        } else {
            0.0
        };

        for _ in 0..flush_count {
            let popped = self.window.pop_front().expect("flush_count <= window.len()");
            self.window_time -= popped.min_time;
        }
        if self.window_time < 0.0 {
            self.window_time = 0.0;
        }

        committed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(x0: f64, y0: f64, x1: f64, y1: f64, feed: f64) -> MotionPrimitive {
        MotionPrimitive::new(MotionType::Linear, (x0, y0, 0.0), (x1, y1, 0.0), Some(feed))
    }

    fn cfg() -> PlannerConfig {
        PlannerConfig {
            max_velocity: 200.0,
            max_accel: 1000.0,
            axis_accels: None,
            junction_deviation: 0.05,
            buffer_time: 0.0, // commit eagerly for deterministic unit tests
            keep_tail_moves: 1,
            max_window_moves: 200,
        }
    }

    #[test]
    fn right_angle_corner_caps_junction_speed() {
        // 3000mm/min = 50mm/s on both legs of a 90 degree corner.
        let mut planner = CncPlanner::new(cfg());
        let mut out = planner.push(linear(0.0, 0.0, 100.0, 0.0, 3000.0));
        out.extend(planner.push(linear(100.0, 0.0, 100.0, 100.0, 3000.0)));
        out.extend(planner.finish());

        assert_eq!(out.len(), 2);
        assert!((out[0].v_exit - out[1].v_entry).abs() < 0.25);
        // JD-only analytic estimate for a 90 degree corner, accel=1000,
        // jd=0.05: sqrt(accel * jd * sin(45deg)/(1-sin(45deg))) ~= 11mm/s,
        // well under the 50mm/s programmed feed.
        assert!(out[0].v_exit < 15.0);
    }

    #[test]
    fn near_straight_junction_keeps_speed_high() {
        let mut planner = CncPlanner::new(cfg());
        let angle = 2f64.to_radians();
        let x1 = 100.0 + 100.0 * angle.cos();
        let y1 = 100.0 * angle.sin();
        let mut out = planner.push(linear(0.0, 0.0, 100.0, 0.0, 3000.0));
        out.extend(planner.push(linear(100.0, 0.0, x1, y1, 3000.0)));
        out.extend(planner.finish());

        assert!(out[0].v_exit > 0.95 * 50.0);
    }

    #[test]
    fn full_reversal_forces_near_zero_junction_speed() {
        let mut planner = CncPlanner::new(cfg());
        let mut out = planner.push(linear(0.0, 0.0, 100.0, 0.0, 3000.0));
        out.extend(planner.push(linear(100.0, 0.0, 0.0, 0.0, 3000.0)));
        out.extend(planner.finish());

        assert!(out[0].v_exit < 1e-3);
    }

    #[test]
    fn stop_at_end_forces_final_exit_to_zero() {
        let mut planner = CncPlanner::new(cfg());
        planner.push(linear(0.0, 0.0, 100.0, 0.0, 3000.0));
        let out = planner.finish();
        assert_eq!(out.last().unwrap().v_exit, 0.0);
    }

    #[test]
    fn continuity_across_commits() {
        let mut c = cfg();
        c.buffer_time = 0.001;
        c.keep_tail_moves = 1;
        let mut planner = CncPlanner::new(c);

        let mut all = Vec::new();
        for i in 0..6 {
            let x0 = i as f64 * 10.0;
            let x1 = x0 + 10.0;
            all.extend(planner.push(linear(x0, 0.0, x1, 0.0, 3000.0)));
        }
        all.extend(planner.finish());

        for w in all.windows(2) {
            assert!((w[0].v_exit - w[1].v_entry).abs() < 1e-6);
        }
    }

    #[test]
    fn reachability_bounds_hold_for_every_move() {
        let mut planner = CncPlanner::new(cfg());
        let mut out = planner.push(linear(0.0, 0.0, 5.0, 0.0, 3000.0));
        out.extend(planner.push(linear(5.0, 0.0, 100.0, 0.0, 3000.0)));
        out.extend(planner.finish());

        for p in &out {
            let l = p.primitive.length();
            let diff = (p.v_exit * p.v_exit - p.v_entry * p.v_entry).abs();
            assert!(diff <= 2.0 * p.accel * l + 1e-6);
        }
    }

    #[test]
    fn peak_never_exceeds_segment_vmax() {
        let mut planner = CncPlanner::new(cfg());
        let mut out = planner.push(linear(0.0, 0.0, 100.0, 0.0, 3000.0));
        out.extend(planner.finish());
        for p in &out {
            assert!(p.v_peak <= 200.0 + 1e-9);
            assert!(p.v_peak <= 3000.0 / 60.0 + 1e-9);
        }
    }

    #[test]
    fn zero_length_moves_are_dropped() {
        let mut planner = CncPlanner::new(cfg());
        let out = planner.push(linear(5.0, 5.0, 5.0, 5.0, 3000.0));
        assert!(out.is_empty());
        assert!(planner.is_empty());
    }

    #[test]
    fn rapid_without_feedrate_uses_max_velocity() {
        let mut planner = CncPlanner::new(cfg());
        let prim = MotionPrimitive::new(MotionType::Rapid, (0.0, 0.0, 0.0), (50.0, 0.0, 0.0), None);
        let mut out = planner.push(prim);
        out.extend(planner.finish());
        assert!(out[0].v_peak <= 200.0 + 1e-9);
    }
}
