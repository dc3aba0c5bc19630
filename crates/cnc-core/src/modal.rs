//! Modal state: the durable machine context that persists across lines
//! until a modal command changes it. Mutated only by the interpreter.

use crate::parser::ParsedLine;
use crate::primitives::MotionType;

/// The plane in which arc commands (G2/G3) are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    G17,
    G18,
    G19,
}

/// Modal state for a CNC job: units, plane, distance mode, feedrate, motion
/// mode, work-coordinate selection and offsets, program-space position, and
/// the segmentation/arc knobs. Initialized to defaults; `reset()` returns it
/// to those defaults at job start.
#[derive(Debug, Clone)]
pub struct ModalState {
    pub units_scale: f64,
    pub absolute: bool,
    pub plane: Plane,
    pub motion_mode: MotionType,
    pub feedrate_mm_per_min: Option<f64>,
    pub rapid_feedrate_mm_per_min: f64,
    pub active_wcs: usize,
    pub work_offsets: [(f64, f64, f64); 6],
    /// Program-space position (mm), WCS offset NOT applied.
    pub position: (f64, f64, f64),
    pub arc_tolerance_mm: f64,
    pub max_segment_time_s: f64,
}

impl Default for ModalState {
    fn default() -> Self {
        Self {
            units_scale: 1.0,
            absolute: true,
            plane: Plane::G17,
            motion_mode: MotionType::Rapid,
            feedrate_mm_per_min: None,
            rapid_feedrate_mm_per_min: 3000.0,
            active_wcs: 0,
            work_offsets: [(0.0, 0.0, 0.0); 6],
            position: (0.0, 0.0, 0.0),
            arc_tolerance_mm: 0.025,
            max_segment_time_s: 0.01,
        }
    }
}

impl ModalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the per-job state (units, plane, distance mode, feedrate,
    /// motion mode, position) for a new job. Machine-level knobs configured
    /// by the host — rapid feedrate, arc tolerance, segmentation bound, and
    /// WCS offsets — survive the reset; they describe the machine, not the
    /// job running on it.
    pub fn reset(&mut self) {
        let rapid_feedrate_mm_per_min = self.rapid_feedrate_mm_per_min;
        let arc_tolerance_mm = self.arc_tolerance_mm;
        let max_segment_time_s = self.max_segment_time_s;
        let work_offsets = self.work_offsets;

        *self = Self::default();

        self.rapid_feedrate_mm_per_min = rapid_feedrate_mm_per_min;
        self.arc_tolerance_mm = arc_tolerance_mm;
        self.max_segment_time_s = max_segment_time_s;
        self.work_offsets = work_offsets;
    }

    /// Configure the machine-level knobs a host loads from its machine
    /// profile (rapid feedrate, arc chordal tolerance, max segment time).
    /// Call once before `start()`; `reset()` preserves these across jobs.
    pub fn set_machine_defaults(
        &mut self,
        rapid_feedrate_mm_per_min: f64,
        arc_tolerance_mm: f64,
        max_segment_time_s: f64,
    ) {
        self.rapid_feedrate_mm_per_min = rapid_feedrate_mm_per_min;
        self.arc_tolerance_mm = arc_tolerance_mm;
        self.max_segment_time_s = max_segment_time_s;
    }

    pub fn set_units_mm(&mut self) {
        self.units_scale = 1.0;
    }

    pub fn set_units_inch(&mut self) {
        self.units_scale = 25.4;
    }

    pub fn set_absolute(&mut self, absolute: bool) {
        self.absolute = absolute;
    }

    pub fn set_plane(&mut self, plane: Plane) {
        self.plane = plane;
    }

    pub fn set_motion_mode(&mut self, mode: MotionType) {
        self.motion_mode = mode;
    }

    pub fn select_wcs(&mut self, index: usize) {
        debug_assert!(index < 6);
        self.active_wcs = index;
    }

    /// Set the offset for a work-coordinate system (G54..G59 -> 0..5). Not
    /// driven by any G-code in the accepted dialect (spec.md §6); this is
    /// the out-of-band mechanism a host uses to configure WCS offsets.
    pub fn set_work_offset(&mut self, wcs_index: usize, offset: (f64, f64, f64)) {
        self.work_offsets[wcs_index] = offset;
    }

    pub fn active_work_offset(&self) -> (f64, f64, f64) {
        self.work_offsets[self.active_wcs]
    }

    /// F<v> -> feedrate_mm_per_min, scaled by the active unit system.
    pub fn update_feedrate(&mut self, raw: f64) {
        self.feedrate_mm_per_min = Some(raw * self.units_scale);
    }

    /// Resolve a new program-space position from axis words present in
    /// `words`. Axes not present are left unchanged. Returns millimeters.
    /// Does NOT apply WCS offsets.
    pub fn resolve_target(&self, words: &ParsedLine) -> (f64, f64, f64) {
        let mut pos = self.position;
        if let Some(&x) = words.words.get(&'X') {
            let v = x * self.units_scale;
            pos.0 = if self.absolute { v } else { pos.0 + v };
        }
        if let Some(&y) = words.words.get(&'Y') {
            let v = y * self.units_scale;
            pos.1 = if self.absolute { v } else { pos.1 + v };
        }
        if let Some(&z) = words.words.get(&'Z') {
            let v = z * self.units_scale;
            pos.2 = if self.absolute { v } else { pos.2 + v };
        }
        pos
    }

    /// Apply a G-code number's modal effect (units, plane, distance mode,
    /// motion mode, WCS selection). G-codes with no modal effect in this
    /// dialect (e.g. unsupported codes) are ignored.
    pub fn apply_gcode(&mut self, code: u32) {
        match code {
            0 => self.set_motion_mode(MotionType::Rapid),
            1 => self.set_motion_mode(MotionType::Linear),
            2 => self.set_motion_mode(MotionType::ArcCw),
            3 => self.set_motion_mode(MotionType::ArcCcw),
            17 => self.set_plane(Plane::G17),
            18 => self.set_plane(Plane::G18),
            19 => self.set_plane(Plane::G19),
            20 => self.set_units_inch(),
            21 => self.set_units_mm(),
            54..=59 => self.select_wcs((code - 54) as usize),
            90 => self.set_absolute(true),
            91 => self.set_absolute(false),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;

    #[test]
    fn absolute_move_overwrites_axis() {
        let mut s = ModalState::new();
        s.position = (5.0, 5.0, 5.0);
        let words = parse_line("G1 X10");
        let pos = s.resolve_target(&words);
        assert_eq!(pos, (10.0, 5.0, 5.0));
    }

    #[test]
    fn incremental_move_adds_to_axis() {
        let mut s = ModalState::new();
        s.position = (5.0, 5.0, 5.0);
        s.absolute = false;
        let words = parse_line("G1 X10");
        let pos = s.resolve_target(&words);
        assert_eq!(pos, (15.0, 5.0, 5.0));
    }

    #[test]
    fn g90_g91_equivalence_same_net_displacement() {
        let mut abs_state = ModalState::new();
        abs_state.position = (0.0, 0.0, 0.0);
        let words_abs = parse_line("G1 X10 Y20");
        let abs_result = abs_state.resolve_target(&words_abs);

        let mut inc_state = ModalState::new();
        inc_state.absolute = false;
        inc_state.position = (0.0, 0.0, 0.0);
        let words_inc = parse_line("G1 X10 Y20");
        let inc_result = inc_state.resolve_target(&words_inc);

        assert_eq!(abs_result, inc_result);
    }

    #[test]
    fn unit_switch_scales_feedrate_and_position() {
        let mut s = ModalState::new();
        s.set_units_inch();
        s.update_feedrate(10.0);
        assert!((s.feedrate_mm_per_min.unwrap() - 254.0).abs() < 1e-9);

        let words = parse_line("G1 X1");
        s.position = s.resolve_target(&words);
        assert!((s.position.0 - 25.4).abs() < 1e-9);

        s.set_units_mm();
        let words2 = parse_line("G1 X10");
        s.position = s.resolve_target(&words2);
        assert_eq!(s.position.0, 10.0);
    }

    #[test]
    fn wcs_selection_from_gcode() {
        let mut s = ModalState::new();
        s.apply_gcode(56);
        assert_eq!(s.active_wcs, 2);
    }

    #[test]
    fn reset_preserves_machine_defaults_but_clears_job_state() {
        let mut s = ModalState::new();
        s.set_machine_defaults(1500.0, 0.01, 0.02);
        s.set_work_offset(0, (10.0, 20.0, 30.0));
        s.update_feedrate(600.0);
        s.position = (5.0, 5.0, 5.0);
        s.set_absolute(false);

        s.reset();

        assert_eq!(s.rapid_feedrate_mm_per_min, 1500.0);
        assert_eq!(s.arc_tolerance_mm, 0.01);
        assert_eq!(s.max_segment_time_s, 0.02);
        assert_eq!(s.active_work_offset(), (10.0, 20.0, 30.0));
        assert_eq!(s.feedrate_mm_per_min, None);
        assert_eq!(s.position, (0.0, 0.0, 0.0));
        assert!(s.absolute);
    }
}
