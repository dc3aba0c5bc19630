//! Arc geometry: center resolution (R-form and IJK-form) and chordal
//! segmentation. Operates in the two in-plane axes only; the interpreter is
//! responsible for mapping plane axes and distributing the helical delta.

use crate::error::CncError;

const EPS: f64 = 1e-9;

/// Segment a circular arc into a polyline within `tolerance` of the true
/// circle. Returns the sampled points from (but not including) `start`, up
/// to and including `end`. Handles the full-circle case (`start == end`).
pub fn segment_arc(
    start: (f64, f64),
    end: (f64, f64),
    center: (f64, f64),
    clockwise: bool,
    tolerance: f64,
) -> crate::error::Result<Vec<(f64, f64)>> {
    let (sx, sy) = start;
    let (ex, ey) = end;
    let (cx, cy) = center;

    let rs = (sx - cx).hypot(sy - cy);
    let re = (ex - cx).hypot(ey - cy);

    if rs <= EPS || re <= EPS {
        return Err(CncError::Geometry("arc radius is zero".into()));
    }

    let start_ang = (sy - cy).atan2(sx - cx);
    let end_ang = (ey - cy).atan2(ex - cx);

    let is_full_circle = (sx - ex).abs() < 1e-9 && (sy - ey).abs() < 1e-9;

    let sweep = if is_full_circle {
        if clockwise {
            -2.0 * std::f64::consts::PI
        } else {
            2.0 * std::f64::consts::PI
        }
    } else {
        let mut sweep = end_ang - start_ang;
        if clockwise && sweep > 0.0 {
            sweep -= 2.0 * std::f64::consts::PI;
        } else if !clockwise && sweep < 0.0 {
            sweep += 2.0 * std::f64::consts::PI;
        }
        sweep
    };

    if sweep.abs() < EPS {
        return Ok(Vec::new());
    }

    // Segment count based on chordal tolerance.
    let max_seg_angle = 2.0 * (1.0 - tolerance / rs).max(0.0).acos();
    let segments = (1usize).max((sweep.abs() / max_seg_angle).floor() as usize);

    let mut points = Vec::with_capacity(segments);
    for i in 1..=segments {
        let t = i as f64 / segments as f64;
        let ang = start_ang + sweep * t;
        points.push((cx + rs * ang.cos(), cy + rs * ang.sin()));
    }
    Ok(points)
}

/// Resolve the arc center from an R-form command. Two geometric candidates
/// exist; the one matching the requested direction (by sign of the 2D cross
/// product of (start-center) and (end-center)) is chosen, then the choice is
/// inverted if `r` is negative (the "long way around" request).
pub fn compute_arc_center_from_r(
    start: (f64, f64),
    end: (f64, f64),
    r: f64,
    clockwise: bool,
) -> crate::error::Result<(f64, f64)> {
    let (x0, y0) = start;
    let (x1, y1) = end;

    let dx = x1 - x0;
    let dy = y1 - y0;
    let chord_len = dx.hypot(dy);

    if chord_len < EPS {
        return Err(CncError::Geometry(
            "arc start and end points are identical".into(),
        ));
    }

    let r_abs = r.abs();
    if chord_len > 2.0 * r_abs {
        return Err(CncError::Geometry(
            "arc radius too small for given endpoints".into(),
        ));
    }

    let mx = (x0 + x1) / 2.0;
    let my = (y0 + y1) / 2.0;

    let h = (r_abs * r_abs - (chord_len / 2.0).powi(2)).max(0.0).sqrt();

    let nx = -dy / chord_len;
    let ny = dx / chord_len;

    let c1 = (mx + nx * h, my + ny * h);
    let c2 = (mx - nx * h, my - ny * h);

    let is_clockwise = |c: (f64, f64)| -> bool {
        let cross = (x0 - c.0) * (y1 - c.1) - (y0 - c.1) * (x1 - c.0);
        cross < 0.0
    };

    let mut center = if clockwise {
        if is_clockwise(c1) {
            c1
        } else {
            c2
        }
    } else if !is_clockwise(c1) {
        c1
    } else {
        c2
    };

    // R < 0 means "long way around": take the other candidate center.
    if r < 0.0 {
        center = if center == c1 { c2 } else { c1 };
    }

    Ok(center)
}
