//! Time-bounded linear segmentation for rapid/linear moves.

/// Split a straight move into contiguous segments such that no segment
/// exceeds `max_segment_time` at the given feedrate (mm/min). Returns pairs
/// of (segment_start, segment_end) in the same coordinate space as `start`
/// and `end`.
pub fn segment_linear(
    start: (f64, f64, f64),
    end: (f64, f64, f64),
    feedrate_mm_per_min: f64,
    max_segment_time_s: f64,
) -> Vec<((f64, f64, f64), (f64, f64, f64))> {
    if start == end {
        return Vec::new();
    }

    let dx = end.0 - start.0;
    let dy = end.1 - start.1;
    let dz = end.2 - start.2;
    let length = (dx * dx + dy * dy + dz * dz).sqrt();

    let feed_mm_per_s = if feedrate_mm_per_min > 0.0 {
        feedrate_mm_per_min / 60.0
    } else {
        0.0
    };

    if feed_mm_per_s <= 0.0 || length <= 0.0 {
        return vec![(start, end)];
    }

    let move_time = length / feed_mm_per_s;
    let segments = (1usize).max((move_time / max_segment_time_s).ceil() as usize);

    let mut segs = Vec::with_capacity(segments);
    let mut prev = start;
    for i in 1..=segments {
        let t = i as f64 / segments as f64;
        let next = (
            start.0 + dx * t,
            start.1 + dy * t,
            start.2 + dz * t,
        );
        segs.push((prev, next));
        prev = next;
    }
    segs
}
