//! Shared helpers for slicing a match's tracking sequence around an event.

use crate::data::models::{PhaseOfPlay, TrackingFrame};

/// Tolerance when matching an event to a tracking frame by timestamp.
pub const FRAME_MATCH_TOLERANCE_SECS: f64 = 0.5;

pub use crate::data::models::{is_sorted_frames, sort_frames};

/// Index of the frame carrying the event's frame id. Without an id match, the
/// first frame of `period` (any period when `None`) whose timestamp lies within
/// [`FRAME_MATCH_TOLERANCE_SECS`] of the event timestamp.
pub fn locate_event_frame(
    frames: &[TrackingFrame],
    frame_id: Option<i64>,
    period: Option<i64>,
    timestamp: f64,
) -> Option<usize> {
    if let Some(id) = frame_id {
        if let Some(i) = frames.iter().position(|f| f.frame_id == id) {
            return Some(i);
        }
    }
    frames.iter().position(|f| {
        period.map_or(true, |p| p == i64::from(f.period))
            && (f.timestamp - timestamp).abs() < FRAME_MATCH_TOLERANCE_SECS
    })
}

/// Frames on either side of an event: pre = [ts − W, ts), post = [ts, ts + W].
#[derive(Debug, Default)]
pub struct SplitWindow<'a> {
    pub pre: Vec<&'a TrackingFrame>,
    pub post: Vec<&'a TrackingFrame>,
}

/// Split frames around `timestamp`, keeping only `period` when given.
pub fn split_window(
    frames: &[TrackingFrame],
    period: Option<u8>,
    timestamp: f64,
    window_secs: f64,
) -> SplitWindow<'_> {
    let mut split = SplitWindow::default();
    for frame in frames {
        if period.is_some_and(|p| p != frame.period) {
            continue;
        }
        let t = frame.timestamp;
        if timestamp - window_secs <= t && t < timestamp {
            split.pre.push(frame);
        } else if timestamp <= t && t <= timestamp + window_secs {
            split.post.push(frame);
        }
    }
    split
}

/// Phases whose start falls in pre = [ts − W, ts) and post = [ts, ts + W].
pub fn split_phases<'a, F>(
    phases: &'a [PhaseOfPlay],
    timestamp: f64,
    window_secs: f64,
    keep: F,
) -> (Vec<&'a PhaseOfPlay>, Vec<&'a PhaseOfPlay>)
where
    F: Fn(&PhaseOfPlay) -> bool,
{
    let mut pre = Vec::new();
    let mut post = Vec::new();
    for phase in phases.iter().filter(|p| keep(*p)) {
        let t = phase.time_start;
        if timestamp - window_secs <= t && t < timestamp {
            pre.push(phase);
        } else if timestamp <= t && t <= timestamp + window_secs {
            post.push(phase);
        }
    }
    (pre, post)
}

/// Euclidean distance from the pitch center (origin).
pub fn dist_to_center(x: f64, y: f64) -> f64 {
    (x * x + y * y).sqrt()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::frame;
    use super::*;
    use crate::data::models::PossessionGroup;

    fn timeline() -> Vec<TrackingFrame> {
        (0..10)
            .map(|i| frame(100 + i, i as f64 * 10.0, 1, &[], PossessionGroup::None))
            .collect()
    }

    #[test]
    fn sort_orders_by_period_then_time() {
        let mut frames = vec![
            frame(3, 5.0, 2, &[], PossessionGroup::None),
            frame(2, 9.0, 1, &[], PossessionGroup::None),
            frame(1, 1.0, 1, &[], PossessionGroup::None),
        ];
        sort_frames(&mut frames);
        let ids: Vec<i64> = frames.iter().map(|f| f.frame_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn locate_by_frame_id_or_timestamp() {
        let frames = timeline();
        assert_eq!(locate_event_frame(&frames, Some(104), None, 999.0), Some(4));
        assert_eq!(locate_event_frame(&frames, None, None, 30.4), Some(3));
        assert_eq!(locate_event_frame(&frames, Some(1), None, 35.0), None);
    }

    #[test]
    fn frame_id_wins_over_earlier_timestamp_match() {
        // Clock restarts in the second half: both frames sit at 10s.
        let frames = vec![
            frame(100, 10.0, 1, &[], PossessionGroup::None),
            frame(900, 10.0, 2, &[], PossessionGroup::None),
        ];
        assert_eq!(locate_event_frame(&frames, Some(900), Some(2), 10.0), Some(1));
        assert_eq!(locate_event_frame(&frames, Some(900), None, 10.0), Some(1));
        // Unknown id falls back to the timestamp inside the event's period.
        assert_eq!(locate_event_frame(&frames, Some(5), Some(2), 10.2), Some(1));
        assert_eq!(locate_event_frame(&frames, None, Some(3), 10.0), None);
    }

    #[test]
    fn detects_unsorted_frames() {
        let mut frames = vec![
            frame(2, 1.0, 2, &[], PossessionGroup::None),
            frame(1, 9.0, 1, &[], PossessionGroup::None),
        ];
        assert!(!is_sorted_frames(&frames));
        sort_frames(&mut frames);
        assert!(is_sorted_frames(&frames));
        assert!(is_sorted_frames(&[]));
    }

    #[test]
    fn split_window_bounds() {
        let frames = timeline();
        let split = split_window(&frames, Some(1), 40.0, 20.0);
        let pre: Vec<f64> = split.pre.iter().map(|f| f.timestamp).collect();
        let post: Vec<f64> = split.post.iter().map(|f| f.timestamp).collect();
        assert_eq!(pre, vec![20.0, 30.0]);
        assert_eq!(post, vec![40.0, 50.0, 60.0]);
        assert!(split_window(&frames, Some(2), 40.0, 20.0).post.is_empty());
    }

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 3.0]), Some(2.0));
    }
}
