use crate::models::Frame;

/// Index of the frame closest to `timestamp`, or `None` for an empty slice.
///
/// Binary-searches for the first frame at or after `timestamp`, then prefers
/// the previous frame when it is at least as close. Frames must be sorted by
/// timestamp.
pub fn find_frame_index_for_timestamp(frames: &[Frame], timestamp: i64) -> Option<usize> {
    let last = frames.len().checked_sub(1)?;

    let (mut lo, mut hi) = (0, last);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if frames[mid].timestamp < timestamp {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }

    if lo > 0 {
        let before = timestamp.abs_diff(frames[lo - 1].timestamp);
        let after = timestamp.abs_diff(frames[lo].timestamp);
        if before <= after {
            return Some(lo - 1);
        }
    }
    Some(lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(timestamps: &[i64]) -> Vec<Frame> {
        timestamps
            .iter()
            .map(|&timestamp| Frame {
                timestamp,
                image: String::new(),
            })
            .collect()
    }

    #[test]
    fn empty_has_no_frame() {
        assert_eq!(find_frame_index_for_timestamp(&[], 10), None);
    }

    #[test]
    fn clamps_to_the_ends() {
        let frames = frames(&[100, 200, 400]);
        assert_eq!(find_frame_index_for_timestamp(&frames, -5), Some(0));
        assert_eq!(find_frame_index_for_timestamp(&frames, 99), Some(0));
        assert_eq!(find_frame_index_for_timestamp(&frames, 401), Some(2));
        assert_eq!(find_frame_index_for_timestamp(&frames, i64::MAX), Some(2));
        assert_eq!(find_frame_index_for_timestamp(&frames, i64::MIN), Some(0));
    }

    #[test]
    fn picks_the_nearer_neighbour() {
        let frames = frames(&[100, 200, 400]);
        assert_eq!(find_frame_index_for_timestamp(&frames, 260), Some(1));
        assert_eq!(find_frame_index_for_timestamp(&frames, 310), Some(2));
        assert_eq!(find_frame_index_for_timestamp(&frames, 200), Some(1));
    }

    #[test]
    fn ties_go_to_the_earlier_frame() {
        let frames = frames(&[100, 200, 400]);
        assert_eq!(find_frame_index_for_timestamp(&frames, 300), Some(1));
        assert_eq!(find_frame_index_for_timestamp(&frames, 150), Some(0));
    }

    #[test]
    fn single_frame_always_matches() {
        let frames = frames(&[42]);
        assert_eq!(find_frame_index_for_timestamp(&frames, 0), Some(0));
        assert_eq!(find_frame_index_for_timestamp(&frames, 100), Some(0));
    }

    #[test]
    fn agrees_with_linear_scan() {
        let frames = frames(&[0, 7, 8, 30, 31, 90, 200, 201, 500]);
        for t in -10i64..520 {
            let expected = frames
                .iter()
                .enumerate()
                .min_by_key(|(_, f)| t.abs_diff(f.timestamp))
                .map(|(i, _)| i);
            assert_eq!(find_frame_index_for_timestamp(&frames, t), expected, "t={t}");
        }
    }
}
