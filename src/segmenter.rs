//! Overlapping fixed-length windows over a source recording.
//!
//! Pure computation: no audio is read or written here. The segment stage feeds
//! these windows to an [`AudioCutter`](crate::tools::cutter::AudioCutter).

use crate::defaults;
use crate::error::{PrepError, Result};
use crate::layout::SegmentName;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the end of a source file is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoundaryPolicy {
    /// Emit windows while `start < measured duration`.
    #[default]
    Measured,
    /// Ignore the measured duration and keep cutting until the cutter reports
    /// that no audio is left.
    ToolSignaled,
}

impl fmt::Display for BoundaryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryPolicy::Measured => f.write_str("measured"),
            BoundaryPolicy::ToolSignaled => f.write_str("tool-signaled"),
        }
    }
}

impl FromStr for BoundaryPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "measured" => Ok(BoundaryPolicy::Measured),
            "tool-signaled" | "tool_signaled" | "toolsignaled" => Ok(BoundaryPolicy::ToolSignaled),
            other => Err(format!(
                "unknown boundary policy '{other}' (expected 'measured' or 'tool-signaled')"
            )),
        }
    }
}

/// One window `[start, end)` of a source file, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub number: u32,
    pub start_secs: u64,
    pub end_secs: u64,
}

impl Segment {
    pub fn duration_secs(&self) -> u64 {
        self.end_secs - self.start_secs
    }

    /// Canonical file name of this window for a given source.
    pub fn name(&self, base_name: &str, extension: &str) -> SegmentName {
        SegmentName::new(
            base_name,
            self.number,
            self.start_secs,
            self.end_secs,
            extension,
        )
    }
}

/// Validated segmentation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPlan {
    start_secs: u64,
    interval_secs: u64,
    overlay_secs: u64,
}

impl SegmentPlan {
    /// `interval_secs` must be positive; any overlay, even one larger than the
    /// interval, is accepted.
    pub fn new(start_secs: u64, interval_secs: u64, overlay_secs: u64) -> Result<Self> {
        if interval_secs == 0 {
            return Err(PrepError::InvalidParameter {
                name: "interval".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        interval_secs
            .checked_add(overlay_secs)
            .ok_or_else(|| PrepError::InvalidParameter {
                name: "overlay".to_string(),
                message: "interval + overlay overflows".to_string(),
            })?;
        Ok(Self {
            start_secs,
            interval_secs,
            overlay_secs,
        })
    }

    pub fn start_secs(&self) -> u64 {
        self.start_secs
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }

    pub fn overlay_secs(&self) -> u64 {
        self.overlay_secs
    }

    /// Length of every window: interval + overlay.
    pub fn window_secs(&self) -> u64 {
        self.interval_secs + self.overlay_secs
    }

    /// Windows bounded by `source_duration`, or unbounded when `None`.
    ///
    /// The iterator is a fresh value each call; calling this twice yields the
    /// same sequence.
    pub fn segments(&self, source_duration: Option<u64>) -> Segments {
        Segments {
            next_number: Some(1),
            current: Some(self.start_secs),
            interval: self.interval_secs,
            window: self.window_secs(),
            bound: source_duration,
        }
    }

    /// Number of windows for a measured duration: `ceil((duration - start) / interval)`.
    pub fn expected_count(&self, source_duration: u64) -> u64 {
        source_duration
            .saturating_sub(self.start_secs)
            .div_ceil(self.interval_secs)
    }
}

impl Default for SegmentPlan {
    fn default() -> Self {
        Self {
            start_secs: defaults::START_SECS,
            interval_secs: defaults::INTERVAL_SECS,
            overlay_secs: defaults::OVERLAY_SECS,
        }
    }
}

/// Convenience wrapper: validate parameters and return the window sequence.
pub fn segments(
    source_duration: Option<u64>,
    start_secs: u64,
    interval_secs: u64,
    overlay_secs: u64,
) -> Result<Segments> {
    Ok(SegmentPlan::new(start_secs, interval_secs, overlay_secs)?.segments(source_duration))
}

/// Lazy window sequence. See [`SegmentPlan::segments`].
#[derive(Debug, Clone)]
pub struct Segments {
    next_number: Option<u32>,
    current: Option<u64>,
    interval: u64,
    window: u64,
    bound: Option<u64>,
}

impl Iterator for Segments {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        let number = self.next_number?;
        let start = self.current?;
        if let Some(bound) = self.bound
            && start >= bound
        {
            return None;
        }
        let end = start.checked_add(self.window)?;

        self.next_number = number.checked_add(1);
        self.current = start.checked_add(self.interval);

        Some(Segment {
            number,
            start_secs: start,
            end_secs: end,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windows(duration: Option<u64>, start: u64, interval: u64, overlay: u64) -> Vec<(u64, u64)> {
        segments(duration, start, interval, overlay)
            .unwrap()
            .map(|s| (s.start_secs, s.end_secs))
            .collect()
    }

    #[test]
    fn default_parameters_over_100_seconds() {
        assert_eq!(
            windows(Some(100), 0, 30, 5),
            vec![(0, 35), (30, 65), (60, 95), (90, 125)]
        );
    }

    #[test]
    fn numbers_start_at_one_and_increase() {
        let numbers: Vec<u32> = segments(Some(100), 0, 30, 5)
            .unwrap()
            .map(|s| s.number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn count_matches_ceiling_formula() {
        for &(duration, start, interval, overlay) in &[
            (100u64, 0u64, 30u64, 5u64),
            (90, 0, 30, 5),
            (91, 0, 30, 0),
            (1, 0, 1, 0),
            (3601, 10, 7, 3),
            (59, 58, 30, 40),
            (1000, 0, 1000, 0),
        ] {
            let plan = SegmentPlan::new(start, interval, overlay).unwrap();
            let produced: Vec<Segment> = plan.segments(Some(duration)).collect();
            assert_eq!(
                produced.len() as u64,
                plan.expected_count(duration),
                "duration={duration} start={start} interval={interval}"
            );
            for (i, segment) in produced.iter().enumerate() {
                assert_eq!(segment.start_secs, start + i as u64 * interval);
                assert_eq!(segment.duration_secs(), interval + overlay);
            }
        }
    }

    #[test]
    fn consecutive_windows_overlap_by_overlay() {
        let produced: Vec<Segment> = segments(Some(200), 0, 30, 5).unwrap().collect();
        for pair in produced.windows(2) {
            assert_eq!(pair[1].start_secs - pair[0].start_secs, 30);
            assert_eq!(pair[0].end_secs - pair[1].start_secs, 5);
        }
    }

    #[test]
    fn start_at_or_past_duration_yields_nothing() {
        assert!(windows(Some(100), 100, 30, 5).is_empty());
        assert!(windows(Some(100), 150, 30, 5).is_empty());
        assert!(windows(Some(0), 0, 30, 5).is_empty());
    }

    #[test]
    fn zero_interval_is_rejected_before_any_segment() {
        let err = segments(Some(100), 0, 0, 5).unwrap_err();
        assert!(matches!(err, PrepError::InvalidParameter { ref name, .. } if name == "interval"));
    }

    #[test]
    fn overlay_larger_than_interval_is_allowed() {
        assert_eq!(
            windows(Some(20), 0, 10, 25),
            vec![(0, 35), (10, 45)]
        );
    }

    #[test]
    fn overflowing_window_is_rejected() {
        assert!(SegmentPlan::new(0, u64::MAX, 1).is_err());
    }

    #[test]
    fn unbounded_sequence_keeps_going() {
        let first: Vec<(u64, u64)> = segments(None, 0, 30, 5)
            .unwrap()
            .take(6)
            .map(|s| (s.start_secs, s.end_secs))
            .collect();
        assert_eq!(first.len(), 6);
        assert_eq!(first[5], (150, 185));
    }

    #[test]
    fn sequence_is_restartable() {
        let plan = SegmentPlan::new(5, 30, 5).unwrap();
        let a: Vec<Segment> = plan.segments(Some(500)).collect();
        let b: Vec<Segment> = plan.segments(Some(500)).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn segment_name_uses_window() {
        let segment = Segment {
            number: 2,
            start_secs: 30,
            end_secs: 65,
        };
        assert_eq!(
            segment.name("foo", "wav").file_name(),
            "foo_00002_00-00-30~00-01-05.wav"
        );
    }

    #[test]
    fn boundary_policy_parsing() {
        assert_eq!("measured".parse(), Ok(BoundaryPolicy::Measured));
        assert_eq!("tool-signaled".parse(), Ok(BoundaryPolicy::ToolSignaled));
        assert_eq!("Tool_Signaled".parse(), Ok(BoundaryPolicy::ToolSignaled));
        assert!("sometimes".parse::<BoundaryPolicy>().is_err());
        assert_eq!(BoundaryPolicy::ToolSignaled.to_string(), "tool-signaled");
        assert_eq!(BoundaryPolicy::default(), BoundaryPolicy::Measured);
    }
}
