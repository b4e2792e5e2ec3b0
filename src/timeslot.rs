//! Slot arithmetic
//!
//! Pure time-range helpers used by the availability checker and the
//! confirmation-time re-check. No I/O, no shared state.

use chrono::{DateTime, Duration, Utc};

/// A half-open appointment window `[start, start + minutes)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub minutes: i64,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, minutes: i64) -> Self {
        Self { start, minutes }
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.start + Duration::minutes(self.minutes)
    }

    /// Half-open overlap test: ranges that merely touch do not conflict,
    /// so a 10:00-10:30 booking leaves 10:30-11:00 free.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, hour, min, 0).unwrap()
    }

    #[test]
    fn overlapping_ranges_conflict() {
        let booked = TimeRange::new(at(10, 0), 30);
        assert!(booked.overlaps(&TimeRange::new(at(10, 15), 30)));
        assert!(booked.overlaps(&TimeRange::new(at(9, 45), 30)));
        // fully contained
        assert!(booked.overlaps(&TimeRange::new(at(10, 5), 10)));
        // containing
        assert!(booked.overlaps(&TimeRange::new(at(9, 0), 180)));
    }

    #[test]
    fn touching_boundaries_do_not_conflict() {
        let booked = TimeRange::new(at(10, 0), 30);
        assert!(!booked.overlaps(&TimeRange::new(at(10, 30), 30)));
        assert!(!booked.overlaps(&TimeRange::new(at(9, 30), 30)));
    }

    #[test]
    fn disjoint_ranges_do_not_conflict() {
        let booked = TimeRange::new(at(10, 0), 30);
        assert!(!booked.overlaps(&TimeRange::new(at(12, 0), 30)));
    }

    #[test]
    fn end_is_start_plus_duration() {
        let range = TimeRange::new(at(10, 0), 45);
        assert_eq!(range.end(), at(10, 45));
    }
}
