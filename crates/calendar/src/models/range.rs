//! Half-open time ranges
//!
//! Conforming to iCalendar, the start of a range is inclusive and the end is
//! exclusive. A zero-length range `[t, t)` stands for the instant `t`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Error returned when a range would end before it starts
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("range starts at {start} but ends earlier, at {end}")]
    Inverted {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// How two ranges relate to each other
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOverlap {
    /// The ranges don't overlap
    NoOverlap,
    /// The ranges intersect, but both have non-intersected areas
    Intersects,
    /// The first range is a subset of the second
    Subset,
    /// The ranges are exactly equal
    Equal,
    /// The first range is a superset of the second
    Superset,
}

/// Position of a range relative to another one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePosition {
    Before,
    Match,
    After,
}

/// A half-open `[start, end)` range of time
///
/// Ranges order by start, then by end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct Range {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<RawRange> for Range {
    type Error = RangeError;

    fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
        Range::try_new(raw.start, raw.end)
    }
}

impl Range {
    /// Create a new range.
    ///
    /// # Panics
    /// Panics if `start > end`. Use [`Range::try_new`] for untrusted input.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        assert!(
            start <= end,
            "range start {start} must not be after its end {end}"
        );
        Self { start, end }
    }

    /// Create a new range, rejecting inverted bounds
    pub fn try_new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, RangeError> {
        if start > end {
            return Err(RangeError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Create a range covering `duration` from `start`
    pub fn starting_at(start: DateTime<Utc>, duration: Duration) -> Self {
        Self::new(start, start + duration)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether this is a zero-length range (an instant)
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `instant` falls within `[start, end)`
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Whether the two ranges share any point in time.
    ///
    /// Two non-empty ranges intersect iff `a.start < b.end && b.start < a.end`.
    /// An instant intersects a range that contains it, and another instant
    /// only when both are the same.
    pub fn intersects(&self, other: &Range) -> bool {
        match (self.is_empty(), other.is_empty()) {
            (true, true) => self.start == other.start,
            (true, false) => other.contains(self.start),
            (false, true) => self.contains(other.start),
            (false, false) => self.start < other.end && other.start < self.end,
        }
    }

    /// Classify how `self` relates to `other`.
    ///
    /// The position is `self` relative to `other`: for overlapping ranges it
    /// reflects which start (or, for equal starts, which end) comes first.
    pub fn overlap(&self, other: &Range) -> (RangeOverlap, RangePosition) {
        let starts = self.start.cmp(&other.start);
        let ends = self.end.cmp(&other.end);

        match (starts, ends) {
            (Ordering::Equal, Ordering::Equal) => (RangeOverlap::Equal, RangePosition::Match),
            (Ordering::Equal, Ordering::Greater) => (RangeOverlap::Superset, RangePosition::After),
            (Ordering::Equal, Ordering::Less) => (RangeOverlap::Subset, RangePosition::Before),
            _ if self.start >= other.end => (RangeOverlap::NoOverlap, RangePosition::After),
            _ if self.end <= other.start => (RangeOverlap::NoOverlap, RangePosition::Before),
            (Ordering::Less, Ordering::Greater | Ordering::Equal) => {
                (RangeOverlap::Superset, RangePosition::Before)
            }
            (Ordering::Greater, Ordering::Less | Ordering::Equal) => {
                (RangeOverlap::Subset, RangePosition::After)
            }
            (Ordering::Less, _) => (RangeOverlap::Intersects, RangePosition::Before),
            _ => (RangeOverlap::Intersects, RangePosition::After),
        }
    }

    /// Smallest range covering both ranges
    pub fn union(&self, other: &Range) -> Range {
        Range {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// The common part of both ranges, if they intersect
    pub fn intersection(&self, other: &Range) -> Option<Range> {
        if !self.intersects(other) {
            return None;
        }
        let start = self.start.max(other.start);
        let end = self.end.min(other.end).max(start);
        Some(Range { start, end })
    }

    /// The same range moved by `offset`
    pub fn shifted(&self, offset: Duration) -> Range {
        Range {
            start: self.start + offset,
            end: self.end + offset,
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}
