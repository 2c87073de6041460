//! Immutable settings threaded through parsing and event expansion.

use std::collections::BTreeMap;

use chrono::{Duration, FixedOffset, NaiveTime, Offset, Utc};

use super::error::{Result, TimetableError};

/// Default lesson length in minutes.
pub const DEFAULT_LESSON_MINUTES: i64 = 45;

/// Default number of weeks in a semester.
pub const DEFAULT_SEMESTER_WEEKS: u32 = 20;

/// Default calendar timezone identifier.
pub const DEFAULT_TZID: &str = "Asia/Shanghai";

/// Default UTC offset of [`DEFAULT_TZID`], in seconds.
pub const DEFAULT_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// Start times of the 13 daily periods.
const DEFAULT_PERIOD_STARTS: [(u32, u32, u32); 13] = [
    (1, 8, 30),
    (2, 9, 25),
    (3, 10, 30),
    (4, 11, 25),
    (5, 13, 30),
    (6, 14, 25),
    (7, 15, 20),
    (8, 16, 25),
    (9, 17, 20),
    (10, 19, 0),
    (11, 19, 55),
    (12, 20, 50),
    (13, 21, 45),
];

/// Maps a period index to its wall-clock start time, with one fixed lesson
/// duration for every period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodClock {
    starts: BTreeMap<u32, NaiveTime>,
    lesson: Duration,
}

impl PeriodClock {
    pub fn new(starts: BTreeMap<u32, NaiveTime>, lesson_minutes: i64) -> Self {
        Self {
            starts,
            lesson: Duration::minutes(lesson_minutes),
        }
    }

    /// Start time of `period`, or a lookup error if it is not configured.
    pub fn start_of(&self, period: u32) -> Result<NaiveTime> {
        self.starts
            .get(&period)
            .copied()
            .ok_or(TimetableError::Lookup { period })
    }

    /// End time of `period` (start + lesson duration).
    pub fn end_of(&self, period: u32) -> Result<NaiveTime> {
        Ok(self.start_of(period)? + self.lesson)
    }

    pub fn lesson_duration(&self) -> Duration {
        self.lesson
    }

    pub fn contains(&self, period: u32) -> bool {
        self.starts.contains_key(&period)
    }

    /// Highest configured period, or 0 for an empty clock.
    pub fn last_period(&self) -> u32 {
        self.starts.keys().next_back().copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }
}

impl Default for PeriodClock {
    fn default() -> Self {
        let starts = DEFAULT_PERIOD_STARTS
            .iter()
            .filter_map(|&(period, h, m)| NaiveTime::from_hms_opt(h, m, 0).map(|t| (period, t)))
            .collect();
        Self::new(starts, DEFAULT_LESSON_MINUTES)
    }
}

/// The single fixed timezone every event is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarZone {
    /// Identifier written as `TZID` in the exported calendar.
    pub tzid: String,
    pub offset: FixedOffset,
}

impl Default for CalendarZone {
    fn default() -> Self {
        Self {
            tzid: DEFAULT_TZID.to_string(),
            offset: FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS).unwrap_or(Utc.fix()),
        }
    }
}

/// Everything the parser and builder need besides the table itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimetableSettings {
    pub clock: PeriodClock,
    pub zone: CalendarZone,
    pub semester_weeks: u32,
}

impl Default for TimetableSettings {
    fn default() -> Self {
        Self {
            clock: PeriodClock::default(),
            zone: CalendarZone::default(),
            semester_weeks: DEFAULT_SEMESTER_WEEKS,
        }
    }
}
