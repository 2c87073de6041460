//! Parsing of a single timetable row into a [`Course`].
//!
//! The time description packs weeks, weekday and periods into one string:
//!
//! - `"14-17周"`: weeks 14 to 17, no fixed slot (an all-week course)
//! - `"1-5,8,9周星期一3-5节"`: weeks 1-5, 8 and 9, Monday, periods 3 to 5

use std::sync::LazyLock;

use chrono::{NaiveTime, Weekday};
use regex::Regex;

use super::error::{Result, TimetableError};
use super::settings::PeriodClock;

static DESCRIPTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<weeks>[0-9,\-\s]+)周(?:星期(?P<day>.)(?P<periods>[0-9,\-\s]*)节)?$")
        .unwrap()
});

/// Where and when a fixed-slot course meets on its weekday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    /// 0 = Monday through 6 = Sunday.
    pub weekday: u8,
    /// Periods attended that day, in the order written.
    pub periods: Vec<u32>,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Slot {
    /// The weekday as a [`Weekday`], or `None` if the index is out of range.
    pub fn day(&self) -> Option<Weekday> {
        Weekday::try_from(self.weekday).ok()
    }
}

/// Whether a course has a fixed daily slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// No fixed weekday or period; never expanded into calendar events.
    AllWeek,
    Fixed(Slot),
}

/// One parsed timetable row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub name: String,
    pub section_number: String,
    pub location: String,
    pub teacher: String,
    /// Semester weeks the course meets in. Never empty.
    pub weeks: Vec<u32>,
    pub schedule: Schedule,
}

impl Course {
    /// Builds a course from the five cells of a row: name, section number,
    /// time description, location and teacher.
    pub fn from_row(cells: &[String; 5], clock: &PeriodClock) -> Result<Self> {
        let [name, section_number, time, location, teacher] = cells;
        let (weeks, schedule) = parse_time_description(time, clock)?;

        Ok(Course {
            name: name.clone(),
            section_number: section_number.clone(),
            location: location.clone(),
            teacher: teacher.clone(),
            weeks,
            schedule,
        })
    }

    pub fn is_all_week(&self) -> bool {
        matches!(self.schedule, Schedule::AllWeek)
    }

    pub fn slot(&self) -> Option<&Slot> {
        match &self.schedule {
            Schedule::Fixed(slot) => Some(slot),
            Schedule::AllWeek => None,
        }
    }

    pub fn weekday(&self) -> Option<u8> {
        self.slot().map(|s| s.weekday)
    }

    pub fn start(&self) -> Option<NaiveTime> {
        self.slot().map(|s| s.start)
    }

    pub fn end(&self) -> Option<NaiveTime> {
        self.slot().map(|s| s.end)
    }

    /// Returns true if the course meets in `week`.
    pub fn meets_in_week(&self, week: u32) -> bool {
        self.weeks.contains(&week)
    }
}

/// Highest week number a time description may name.
pub const MAX_WEEK: u32 = 52;

/// Expands a comma-separated list of numbers and inclusive `a-b` ranges.
///
/// Members come out in the order written and duplicates are kept, so
/// `"1,2-4,5"` gives `[1, 2, 3, 4, 5]`. A range whose start exceeds its end
/// contributes nothing. Any number above `max` is a format error.
pub fn parse_range_list(s: &str, max: u32) -> Result<Vec<u32>> {
    expand_range_list(s, max, |n| {
        TimetableError::format(format!("number {} in list {:?} is above {}", n, s, max))
    })
}

/// Bounds are checked before a range is expanded.
fn expand_range_list(
    s: &str,
    max: u32,
    too_large: impl Fn(u32) -> TimetableError,
) -> Result<Vec<u32>> {
    let mut result = Vec::new();

    for token in s.split(',') {
        let token = token.trim();
        let (start, end) = match token.split_once('-') {
            Some((start, end)) => (parse_number(start, s)?, parse_number(end, s)?),
            None => {
                let n = parse_number(token, s)?;
                (n, n)
            }
        };
        if let Some(&n) = [start, end].iter().find(|&&n| n > max) {
            return Err(too_large(n));
        }
        result.extend(start..=end);
    }

    Ok(result)
}

fn parse_number(token: &str, list: &str) -> Result<u32> {
    token.trim().parse::<u32>().map_err(|_| {
        TimetableError::format(format!("invalid number {:?} in list {:?}", token, list))
    })
}

/// Maps the character after `星期` to a weekday index.
fn weekday_index(day: &str) -> Option<u8> {
    match day {
        "一" => Some(0),
        "二" => Some(1),
        "三" => Some(2),
        "四" => Some(3),
        "五" => Some(4),
        "六" => Some(5),
        "日" | "天" => Some(6),
        _ => None,
    }
}

/// Parses a time description into its week list and schedule.
pub fn parse_time_description(
    description: &str,
    clock: &PeriodClock,
) -> Result<(Vec<u32>, Schedule)> {
    let description = description.trim();
    let caps = DESCRIPTION_REGEX.captures(description).ok_or_else(|| {
        TimetableError::format(format!("unrecognized time description {:?}", description))
    })?;

    let weeks = expand_range_list(&caps["weeks"], MAX_WEEK, |week| {
        TimetableError::format(format!(
            "week {} in time description {:?} is above {}",
            week, description, MAX_WEEK
        ))
    })?;
    if weeks.contains(&0) {
        return Err(TimetableError::format(format!(
            "week 0 in time description {:?}, weeks start at 1",
            description
        )));
    }
    if weeks.is_empty() {
        return Err(TimetableError::format(format!(
            "no weeks in time description {:?}",
            description
        )));
    }

    let Some(day) = caps.name("day") else {
        return Ok((weeks, Schedule::AllWeek));
    };

    let weekday = weekday_index(day.as_str()).ok_or_else(|| {
        TimetableError::format(format!(
            "unknown weekday {:?} in time description {:?}",
            day.as_str(),
            description
        ))
    })?;

    let periods_text = caps.name("periods").map_or("", |m| m.as_str());
    if periods_text.trim().is_empty() {
        return Err(TimetableError::format(format!(
            "no periods in time description {:?}",
            description
        )));
    }
    let periods = expand_range_list(periods_text, clock.last_period(), |period| {
        TimetableError::Lookup { period }
    })?;
    let (Some(&first), Some(&last)) = (periods.first(), periods.last()) else {
        return Err(TimetableError::format(format!(
            "no periods in time description {:?}",
            description
        )));
    };

    // Every period must be known, not just the first and last.
    for &period in &periods {
        clock.start_of(period)?;
    }

    let slot = Slot {
        weekday,
        start: clock.start_of(first)?,
        end: clock.end_of(last)?,
        periods,
    };

    Ok((weeks, Schedule::Fixed(slot)))
}
