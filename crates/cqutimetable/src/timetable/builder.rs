//! Building a [`Timetable`] from a decoded table and expanding it into
//! calendar events.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday};
use regex::Regex;
use tracing::{debug, info, warn};

use super::course::Course;
use super::error::{Result, TimetableError};
use super::ics::{write_calendar, CalendarEvent, CalendarExport, CalendarHeader};
use super::settings::{CalendarZone, TimetableSettings};
use super::table::{SourceTable, EXPECTED_COLUMNS, TIMETABLE_MARKER};

static LOOSE_DATE_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-./ ]").unwrap());

/// Parses a `YYYY-MM-DD` semester start and checks that it is a Monday.
pub fn parse_semester_start(text: &str) -> Result<NaiveDate> {
    let date = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").map_err(|e| {
        TimetableError::date(format!("invalid semester start {:?}: {}", text, e))
    })?;
    ensure_monday(date)?;
    Ok(date)
}

fn ensure_monday(date: NaiveDate) -> Result<()> {
    if date.weekday() == Weekday::Mon {
        Ok(())
    } else {
        Err(TimetableError::date(format!(
            "semester start {} is a {:?}, not a Monday",
            date,
            date.weekday()
        )))
    }
}

/// A parsed upload: the courses, their semester window and the events they
/// expand into.
#[derive(Debug, Clone)]
pub struct Timetable {
    semester_start: NaiveDate,
    semester_end: NaiveDate,
    courses: Vec<Course>,
    events: Vec<CalendarEvent>,
    zone: CalendarZone,
    created_at: DateTime<Utc>,
}

/// A class found by [`Timetable::next_class`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpcomingClass<'a> {
    pub date: NaiveDate,
    pub course: &'a Course,
}

impl Timetable {
    /// Validates `table` and builds one course per timetable row.
    ///
    /// Title, repeated header, ragged and blank rows are skipped. Any row that
    /// fails to parse aborts the whole import.
    pub fn build(
        table: &SourceTable,
        semester_start: NaiveDate,
        settings: &TimetableSettings,
    ) -> Result<Self> {
        ensure_monday(semester_start)?;

        if !table.has_marker() {
            return Err(TimetableError::format(format!(
                "table is not a timetable export (no {:?} marker)",
                TIMETABLE_MARKER
            )));
        }
        if !table.has_expected_columns() {
            return Err(TimetableError::format(format!(
                "expected column headers {:?}, found {:?}",
                EXPECTED_COLUMNS,
                table.rows.first().cloned().unwrap_or_default()
            )));
        }

        let mut courses = Vec::new();
        for (index, row) in table.rows.iter().enumerate() {
            let Some(cells) = timetable_cells(row) else {
                debug!(row = index, cells = row.len(), "Skipping non-course row");
                continue;
            };

            let course = Course::from_row(&cells, &settings.clock).inspect_err(|e| {
                warn!(row = index, error = %e, "Failed to parse timetable row");
            })?;
            courses.push(course);
        }

        let semester_end = last_semester_day(semester_start, settings.semester_weeks)?;
        let events = expand_events(&courses, semester_start, &settings.zone)?;

        info!(
            courses = courses.len(),
            events = events.len(),
            semester_start = %semester_start,
            "Built timetable"
        );

        Ok(Timetable {
            semester_start,
            semester_end,
            courses,
            events,
            zone: settings.zone.clone(),
            created_at: Utc::now(),
        })
    }

    pub fn semester_start(&self) -> NaiveDate {
        self.semester_start
    }

    /// Last day of the semester (a Sunday).
    pub fn semester_end(&self) -> NaiveDate {
        self.semester_end
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn events(&self) -> &[CalendarEvent] {
        &self.events
    }

    /// Name of the semester, e.g. `2024年春季学期`.
    pub fn semester_name(&self) -> String {
        let season = if self.semester_start.month() <= 6 {
            "春"
        } else {
            "秋"
        };
        format!("{}年{}季学期", self.semester_start.year(), season)
    }

    /// Serializes the events as an iCalendar document and its shareable
    /// `data:` URI.
    pub fn export_calendar(&self) -> CalendarExport {
        let name = self.semester_name();
        let header = CalendarHeader {
            name: &name,
            zone: &self.zone,
            created_at: self.created_at,
        };
        let ics = write_calendar(&header, &self.events).into_bytes();

        debug!(bytes = ics.len(), events = self.events.len(), "Exported calendar");

        CalendarExport::new(ics)
    }

    /// Courses meeting in `week`, in table order.
    pub fn courses_in_week(&self, week: u32) -> Vec<&Course> {
        self.courses
            .iter()
            .filter(|c| c.meets_in_week(week))
            .collect()
    }

    /// Fixed-slot courses meeting on `weekday` of `week`, sorted by start time.
    pub fn courses_on_day(&self, week: u32, weekday: Weekday) -> Vec<&Course> {
        let day = weekday.num_days_from_monday();
        let mut courses: Vec<_> = self
            .courses_in_week(week)
            .into_iter()
            .filter(|c| c.weekday().map(u32::from) == Some(day))
            .collect();
        courses.sort_by_key(|c| c.start());
        courses
    }

    /// Courses held on `date`, sorted by start time. Empty outside the semester.
    pub fn course_on_date(&self, date: NaiveDate) -> Vec<&Course> {
        if date < self.semester_start || date > self.semester_end {
            return Vec::new();
        }
        let week = (date - self.semester_start).num_days() / 7 + 1;
        match u32::try_from(week) {
            Ok(week) => self.courses_on_day(week, date.weekday()),
            Err(_) => Vec::new(),
        }
    }

    /// Like [`course_on_date`](Self::course_on_date), for a loosely written date.
    ///
    /// Accepts `YYYY-MM-DD` (or `.`, `/`, space as separators) and `MM-DD`,
    /// which is taken to be in `today`'s year. Returns `None` if the text is
    /// not a date.
    pub fn find_one_day(&self, text: &str, today: NaiveDate) -> Option<Vec<&Course>> {
        let date = parse_loose_date(text, today.year())?;
        Some(self.course_on_date(date))
    }

    /// The first class starting strictly after `now`, searching forward until
    /// the end of the semester.
    pub fn next_class(&self, now: NaiveDateTime) -> Option<UpcomingClass<'_>> {
        let mut date = now.date().max(self.semester_start);
        while date <= self.semester_end {
            let found = self.course_on_date(date).into_iter().find(|course| {
                course
                    .start()
                    .is_some_and(|start| date.and_time(start) > now)
            });
            if let Some(course) = found {
                return Some(UpcomingClass { date, course });
            }
            date = date.succ_opt()?;
        }
        None
    }
}

/// Returns the five cells of a course row, or `None` for rows that are not
/// course rows: repeated headers, rows without exactly five cells and blank
/// rows.
fn timetable_cells(row: &[String]) -> Option<[String; 5]> {
    let cells: [String; 5] = row.to_vec().try_into().ok()?;
    if cells[0].trim() == EXPECTED_COLUMNS[0] {
        return None;
    }
    if cells.iter().all(|c| c.trim().is_empty()) {
        return None;
    }
    Some(cells)
}

fn last_semester_day(semester_start: NaiveDate, weeks: u32) -> Result<NaiveDate> {
    let days = u64::from(weeks.max(1)) * 7 - 1;
    semester_start.checked_add_days(Days::new(days)).ok_or_else(|| {
        TimetableError::date(format!(
            "a {} week semester starting {} ends past the last representable date",
            weeks, semester_start
        ))
    })
}

/// Date of `weekday` (0 = Monday) in semester week `week`, counted from 1.
fn class_date(semester_start: NaiveDate, week: u32, weekday: u8) -> Option<NaiveDate> {
    let days = u64::from(week.checked_sub(1)?) * 7 + u64::from(weekday);
    semester_start.checked_add_days(Days::new(days))
}

/// Expands every fixed-slot course into one event per week it meets.
fn expand_events(
    courses: &[Course],
    semester_start: NaiveDate,
    zone: &CalendarZone,
) -> Result<Vec<CalendarEvent>> {
    let mut events = Vec::new();

    for course in courses {
        let Some(slot) = course.slot() else {
            continue;
        };
        if slot.day().is_none() {
            warn!(
                course = %course.name,
                weekday = slot.weekday,
                "Skipping course with out-of-range weekday"
            );
            continue;
        }

        for &week in &course.weeks {
            let Some(date) = class_date(semester_start, week, slot.weekday) else {
                return Err(TimetableError::format(format!(
                    "week {} of course {:?} has no calendar date",
                    week, course.name
                )));
            };
            let start = zone.offset.from_local_datetime(&date.and_time(slot.start));
            let end = zone.offset.from_local_datetime(&date.and_time(slot.end));
            let (Some(start), Some(end)) = (start.single(), end.single()) else {
                warn!(course = %course.name, week, "Skipping unrepresentable event time");
                continue;
            };

            events.push(CalendarEvent {
                summary: course.name.clone(),
                start,
                end,
                location: course.location.clone(),
                description: event_description(course),
                week,
            });
        }
    }

    Ok(events)
}

fn event_description(course: &Course) -> String {
    let mut lines = Vec::new();
    if !course.teacher.is_empty() {
        lines.push(format!("教师: {}", course.teacher));
    }
    if !course.section_number.is_empty() {
        lines.push(format!("教学班号: {}", course.section_number));
    }
    lines.join("\n")
}

/// Parses `YYYY-MM-DD`-like text, or `MM-DD` in `default_year`.
pub fn parse_loose_date(text: &str, default_year: i32) -> Option<NaiveDate> {
    let parts = LOOSE_DATE_SPLIT
        .split(text.trim())
        .map(|p| p.parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;

    match parts.as_slice() {
        [year, month, day] => NaiveDate::from_ymd_opt(i32::try_from(*year).ok()?, *month, *day),
        [month, day] => NaiveDate::from_ymd_opt(default_year, *month, *day),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timetable::course::{Schedule, Slot};
    use chrono::{Duration, NaiveTime};

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn table(rows: &[[&str; 5]]) -> SourceTable {
        let mut all = vec![strings(&EXPECTED_COLUMNS)];
        all.extend(rows.iter().map(|r| strings(r)));
        SourceTable::new("Sheet1", strings(&["课表", "", "", "", ""]), all)
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 26).unwrap()
    }

    fn sample() -> Timetable {
        let table = table(&[
            ["高等数学", "0001", "1-5,8,9周星期一3-5节", "D1234", "张老师"],
            ["大学英语", "0002", "1-16周星期三1-2节", "A101", "李老师"],
            ["军事理论", "0003", "1-16周星期一1-2节", "B202", "王老师"],
            ["生产实习", "0004", "14-17周", "", "赵老师"],
        ]);
        Timetable::build(&table, monday(), &TimetableSettings::default()).unwrap()
    }

    #[test]
    fn test_event_count_is_sum_of_fixed_weeks() {
        let tt = sample();
        assert_eq!(tt.courses().len(), 4);
        assert_eq!(tt.events().len(), 7 + 16 + 16);
        assert!(tt.events().iter().all(|e| e.summary != "生产实习"));
    }

    #[test]
    fn test_event_times() {
        let tt = sample();
        let first = &tt.events()[0];
        assert_eq!(first.summary, "高等数学");
        assert_eq!(first.location, "D1234");
        assert_eq!(first.start.to_rfc3339(), "2024-02-26T10:30:00+08:00");
        assert_eq!(first.end.to_rfc3339(), "2024-02-26T14:15:00+08:00");

        // Week 8 of the same course.
        let week8 = &tt.events()[5];
        assert_eq!(week8.week, 8);
        assert_eq!(week8.start.date_naive(), NaiveDate::from_ymd_opt(2024, 4, 15).unwrap());

        let english = tt.events().iter().find(|e| e.summary == "大学英语").unwrap();
        assert_eq!(english.start.to_rfc3339(), "2024-02-28T08:30:00+08:00");
        assert_eq!(english.description, "教师: 李老师\n教学班号: 0002");
    }

    #[test]
    fn test_semester_window() {
        let tt = sample();
        assert_eq!(tt.semester_start(), monday());
        assert_eq!(tt.semester_end(), NaiveDate::from_ymd_opt(2024, 7, 14).unwrap());
        assert_eq!(tt.semester_end().weekday(), Weekday::Sun);
        assert_eq!(tt.semester_name(), "2024年春季学期");
    }

    #[test]
    fn test_non_monday_start_is_date_error() {
        let tuesday = NaiveDate::from_ymd_opt(2024, 2, 27).unwrap();
        let err =
            Timetable::build(&table(&[]), tuesday, &TimetableSettings::default()).unwrap_err();
        assert!(matches!(err, TimetableError::Date { .. }));

        // The date is checked before the table.
        let err = Timetable::build(&SourceTable::default(), tuesday, &TimetableSettings::default())
            .unwrap_err();
        assert!(matches!(err, TimetableError::Date { .. }));
    }

    #[test]
    fn test_parse_semester_start() {
        assert_eq!(parse_semester_start("2024-02-26"), Ok(monday()));
        assert!(matches!(
            parse_semester_start("2024-02-27"),
            Err(TimetableError::Date { .. })
        ));
        assert!(matches!(
            parse_semester_start("26/02/2024"),
            Err(TimetableError::Date { .. })
        ));
    }

    #[test]
    fn test_wrong_header_is_format_error() {
        let mut bad = table(&[["高等数学", "0001", "not a time", "D1234", "张老师"]]);
        bad.rows[0] = strings(&["课程", "教学班号", "上课时间", "上课地点", "上课教师"]);
        let err = Timetable::build(&bad, monday(), &TimetableSettings::default()).unwrap_err();
        // Rejected for the header, not for the unparsable row.
        assert!(matches!(
            err,
            TimetableError::Format { ref message } if message.contains("column headers")
        ));
    }

    #[test]
    fn test_missing_marker_is_format_error() {
        let mut bad = table(&[]);
        bad.title_row = strings(&["成绩单"]);
        let err = Timetable::build(&bad, monday(), &TimetableSettings::default()).unwrap_err();
        assert!(
            matches!(err, TimetableError::Format { ref message } if message.contains("marker"))
        );
    }

    #[test]
    fn test_skipped_rows() {
        let mut t = table(&[["高等数学", "0001", "1-2周星期一1-2节", "D1234", "张老师"]]);
        t.rows.push(strings(&EXPECTED_COLUMNS));
        t.rows.push(strings(&["备注: 以上课程"]));
        t.rows.push(strings(&["", "", "", "", ""]));
        t.rows.push(strings(&["a", "b", "c", "d", "e", "f"]));

        let tt = Timetable::build(&t, monday(), &TimetableSettings::default()).unwrap();
        assert_eq!(tt.courses().len(), 1);
        assert_eq!(tt.events().len(), 2);
    }

    #[test]
    fn test_one_bad_row_aborts_import() {
        let t = table(&[
            ["高等数学", "0001", "1-2周星期一1-2节", "D1234", "张老师"],
            ["大学英语", "0002", "每周三上午", "A101", "李老师"],
        ]);
        let err = Timetable::build(&t, monday(), &TimetableSettings::default()).unwrap_err();
        assert!(matches!(
            err,
            TimetableError::Format { ref message } if message.contains("每周三上午")
        ));
    }

    fn last_monday() -> NaiveDate {
        let offset = NaiveDate::MAX.weekday().num_days_from_monday();
        NaiveDate::MAX - Duration::days(i64::from(offset))
    }

    #[test]
    fn test_out_of_range_numbers_abort_import() {
        for description in ["20000000周星期一1节", "1-1000000000周", "0周星期一1节"] {
            let t = table(&[["高等数学", "0001", description, "D1234", "张老师"]]);
            let err = Timetable::build(&t, monday(), &TimetableSettings::default()).unwrap_err();
            assert!(
                matches!(err, TimetableError::Format { .. }),
                "{description:?} gave {err:?}"
            );
        }

        let t = table(&[["高等数学", "0001", "1周星期一1-4000000000节", "D1234", "张老师"]]);
        let err = Timetable::build(&t, monday(), &TimetableSettings::default()).unwrap_err();
        assert_eq!(err, TimetableError::Lookup { period: 4000000000 });
    }

    #[test]
    fn test_semester_past_last_date_is_date_error() {
        assert!(matches!(
            last_semester_day(last_monday(), 20),
            Err(TimetableError::Date { .. })
        ));
        assert_eq!(
            last_semester_day(monday(), 1),
            Ok(NaiveDate::from_ymd_opt(2024, 3, 3).unwrap())
        );

        let t = table(&[["高等数学", "0001", "1-2周星期一1节", "D1234", "张老师"]]);
        let err = Timetable::build(&t, last_monday(), &TimetableSettings::default()).unwrap_err();
        assert!(matches!(err, TimetableError::Date { .. }));
    }

    #[test]
    fn test_class_date() {
        assert_eq!(class_date(monday(), 1, 0), Some(monday()));
        assert_eq!(
            class_date(monday(), 8, 0),
            NaiveDate::from_ymd_opt(2024, 4, 15)
        );
        assert_eq!(class_date(monday(), 0, 0), None);
        assert_eq!(class_date(last_monday(), 2, 0), None);
        assert_eq!(class_date(monday(), u32::MAX, 6), None);
    }

    #[test]
    fn test_event_past_last_date_is_format_error() {
        let course = Course {
            name: "高等数学".to_string(),
            section_number: String::new(),
            location: String::new(),
            teacher: String::new(),
            weeks: vec![1, 2],
            schedule: Schedule::Fixed(Slot {
                weekday: 0,
                periods: vec![1],
                start: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
                end: NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            }),
        };
        let err = expand_events(&[course], last_monday(), &CalendarZone::default()).unwrap_err();
        assert!(
            matches!(err, TimetableError::Format { ref message } if message.contains("week 2"))
        );
    }

    #[test]
    fn test_out_of_range_weekday_is_not_expanded() {
        let course = Course {
            name: "坏数据".to_string(),
            section_number: String::new(),
            location: String::new(),
            teacher: String::new(),
            weeks: vec![1, 2],
            schedule: Schedule::Fixed(Slot {
                weekday: 7,
                periods: vec![1],
                start: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
                end: NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            }),
        };
        let events = expand_events(&[course], monday(), &CalendarZone::default()).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_course_on_date() {
        let tt = sample();

        // Monday of week 1: 军事理论 (periods 1-2) before 高等数学 (periods 3-5).
        let names: Vec<_> = tt
            .course_on_date(monday())
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["军事理论", "高等数学"]);

        // Monday of week 6: 高等数学 does not meet.
        let week6 = monday() + Duration::weeks(5);
        let names: Vec<_> = tt.course_on_date(week6).iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["军事理论"]);

        // Tuesday: nothing.
        assert!(tt.course_on_date(monday() + Duration::days(1)).is_empty());
    }

    #[test]
    fn test_course_on_date_outside_semester_is_empty() {
        let tt = sample();
        assert!(tt.course_on_date(tt.semester_start() - Duration::days(1)).is_empty());
        assert!(tt.course_on_date(tt.semester_end() + Duration::days(1)).is_empty());
    }

    #[test]
    fn test_courses_in_week_includes_all_week_courses() {
        let tt = sample();
        let names: Vec<_> = tt.courses_in_week(15).iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["大学英语", "军事理论", "生产实习"]);
    }

    #[test]
    fn test_find_one_day() {
        let tt = sample();
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let full = tt.find_one_day("2024.02.28", today).unwrap();
        assert_eq!(full.len(), 1);
        assert_eq!(full[0].name, "大学英语");

        let short = tt.find_one_day("2-28", today).unwrap();
        assert_eq!(short.len(), 1);

        assert!(tt.find_one_day("tomorrow", today).is_none());
        assert!(tt.find_one_day("2024-02-30", today).is_none());
    }

    #[test]
    fn test_parse_loose_date() {
        let expected = NaiveDate::from_ymd_opt(2024, 9, 2);
        assert_eq!(parse_loose_date("2024-09-02", 2000), expected);
        assert_eq!(parse_loose_date("2024/9/2", 2000), expected);
        assert_eq!(parse_loose_date("2024 09 02", 2000), expected);
        assert_eq!(parse_loose_date("9.2", 2024), expected);
        assert_eq!(parse_loose_date("2024-09", 2000), None);
        assert_eq!(parse_loose_date("1-2-3-4", 2000), None);
    }

    #[test]
    fn test_next_class() {
        let tt = sample();

        // Monday 09:00 of week 1: 军事理论 already started, 高等数学 is next.
        let now = monday().and_hms_opt(9, 0, 0).unwrap();
        let next = tt.next_class(now).unwrap();
        assert_eq!(next.date, monday());
        assert_eq!(next.course.name, "高等数学");

        // Monday evening: next is Wednesday's English class.
        let now = monday().and_hms_opt(20, 0, 0).unwrap();
        let next = tt.next_class(now).unwrap();
        assert_eq!(next.date, monday() + Duration::days(2));
        assert_eq!(next.course.name, "大学英语");

        // Before the semester the first class is on its first day.
        let before = (monday() - Duration::days(10)).and_hms_opt(12, 0, 0).unwrap();
        assert_eq!(tt.next_class(before).unwrap().date, monday());

        // After the last class there is nothing.
        let after = tt.semester_end().and_hms_opt(0, 0, 0).unwrap();
        assert!(tt.next_class(after).is_none());
    }

    #[test]
    fn test_export_round_trip() {
        let tt = sample();
        let export = tt.export_calendar();
        let text = String::from_utf8(export.ics.clone()).unwrap();

        assert_eq!(text.matches("BEGIN:VEVENT").count(), tt.events().len());
        assert!(text.contains("X-WR-CALNAME:2024年春季学期"));
        assert_eq!(
            crate::timetable::ics::from_data_uri(&export.share_text),
            Some(export.ics)
        );
    }
}
