//! Turning a class-schedule export into dated calendar events.
//!
//! The pipeline is: spreadsheet bytes → [`SourceTable`] → [`Timetable`]
//! (one [`Course`] per row, expanded into [`CalendarEvent`]s) →
//! [`CalendarExport`].
mod builder;
mod course;
mod error;
mod ics;
mod settings;
mod table;

pub use builder::{parse_loose_date, parse_semester_start, Timetable, UpcomingClass};
pub use course::{
    parse_range_list, parse_time_description, Course, Schedule, Slot, MAX_WEEK,
};
pub use error::{Result, TimetableError};
pub use ics::{from_data_uri, to_data_uri, CalendarEvent, CalendarExport, DATA_URI_PREFIX};
pub use settings::{CalendarZone, PeriodClock, TimetableSettings};
pub use table::{SourceTable, EXPECTED_COLUMNS, TIMETABLE_MARKER};

use tracing::info;

/// Decodes an uploaded spreadsheet and builds its timetable.
///
/// # Arguments
/// * `bytes` - The raw upload
/// * `semester_start` - First day of the semester, `YYYY-MM-DD`, a Monday
/// * `settings` - Period table and calendar zone
///
/// # Returns
/// * `Ok(Timetable)` - The parsed timetable with its events
/// * `Err(TimetableError)` - If the file, its layout or the date is invalid
pub fn import_spreadsheet(
    bytes: &[u8],
    semester_start: &str,
    settings: &TimetableSettings,
) -> Result<Timetable> {
    let semester_start = parse_semester_start(semester_start)?;
    let table = SourceTable::from_spreadsheet_bytes(bytes)?;

    info!(
        sheet = %table.sheet_name,
        rows = table.rows.len(),
        "Importing timetable"
    );

    Timetable::build(&table, semester_start, settings)
}
