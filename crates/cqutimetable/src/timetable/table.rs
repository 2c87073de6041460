//! The raw table handed to the builder, and decoding it from spreadsheet bytes.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use tracing::debug;

use super::error::{Result, TimetableError};

/// Title cell (or sheet name) identifying a timetable export.
pub const TIMETABLE_MARKER: &str = "课表";

/// Column headers of a timetable export, in order.
pub const EXPECTED_COLUMNS: [&str; 5] =
    ["课程名称", "教学班号", "上课时间", "上课地点", "上课教师"];

/// A decoded worksheet: the title row plus every row below it as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceTable {
    pub sheet_name: String,
    /// First row of the sheet, which carries the marker.
    pub title_row: Vec<String>,
    /// Remaining rows, starting with the column headers. Rows may be ragged.
    pub rows: Vec<Vec<String>>,
}

impl SourceTable {
    pub fn new(
        sheet_name: impl Into<String>,
        title_row: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            title_row,
            rows,
        }
    }

    /// Reads the first worksheet of an xlsx, xls or ods file.
    ///
    /// Bytes that are not a readable workbook give
    /// [`TimetableError::CorruptArchive`]; a workbook without a sheet gives a
    /// format error.
    pub fn from_spreadsheet_bytes(bytes: &[u8]) -> Result<Self> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| TimetableError::format("workbook has no worksheets"))?;
        let range = workbook.worksheet_range(&sheet_name)?;

        let mut rows = range
            .rows()
            .map(|row| row.iter().map(cell_to_text).collect::<Vec<_>>());
        let title_row = rows.next().unwrap_or_default();
        let rows: Vec<_> = rows.collect();

        debug!(
            sheet = %sheet_name,
            rows = rows.len(),
            "Decoded worksheet"
        );

        Ok(SourceTable::new(sheet_name, title_row, rows))
    }

    /// Returns true if the marker appears in the title row or as the sheet name.
    pub fn has_marker(&self) -> bool {
        self.sheet_name.trim() == TIMETABLE_MARKER
            || self
                .title_row
                .iter()
                .any(|cell| cell.trim() == TIMETABLE_MARKER)
    }

    /// Returns true if the first row below the title is exactly the expected
    /// column headers.
    pub fn has_expected_columns(&self) -> bool {
        self.rows
            .first()
            .is_some_and(|header| header.iter().map(String::as_str).eq(EXPECTED_COLUMNS))
    }
}

/// Coerces a cell to text. Empty cells become empty strings and whole-number
/// floats lose their fractional part.
fn cell_to_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_garbage_bytes_are_corrupt() {
        let err = SourceTable::from_spreadsheet_bytes(b"definitely not a workbook").unwrap_err();
        assert!(matches!(err, TimetableError::CorruptArchive { .. }));
    }

    #[test]
    fn test_empty_bytes_are_corrupt() {
        let err = SourceTable::from_spreadsheet_bytes(&[]).unwrap_err();
        assert!(matches!(err, TimetableError::CorruptArchive { .. }));
    }

    #[test]
    fn test_marker_in_title_row_or_sheet_name() {
        let titled = SourceTable::new("Sheet1", strings(&["课表", "", "", "", ""]), vec![]);
        assert!(titled.has_marker());

        let named = SourceTable::new("课表", strings(&["2024 春季"]), vec![]);
        assert!(named.has_marker());

        let neither = SourceTable::new("Sheet1", strings(&["成绩单"]), vec![]);
        assert!(!neither.has_marker());
    }

    #[test]
    fn test_expected_columns_must_match_exactly() {
        let good = SourceTable::new("课表", vec![], vec![strings(&EXPECTED_COLUMNS)]);
        assert!(good.has_expected_columns());

        let reordered = SourceTable::new(
            "课表",
            vec![],
            vec![strings(&["教学班号", "课程名称", "上课时间", "上课地点", "上课教师"])],
        );
        assert!(!reordered.has_expected_columns());

        let extra = SourceTable::new(
            "课表",
            vec![],
            vec![strings(&["课程名称", "教学班号", "上课时间", "上课地点", "上课教师", "备注"])],
        );
        assert!(!extra.has_expected_columns());

        assert!(!SourceTable::default().has_expected_columns());
    }

    #[test]
    fn test_cell_coercion() {
        assert_eq!(cell_to_text(&Data::Empty), "");
        assert_eq!(cell_to_text(&Data::String("D1234".into())), "D1234");
        assert_eq!(cell_to_text(&Data::Float(20240001.0)), "20240001");
        assert_eq!(cell_to_text(&Data::Int(42)), "42");
    }
}
