//! Error types for timetable import and export.

use thiserror::Error;

/// Errors that can occur while turning a schedule export into a timetable.
///
/// Every variant is fatal to the import: there is no partial timetable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimetableError {
    /// The table is missing its marker or header row, or a time description
    /// does not match the grammar.
    #[error("Format error: {message}")]
    Format { message: String },

    /// The semester start date is malformed or not a Monday.
    #[error("Date error: {message}")]
    Date { message: String },

    /// The uploaded bytes are not a readable spreadsheet.
    #[error("Corrupt file: {message}")]
    CorruptArchive { message: String },

    /// A period index has no configured start time.
    #[error("No start time configured for period {period}")]
    Lookup { period: u32 },
}

impl TimetableError {
    pub(crate) fn format(message: impl Into<String>) -> Self {
        TimetableError::Format {
            message: message.into(),
        }
    }

    pub(crate) fn date(message: impl Into<String>) -> Self {
        TimetableError::Date {
            message: message.into(),
        }
    }

    /// Returns true if the failure was caused by the uploaded content rather
    /// than by server configuration.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, TimetableError::Lookup { .. })
    }
}

impl From<calamine::Error> for TimetableError {
    fn from(err: calamine::Error) -> Self {
        TimetableError::CorruptArchive {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TimetableError>;
