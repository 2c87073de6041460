//! Converts a class-schedule spreadsheet export into an iCalendar timetable.
//!
//! The core lives in [`timetable`]; [`server`] exposes it over HTTP.

pub mod config;
pub mod server;
pub mod timetable;
pub mod types;
