//! iCalendar (RFC 5545) serialization of the expanded events, and the
//! shareable `data:` URI built from it.

use chrono::{DateTime, FixedOffset, Utc};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use super::settings::CalendarZone;

/// Prefix of the shareable calendar URI.
pub const DATA_URI_PREFIX: &str = "data:text/calendar,";

const PRODID: &str = "-//cqutimetable//Timetable Export//ZH";

/// Longest content line in octets, excluding the CRLF.
const MAX_LINE_OCTETS: usize = 75;

/// Everything except unreserved characters and `/` is escaped.
const URI_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// One concrete class meeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub summary: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub location: String,
    pub description: String,
    /// Semester week the meeting falls in.
    pub week: u32,
}

/// The two forms of an exported timetable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarExport {
    /// The iCalendar document.
    pub ics: Vec<u8>,
    /// `data:text/calendar,` followed by the percent-encoded document.
    pub share_text: String,
}

impl CalendarExport {
    pub fn new(ics: Vec<u8>) -> Self {
        let share_text = to_data_uri(&ics);
        Self { ics, share_text }
    }
}

/// Calendar-level properties written around the events.
pub struct CalendarHeader<'a> {
    pub name: &'a str,
    pub zone: &'a CalendarZone,
    pub created_at: DateTime<Utc>,
}

/// Writes `events` as an iCalendar document with CRLF line endings.
pub fn write_calendar(header: &CalendarHeader<'_>, events: &[CalendarEvent]) -> String {
    let mut out = String::new();
    let tzid = escape_param(&header.zone.tzid);
    let stamp = header.created_at.format("%Y%m%dT%H%M%SZ").to_string();

    push_line(&mut out, "BEGIN:VCALENDAR");
    push_line(&mut out, "VERSION:2.0");
    push_line(&mut out, &format!("PRODID:{PRODID}"));
    push_line(&mut out, "CALSCALE:GREGORIAN");
    push_line(&mut out, "METHOD:PUBLISH");
    push_line(&mut out, &format!("X-WR-CALNAME:{}", escape_text(header.name)));
    push_line(&mut out, &format!("X-WR-TIMEZONE:{tzid}"));

    let offset = format_offset(header.zone.offset);
    push_line(&mut out, "BEGIN:VTIMEZONE");
    push_line(&mut out, &format!("TZID:{tzid}"));
    push_line(&mut out, "BEGIN:STANDARD");
    push_line(&mut out, "DTSTART:19700101T000000");
    push_line(&mut out, &format!("TZOFFSETFROM:{offset}"));
    push_line(&mut out, &format!("TZOFFSETTO:{offset}"));
    push_line(&mut out, "END:STANDARD");
    push_line(&mut out, "END:VTIMEZONE");

    for (index, event) in events.iter().enumerate() {
        push_line(&mut out, "BEGIN:VEVENT");
        push_line(
            &mut out,
            &format!(
                "UID:{}-{}-w{}@cqutimetable",
                header.created_at.timestamp_millis(),
                index,
                event.week
            ),
        );
        push_line(&mut out, &format!("DTSTAMP:{stamp}"));
        push_line(
            &mut out,
            &format!("DTSTART;TZID={tzid}:{}", event.start.format("%Y%m%dT%H%M%S")),
        );
        push_line(
            &mut out,
            &format!("DTEND;TZID={tzid}:{}", event.end.format("%Y%m%dT%H%M%S")),
        );
        push_line(&mut out, &format!("SUMMARY:{}", escape_text(&event.summary)));
        if !event.location.is_empty() {
            push_line(&mut out, &format!("LOCATION:{}", escape_text(&event.location)));
        }
        if !event.description.is_empty() {
            push_line(
                &mut out,
                &format!("DESCRIPTION:{}", escape_text(&event.description)),
            );
        }
        push_line(&mut out, "END:VEVENT");
    }

    push_line(&mut out, "END:VCALENDAR");
    out
}

/// Appends a content line, folded at 75 octets without splitting a character.
fn push_line(out: &mut String, line: &str) {
    let mut width = 0;
    for ch in line.chars() {
        let len = ch.len_utf8();
        // Continuation lines start with a space, which counts toward the limit.
        if width + len > MAX_LINE_OCTETS {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(ch);
        width += len;
    }
    out.push_str("\r\n");
}

/// Escapes a TEXT property value.
fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Quotes a parameter value if it contains characters that need it.
fn escape_param(value: &str) -> String {
    if value.contains([':', ';', ',']) {
        format!("\"{}\"", value.replace('"', ""))
    } else {
        value.to_string()
    }
}

/// Formats a UTC offset as `+hhmm`.
fn format_offset(offset: FixedOffset) -> String {
    let secs = offset.local_minus_utc();
    let sign = if secs < 0 { '-' } else { '+' };
    let secs = secs.abs();
    format!("{}{:02}{:02}", sign, secs / 3600, (secs % 3600) / 60)
}

/// Percent-encodes `ics` into a `data:text/calendar,` URI.
pub fn to_data_uri(ics: &[u8]) -> String {
    let text = String::from_utf8_lossy(ics);
    format!("{}{}", DATA_URI_PREFIX, utf8_percent_encode(&text, URI_ESCAPE))
}

/// Recovers the document bytes from a URI produced by [`to_data_uri`].
///
/// Returns `None` if the prefix is missing.
pub fn from_data_uri(uri: &str) -> Option<Vec<u8>> {
    uri.strip_prefix(DATA_URI_PREFIX)
        .map(|payload| percent_decode_str(payload).collect())
}
