//! Year-scoped ticket number generation, format `TKT-{year}-{seq:04}`.
//!
//! The format is part of the public contract (lookup-by-number, search), so
//! the literal shape lives here and nowhere else. Allocation itself happens
//! in the engine: highest existing sequence for the year, plus one, with the
//! unique constraint on `ticket_number` as the backstop under races.

use chrono::{Datelike, Utc};

pub const TICKET_NUMBER_PREFIX: &str = "TKT";

/// Sequences are fixed at four digits; past this the year is exhausted.
pub const MAX_SEQUENCE: u32 = 9999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("ticket number sequence exhausted for the year (max {MAX_SEQUENCE})")]
pub struct SequenceOverflow;

pub fn current_year() -> i32 {
    Utc::now().year()
}

/// Prefix shared by every ticket number of a given year, `TKT-2025-`.
pub fn year_prefix(year: i32) -> String {
    format!("{TICKET_NUMBER_PREFIX}-{year}-")
}

pub fn format_ticket_number(year: i32, sequence: u32) -> String {
    format!("{TICKET_NUMBER_PREFIX}-{year}-{sequence:04}")
}

/// Numeric suffix of a well-formed ticket number, `None` otherwise.
pub fn sequence_of(ticket_number: &str) -> Option<u32> {
    ticket_number.rsplit('-').next()?.parse().ok()
}

/// Next free sequence after the highest allocated one. Sequence 1 for a
/// fresh year; an explicit error past 9999, never a wrap or a fifth digit.
pub fn next_sequence(last: Option<u32>) -> Result<u32, SequenceOverflow> {
    let next = last.map_or(1, |seq| seq.saturating_add(1));
    if next > MAX_SEQUENCE {
        return Err(SequenceOverflow);
    }
    Ok(next)
}
