//! Calendar and time-of-day validation for transaction events

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

pub const MIN_YEAR: i64 = 1900;
pub const MAX_YEAR: i64 = 2100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("Missing required date field: {0}")]
    MissingField(&'static str),

    #[error("Invalid time format: {0}. Expected HH:MM:SS or HH:MM")]
    InvalidTime(String),

    #[error("Invalid year: {0}. Must be between 1900 and 2100")]
    InvalidYear(i64),

    #[error("Invalid month: {0}. Must be between 1 and 12")]
    InvalidMonth(i64),

    #[error("Invalid day: {0}. Must be between 1 and 31")]
    InvalidDay(i64),

    #[error("Invalid date combination: year={year}, month={month}, day={day}, time={time}")]
    InvalidDate {
        year: i64,
        month: i64,
        day: i64,
        time: String,
    },
}

/// Parse a time-of-day string with at least `HH:MM`.
///
/// Anything after the minute component is ignored; stored timestamps have
/// minute precision.
pub fn parse_time(raw: &str) -> Result<NaiveTime, ScheduleError> {
    let mut parts = raw.trim().split(':');
    let (hour, minute) = match (parts.next(), parts.next()) {
        (Some(h), Some(m)) => (h.trim(), m.trim()),
        _ => return Err(ScheduleError::InvalidTime(raw.to_string())),
    };

    let hour: u32 = hour
        .parse()
        .map_err(|_| ScheduleError::InvalidTime(raw.to_string()))?;
    let minute: u32 = minute
        .parse()
        .map_err(|_| ScheduleError::InvalidTime(raw.to_string()))?;

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| ScheduleError::InvalidTime(raw.to_string()))
}

/// Combine the calendar fields of an event into one timestamp.
///
/// Checks run in a fixed order: presence of every field, time format, year,
/// month, day, then whether the combination is a real calendar date.
pub fn combine(
    year: Option<i64>,
    month: Option<i64>,
    day: Option<i64>,
    time: Option<&str>,
) -> Result<NaiveDateTime, ScheduleError> {
    let year = year.ok_or(ScheduleError::MissingField("year"))?;
    let month = month.ok_or(ScheduleError::MissingField("month"))?;
    let day = day.ok_or(ScheduleError::MissingField("day"))?;
    let time_raw = time.ok_or(ScheduleError::MissingField("time"))?;

    let time = parse_time(time_raw)?;

    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(ScheduleError::InvalidYear(year));
    }
    if !(1..=12).contains(&month) {
        return Err(ScheduleError::InvalidMonth(month));
    }
    if !(1..=31).contains(&day) {
        return Err(ScheduleError::InvalidDay(day));
    }

    // Ranges above guarantee the casts are lossless
    let date = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32).ok_or_else(|| {
        ScheduleError::InvalidDate {
            year,
            month,
            day,
            time: time_raw.to_string(),
        }
    })?;

    Ok(date.and_time(time))
}
