//! Order timestamps
//!
//! Orders carry civil date-times at minute resolution, written as `dd/mm/yyyy hh:mm`.

use jiff::civil::{Date, DateTime, Time};

use crate::orders::ValidationError;

/// Date format used by the order files.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Time format used by the order files.
pub const TIME_FORMAT: &str = "%H:%M";

/// Combined date and time format.
pub const DATE_TIME_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Drop seconds and anything finer.
pub fn to_minute(value: DateTime) -> DateTime {
    value.date().at(value.hour(), value.minute(), 0, 0)
}

/// Parse `dd/mm/yyyy hh:mm`.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidDateTime`] if the input does not match the format.
pub fn parse_date_time(value: &str) -> Result<DateTime, ValidationError> {
    DateTime::strptime(DATE_TIME_FORMAT, value.trim())
        .map_err(|_err| ValidationError::InvalidDateTime(value.to_string()))
}

/// Parse a date (`dd/mm/yyyy`) and a time (`hh:mm`) given separately.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidDateTime`] if either part does not match its format.
pub fn parse_date_and_time(date: &str, time: &str) -> Result<DateTime, ValidationError> {
    let invalid = || ValidationError::InvalidDateTime(format!("{date} {time}"));

    let date = Date::strptime(DATE_FORMAT, date.trim()).map_err(|_err| invalid())?;
    let time = Time::strptime(TIME_FORMAT, time.trim()).map_err(|_err| invalid())?;

    Ok(date.to_datetime(time))
}

/// Parse `hh:mm`.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidTime`] if the input does not match the format.
pub fn parse_time(value: &str) -> Result<Time, ValidationError> {
    Time::strptime(TIME_FORMAT, value.trim())
        .map_err(|_err| ValidationError::InvalidTime(value.to_string()))
}

/// Format as `dd/mm/yyyy hh:mm`.
pub fn format_date_time(value: DateTime) -> String {
    value.strftime(DATE_TIME_FORMAT).to_string()
}

/// Format the date part as `dd/mm/yyyy`.
pub fn format_date(value: DateTime) -> String {
    value.strftime(DATE_FORMAT).to_string()
}

/// Format the time part as `hh:mm`.
pub fn format_time(value: DateTime) -> String {
    value.strftime(TIME_FORMAT).to_string()
}
