use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

/// The standard way of turning a date into the backup file name.
pub fn date_to_backup_name(date: NaiveDate) -> String {
    format!("dailyfocus_backup_{}.json", date.format("%Y-%m-%d"))
}

/// Returns start of the next day.
pub fn next_day_start<Tz: TimeZone>(date: DateTime<Tz>) -> DateTime<Tz> {
    let next = date + Duration::days(1);
    next.clone().with_time(NaiveTime::MIN).earliest().unwrap_or(next)
}

/// Creation stamps are persisted with millisecond precision. Truncating up front keeps the in
/// memory value equal to what a reload produces.
pub fn truncate_to_millis(moment: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(moment.timestamp_millis()).unwrap_or(moment)
}
