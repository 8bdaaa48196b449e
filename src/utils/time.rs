use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone};

/// File name of the day file collecting sessions started on `date`.
pub fn date_to_record_name(date: NaiveDate) -> String {
    format!("{}", date.format("%Y-%m-%d"))
}

/// Midnight following `date`, used for exclusive range ends.
pub fn next_day_start<Tz: TimeZone>(date: DateTime<Tz>) -> DateTime<Tz> {
    (date + Duration::days(1))
        .with_time(NaiveTime::MIN)
        .unwrap()
}
