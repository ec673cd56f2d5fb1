use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike, Utc};

/// This is the standard way of converting a date to a string in flowtimer. Daily totals are keyed
/// with it.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Calendar day of `time` as seen in `tz`.
pub fn local_date<Tz: TimeZone>(time: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    time.with_timezone(tz).date_naive()
}

/// First instant of the wall-clock hour following `time` in `tz`.
pub fn next_hour_start<Tz: TimeZone>(time: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    let local = time.with_timezone(tz);
    let into_hour = Duration::minutes(local.minute() as i64)
        + Duration::seconds(local.second() as i64)
        + Duration::nanoseconds(local.nanosecond() as i64);
    time + (Duration::hours(1) - into_hour)
}

/// Live counter format, `HH:MM:SS`.
pub fn format_clock(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

pub fn format_duration(v: Duration) -> String {
    if v.num_hours() > 0 {
        format!(
            "{}h{}m{}s",
            v.num_hours(),
            v.num_minutes() % 60,
            v.num_seconds() % 60
        )
    } else if v.num_minutes() > 0 {
        format!("{}m{}s", v.num_minutes() % 60, v.num_seconds() % 60)
    } else {
        format!("{}s", v.num_seconds() % 60)
    }
}
