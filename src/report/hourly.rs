use chrono::{DateTime, TimeZone, Timelike, Utc};

use crate::{
    store::entities::{Session, TimePeriod},
    utils::time::next_hour_start,
};

/// Minutes spent in one wall-clock hour of the day.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HourUsage {
    pub focus: f64,
    pub break_: f64,
}

/// Focus and break minutes per local hour of the day, summed over every period of `sessions`.
/// Periods spanning an hour boundary are split so each slice lands in its own hour.
pub fn hourly_distribution<Tz: TimeZone>(sessions: &[Session], tz: &Tz) -> [HourUsage; 24] {
    let mut hours = [HourUsage::default(); 24];
    for session in sessions {
        for period in &session.focus_periods {
            for_each_hour_slice(period, tz, |hour, minutes| hours[hour].focus += minutes);
        }
        for period in &session.break_periods {
            for_each_hour_slice(period, tz, |hour, minutes| hours[hour].break_ += minutes);
        }
    }
    hours
}

fn for_each_hour_slice<Tz: TimeZone>(
    period: &TimePeriod,
    tz: &Tz,
    mut apply: impl FnMut(usize, f64),
) {
    let mut start = period.start_time;
    while start < period.end_time {
        let end = next_hour_start(start, tz).min(period.end_time);
        apply(local_hour(start, tz), minutes_between(start, end));
        start = end;
    }
}

fn local_hour<Tz: TimeZone>(time: DateTime<Utc>, tz: &Tz) -> usize {
    time.with_timezone(tz).hour() as usize
}

fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 60_000.
}
