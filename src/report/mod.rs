//! Read-only views over stored sessions. Nothing here is cached, every call recomputes from
//! what it is given.

pub mod hourly;

use std::collections::BTreeMap;

use chrono::{NaiveDate, TimeZone};

use crate::{
    store::{
        entities::{DailyTotals, DayTotals, Session},
        totals_for,
    },
    utils::time::{date_key, local_date},
};

pub fn today_totals(daily_totals: &DailyTotals, today: NaiveDate) -> DayTotals {
    totals_for(daily_totals, &date_key(today))
}

/// Totals grouped by the local day each session started on. Unlike the persisted
/// [DailyTotals] these come straight from the sessions, so both can be compared.
pub fn per_day_totals<Tz: TimeZone>(
    sessions: &[Session],
    tz: &Tz,
) -> BTreeMap<NaiveDate, DayTotals> {
    let mut map = BTreeMap::<NaiveDate, DayTotals>::new();
    for v in sessions {
        map.entry(local_date(v.start_time, tz)).or_default().add(v);
    }
    map
}

/// Sessions that started on `date`, ordered by start time.
pub fn sessions_on<'a, Tz: TimeZone>(
    sessions: &'a [Session],
    date: NaiveDate,
    tz: &Tz,
) -> Vec<&'a Session> {
    let mut result = sessions
        .iter()
        .filter(|v| local_date(v.start_time, tz) == date)
        .collect::<Vec<_>>();
    result.sort_by_key(|v| v.start_time);
    result
}
