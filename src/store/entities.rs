use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::policy::BreakPreset;

/// A closed focus or break interval. `duration` is the whole seconds between the ends, rounded
/// down, and is what every total is summed from.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TimePeriod {
    #[serde(with = "iso_millis")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "iso_millis")]
    pub end_time: DateTime<Utc>,
    pub duration: i64,
}

impl TimePeriod {
    /// Closes a period. Clock steps backwards produce an empty period rather than a negative one.
    pub fn close(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        let duration = (end_time - start_time).num_seconds().max(0);
        Self {
            start_time,
            end_time,
            duration,
        }
    }
}

/// One finished focus/break cycle. Built once by the timer at session end and never changed.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    #[serde(with = "iso_millis")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "iso_millis")]
    pub end_time: DateTime<Utc>,
    pub total_focus_time: i64,
    pub total_break_time: i64,
    pub focus_periods: Vec<TimePeriod>,
    pub break_periods: Vec<TimePeriod>,
}

#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Copy, Default)]
#[serde(rename_all = "camelCase")]
pub struct DayTotals {
    pub total_focus: i64,
    pub total_break: i64,
}

impl DayTotals {
    pub fn add(&mut self, session: &Session) {
        self.total_focus += session.total_focus_time;
        self.total_break += session.total_break_time;
    }
}

/// Totals keyed by [date_key](crate::utils::time::date_key) of each session's local start day.
pub type DailyTotals = BTreeMap<String, DayTotals>;

#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub break_preset: BreakPreset,
    #[serde(default = "enabled")]
    pub cues: bool,
}

fn enabled() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            break_preset: BreakPreset::default(),
            cues: true,
        }
    }
}

/// Timestamps are written as `2024-04-05T12:00:00.000Z` so exported files stay readable by
/// other tools. Any RFC 3339 string is accepted on read.
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|v| v.to_utc())
            .map_err(serde::de::Error::custom)
    }
}
