//! CSV interchange of sessions. A [SessionRecord] is one row in its raw textual form; it only
//! becomes a [Session] after every column validates.

pub mod csv;

use anyhow::{anyhow, ensure, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;

use crate::store::entities::{Session, TimePeriod};

pub const HEADERS: [&str; 7] = [
    "id",
    "startTime",
    "endTime",
    "totalFocusTime",
    "totalBreakTime",
    "focusPeriods",
    "breakPeriods",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: String,
    pub start_time: String,
    pub end_time: String,
    pub total_focus_time: String,
    pub total_break_time: String,
    pub focus_periods: String,
    pub break_periods: String,
}

impl SessionRecord {
    pub fn from_session(session: &Session) -> Result<Self> {
        Ok(Self {
            id: session.id.clone(),
            start_time: session
                .start_time
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            end_time: session.end_time.to_rfc3339_opts(SecondsFormat::Millis, true),
            total_focus_time: session.total_focus_time.to_string(),
            total_break_time: session.total_break_time.to_string(),
            focus_periods: serde_json::to_string(&session.focus_periods)?,
            break_periods: serde_json::to_string(&session.break_periods)?,
        })
    }

    /// Columns in [HEADERS] order.
    pub fn fields(&self) -> [&str; 7] {
        [
            self.id.as_str(),
            self.start_time.as_str(),
            self.end_time.as_str(),
            self.total_focus_time.as_str(),
            self.total_break_time.as_str(),
            self.focus_periods.as_str(),
            self.break_periods.as_str(),
        ]
    }

    /// Fills a record from a row using the header names. Unknown columns are ignored and
    /// missing ones stay empty, which [SessionRecord::into_session] rejects.
    pub fn from_columns<'a>(
        headers: &[String],
        values: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut record = Self::default();
        for (header, value) in headers.iter().zip(values) {
            let slot = match header.as_str() {
                "id" => &mut record.id,
                "startTime" => &mut record.start_time,
                "endTime" => &mut record.end_time,
                "totalFocusTime" => &mut record.total_focus_time,
                "totalBreakTime" => &mut record.total_break_time,
                "focusPeriods" => &mut record.focus_periods,
                "breakPeriods" => &mut record.break_periods,
                _ => continue,
            };
            *slot = value.to_string();
        }
        record
    }

    pub fn into_session(self) -> Result<Session> {
        ensure!(!self.id.is_empty(), "Missing id");
        Ok(Session {
            start_time: parse_time(&self.start_time).context("Invalid startTime")?,
            end_time: parse_time(&self.end_time).context("Invalid endTime")?,
            total_focus_time: self
                .total_focus_time
                .parse()
                .with_context(|| format!("Invalid totalFocusTime {:?}", self.total_focus_time))?,
            total_break_time: self
                .total_break_time
                .parse()
                .with_context(|| format!("Invalid totalBreakTime {:?}", self.total_break_time))?,
            focus_periods: parse_periods(&self.focus_periods).context("Invalid focusPeriods")?,
            break_periods: parse_periods(&self.break_periods).context("Invalid breakPeriods")?,
            id: self.id,
        })
    }
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    if value.is_empty() {
        return Err(anyhow!("Empty timestamp"));
    }
    Ok(DateTime::parse_from_rfc3339(value)?.to_utc())
}

fn parse_periods(value: &str) -> Result<Vec<TimePeriod>> {
    Ok(serde_json::from_str(value)?)
}

/// Converts records to sessions, dropping the ones that don't validate.
pub fn valid_sessions(records: Vec<SessionRecord>) -> Vec<Session> {
    records
        .into_iter()
        .filter_map(|v| {
            let id = v.id.clone();
            match v.into_session() {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!("Dropping invalid session row {id:?}: {e:#}");
                    None
                }
            }
        })
        .collect()
}
