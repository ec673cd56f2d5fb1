use std::{collections::BTreeMap, fmt::Display, path::Path};

use ansi_term::{Colour, Style};
use anyhow::Result;
use chrono::{DateTime, Duration, Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};
use now::DateTimeNow;

use crate::{
    report::{hourly::hourly_distribution, per_day_totals, sessions_on, today_totals},
    store::{
        entities::{DayTotals, Session},
        SessionStore,
    },
    utils::time::format_duration,
};

use super::{open_storage, Args};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct HistoryCommand {
    #[arg(
        long = "start",
        short,
        help = "First day of the range. Examples are \"yesterday\", \"2 weeks ago\", \"15/03/2025\". Defaults to a week ago"
    )]
    start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "Last day of the range, included. Same formats as --start. Defaults to today"
    )]
    end_date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(long, help = "Only print per day totals, without individual sessions")]
    summary: bool,
}

#[derive(Debug, Parser)]
pub struct HourlyCommand {
    #[arg(
        long = "date",
        short,
        help = "Day to show. Examples are \"yesterday\", \"15/03/2025\". Defaults to today"
    )]
    date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

const DEFAULT_HISTORY_DAYS: i64 = 7;

const BAR_WIDTH: f64 = 30.;

pub async fn process_today_command(dir: &Path) -> Result<()> {
    let store = SessionStore::load(open_storage(dir)?).await;
    let today = today_totals(store.daily_totals(), Local::now().date_naive());
    println!(
        "{}\t{}",
        Colour::Green.paint("Focus"),
        format_duration(Duration::seconds(today.total_focus))
    );
    println!(
        "{}\t{}",
        Colour::Cyan.paint("Break"),
        format_duration(Duration::seconds(today.total_break))
    );
    Ok(())
}

/// Days between `start_date` and `end_date` with their totals and, unless `summary` is set, the
/// sessions of each day.
pub async fn process_history_command(
    HistoryCommand {
        start_date,
        end_date,
        date_style,
        summary,
    }: HistoryCommand,
    dir: &Path,
) -> Result<()> {
    let now = Local::now();
    let dialect = date_style.into();
    let start = parse_day(start_date, now, dialect, "start")?
        .unwrap_or_else(|| (now - Duration::days(DEFAULT_HISTORY_DAYS - 1)).date_naive());
    let end = parse_day(end_date, now, dialect, "end")?.unwrap_or_else(|| now.date_naive());
    if end < start {
        return Err(validation_error(format!(
            "Range end {end} is before its start {start}"
        )));
    }

    let store = SessionStore::load(open_storage(dir)?).await;
    let days = per_day_totals(store.sessions(), store.timezone());

    let mut total = Duration::zero();
    for (day, totals) in newest_first(&days, start, end) {
        total += Duration::seconds(totals.total_focus);
        println!(
            "{}\t{} focus\t{} break",
            Style::new().bold().paint(day.format("%x").to_string()),
            format_duration(Duration::seconds(totals.total_focus)),
            format_duration(Duration::seconds(totals.total_break)),
        );
        if !summary {
            for session in sessions_on(store.sessions(), *day, store.timezone()) {
                println!("  {}", describe_session(session));
            }
        }
    }
    println!("Focused {} from {start} to {end}", format_duration(total));
    Ok(())
}

pub async fn process_hourly_command(
    HourlyCommand { date, date_style }: HourlyCommand,
    dir: &Path,
) -> Result<()> {
    let now = Local::now();
    let day = parse_day(date, now, date_style.into(), "date")?.unwrap_or_else(|| now.date_naive());

    let store = SessionStore::load(open_storage(dir)?).await;
    let sessions = sessions_on(store.sessions(), day, store.timezone())
        .into_iter()
        .cloned()
        .collect::<Vec<_>>();
    let hours = hourly_distribution(&sessions, store.timezone());

    println!("{}", Style::new().bold().paint(day.format("%x").to_string()));
    for (hour, usage) in hours.iter().enumerate() {
        if usage.focus == 0. && usage.break_ == 0. {
            continue;
        }
        let focus_bar = "#".repeat((usage.focus / 60. * BAR_WIDTH).round() as usize);
        let break_bar = "-".repeat((usage.break_ / 60. * BAR_WIDTH).round() as usize);
        println!(
            "{hour:02}:00\t{:>5.1}m focus\t{:>5.1}m break\t{}{}",
            usage.focus,
            usage.break_,
            Colour::Green.paint(focus_bar),
            Colour::Cyan.paint(break_bar),
        );
    }
    Ok(())
}

fn newest_first(
    days: &BTreeMap<NaiveDate, DayTotals>,
    start: NaiveDate,
    end: NaiveDate,
) -> impl Iterator<Item = (&NaiveDate, &DayTotals)> {
    days.range(start..=end).rev()
}

fn describe_session(session: &Session) -> String {
    format!(
        "{} - {}\t{} focus\t{} break\t{} focus periods",
        session.start_time.with_timezone(&Local).format("%H:%M:%S"),
        session.end_time.with_timezone(&Local).format("%H:%M:%S"),
        format_duration(Duration::seconds(session.total_focus_time)),
        format_duration(Duration::seconds(session.total_break_time)),
        session.focus_periods.len(),
    )
}

/// Parses a human readable date into the local day it falls on.
fn parse_day(
    value: Option<String>,
    now: DateTime<Local>,
    dialect: chrono_english::Dialect,
    name: &str,
) -> Result<Option<NaiveDate>> {
    match value.map(|s| parse_date_string(&s, now, dialect)) {
        Some(Ok(v)) => Ok(Some(v.with_timezone(&Local).beginning_of_day().date_naive())),
        Some(Err(e)) => Err(validation_error(format!("Failed to validate {name} {e}"))),
        None => Ok(None),
    }
}

fn validation_error(message: String) -> anyhow::Error {
    Args::command()
        .error(clap::error::ErrorKind::ValueValidation, message)
        .into()
}
