use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::entities::{Session, TimePeriod};

use super::{
    cue::Cue,
    policy::{compute_break_duration, BreakPreset},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimerStatus {
    #[default]
    Stopped,
    Focus,
    Break,
}

/// Result of a single one-second tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Nothing is running.
    Idle,
    Counted,
    /// A capped break ran out and focus was resumed.
    Resumed,
}

/// In-progress session. Transitions take the current time explicitly so the machine stays free of
/// clocks and can be driven step by step. Calling a transition from the wrong status leaves the
/// state untouched.
#[derive(Debug, Clone, Default)]
pub struct TimerState {
    status: TimerStatus,
    focus_elapsed: u64,
    /// Elapsed seconds for open ended breaks, remaining seconds for capped ones.
    break_counter: u64,
    total_focus: u64,
    total_break: u64,
    session_start: Option<DateTime<Utc>>,
    period_start: Option<DateTime<Utc>>,
    focus_periods: Vec<TimePeriod>,
    break_periods: Vec<TimePeriod>,
    break_target: u64,
    /// Preset the current break was started with. Later settings changes apply from the next break.
    break_preset: BreakPreset,
}

impl TimerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn focus_elapsed(&self) -> u64 {
        self.focus_elapsed
    }

    pub fn break_counter(&self) -> u64 {
        self.break_counter
    }

    pub fn total_focus(&self) -> u64 {
        self.total_focus
    }

    pub fn total_break(&self) -> u64 {
        self.total_break
    }

    pub fn session_start(&self) -> Option<DateTime<Utc>> {
        self.session_start
    }

    pub fn period_start(&self) -> Option<DateTime<Utc>> {
        self.period_start
    }

    pub fn focus_periods(&self) -> &[TimePeriod] {
        &self.focus_periods
    }

    pub fn break_periods(&self) -> &[TimePeriod] {
        &self.break_periods
    }

    pub fn break_target(&self) -> u64 {
        self.break_target
    }

    pub fn is_counting_down(&self) -> bool {
        self.status == TimerStatus::Break && self.break_preset.is_capped()
    }

    /// Value of the live counter for the current status.
    pub fn display_seconds(&self) -> u64 {
        match self.status {
            TimerStatus::Stopped => 0,
            TimerStatus::Focus => self.focus_elapsed,
            TimerStatus::Break => self.break_counter,
        }
    }

    pub fn start_session(&mut self, now: DateTime<Utc>) -> Option<Cue> {
        if self.status != TimerStatus::Stopped {
            return None;
        }
        *self = Self {
            status: TimerStatus::Focus,
            session_start: Some(now),
            period_start: Some(now),
            ..Self::default()
        };
        Some(Cue::FocusStart)
    }

    pub fn start_break(&mut self, now: DateTime<Utc>, preset: BreakPreset) -> Option<Cue> {
        if self.status != TimerStatus::Focus {
            return None;
        }
        let last_focus = self.close_period(now).map_or(0, |v| v.duration.max(0) as u64);
        self.focus_elapsed = 0;

        let target = compute_break_duration(preset, last_focus);
        self.break_target = target;
        self.break_preset = preset;
        self.break_counter = if preset.is_capped() { target } else { 0 };
        self.status = TimerStatus::Break;
        self.period_start = Some(now);
        Some(Cue::BreakStart)
    }

    pub fn resume_focus(&mut self, now: DateTime<Utc>) -> Option<Cue> {
        if self.status != TimerStatus::Break {
            return None;
        }
        self.close_period(now);
        self.break_counter = 0;
        self.status = TimerStatus::Focus;
        self.period_start = Some(now);
        Some(Cue::FocusStart)
    }

    /// Closes the open period and assembles the finished session. The state is reset in every
    /// case; there is no session when nothing was running.
    pub fn end_session(&mut self, now: DateTime<Utc>, id: String) -> Option<Session> {
        let session = match (self.status, self.session_start) {
            (TimerStatus::Stopped, _) | (_, None) => None,
            (_, Some(start_time)) => {
                self.close_period(now);
                let focus_periods = std::mem::take(&mut self.focus_periods);
                let break_periods = std::mem::take(&mut self.break_periods);
                Some(Session {
                    id,
                    start_time,
                    end_time: now,
                    total_focus_time: focus_periods.iter().map(|v| v.duration).sum(),
                    total_break_time: break_periods.iter().map(|v| v.duration).sum(),
                    focus_periods,
                    break_periods,
                })
            }
        };
        *self = Self::default();
        session
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> Tick {
        match self.status {
            TimerStatus::Stopped => Tick::Idle,
            TimerStatus::Focus => {
                self.focus_elapsed += 1;
                self.total_focus += 1;
                Tick::Counted
            }
            TimerStatus::Break if !self.break_preset.is_capped() => {
                self.break_counter += 1;
                self.total_break += 1;
                Tick::Counted
            }
            TimerStatus::Break => {
                if self.break_counter > 0 {
                    self.break_counter -= 1;
                    self.total_break += 1;
                }
                if self.break_counter == 0 {
                    self.resume_focus(now);
                    Tick::Resumed
                } else {
                    Tick::Counted
                }
            }
        }
    }

    fn close_period(&mut self, now: DateTime<Utc>) -> Option<TimePeriod> {
        let start = self.period_start.take()?;
        let period = TimePeriod::close(start, now);
        match self.status {
            TimerStatus::Focus => self.focus_periods.push(period.clone()),
            TimerStatus::Break => self.break_periods.push(period.clone()),
            TimerStatus::Stopped => return None,
        }
        Some(period)
    }
}
