//! Finished sessions and their per-day totals.
//!  - [SessionStore] owns both collections in memory and is the only thing that changes them.
//!  - Every change is written through a [storage::Storage] on a best-effort basis: the in-memory
//!    state is updated first and write failures are only logged.
//!  - Daily totals are maintained incrementally, one session at a time.

pub mod entities;
pub mod storage;

use std::{collections::HashSet, future::Future};

use chrono::{Local, TimeZone};
use entities::{DailyTotals, DayTotals, Session};
use storage::Storage;
use tracing::{error, info, warn};

use crate::utils::time::{date_key, local_date};

/// Receives every session the timer finishes, exactly once.
pub trait SessionSink {
    fn session_ended(&mut self, session: Session) -> impl Future<Output = ()>;
}

pub struct SessionStore<S, Tz: TimeZone = Local> {
    storage: S,
    timezone: Tz,
    sessions: Vec<Session>,
    daily_totals: DailyTotals,
}

impl<S: Storage> SessionStore<S, Local> {
    pub async fn load(storage: S) -> Self {
        Self::load_in(storage, Local).await
    }
}

impl<S: Storage, Tz: TimeZone> SessionStore<S, Tz> {
    /// Loads persisted state. Anything that can't be read starts out empty.
    pub async fn load_in(storage: S, timezone: Tz) -> Self {
        let sessions = storage.load_sessions().await.unwrap_or_else(|e| {
            error!("Failed to load sessions, starting empty {e:?}");
            vec![]
        });
        let daily_totals = storage.load_daily_totals().await.unwrap_or_else(|e| {
            error!("Failed to load daily totals, starting empty {e:?}");
            DailyTotals::new()
        });
        info!(
            "Loaded {} sessions over {} days",
            sessions.len(),
            daily_totals.len()
        );
        Self {
            storage,
            timezone,
            sessions,
            daily_totals,
        }
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn daily_totals(&self) -> &DailyTotals {
        &self.daily_totals
    }

    pub fn timezone(&self) -> &Tz {
        &self.timezone
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub async fn on_session_ended(&mut self, session: Session) {
        info!(
            "Session {} ended with {}s focus and {}s break",
            session.id, session.total_focus_time, session.total_break_time
        );
        self.add_to_totals(&session);
        self.sessions.push(session);
        let appended = self.sessions.len() - 1;
        self.persist(appended).await;
    }

    /// Merges sessions from elsewhere. Ids that are already stored, or repeated within
    /// `candidates`, are skipped; the first occurrence wins. Returns how many were added.
    pub async fn import_sessions(&mut self, candidates: Vec<Session>) -> usize {
        let mut known = self
            .sessions
            .iter()
            .map(|v| v.id.clone())
            .collect::<HashSet<_>>();
        let first_new = self.sessions.len();

        for session in candidates {
            if !known.insert(session.id.clone()) {
                warn!("Skipping already stored session {}", session.id);
                continue;
            }
            self.add_to_totals(&session);
            self.sessions.push(session);
        }

        let added = self.sessions.len() - first_new;
        info!("Imported {added} sessions");
        if added > 0 {
            self.persist(first_new).await;
        }
        added
    }

    fn add_to_totals(&mut self, session: &Session) {
        let key = date_key(local_date(session.start_time, &self.timezone));
        self.daily_totals.entry(key).or_default().add(session);
    }

    /// Writes sessions from index `from` onwards together with the updated totals.
    async fn persist(&self, from: usize) {
        if let Err(e) = self.storage.append_sessions(&self.sessions[from..]).await {
            error!("Failed to persist sessions {e:?}");
        }
        if let Err(e) = self.storage.save_daily_totals(&self.daily_totals).await {
            error!("Failed to persist daily totals {e:?}");
        }
    }
}

impl<S: Storage, Tz: TimeZone> SessionSink for SessionStore<S, Tz> {
    async fn session_ended(&mut self, session: Session) {
        self.on_session_ended(session).await
    }
}

/// Zero totals for days without sessions.
pub fn totals_for(daily_totals: &DailyTotals, key: &str) -> DayTotals {
    daily_totals.get(key).copied().unwrap_or_default()
}
