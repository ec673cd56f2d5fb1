use std::{
    future::Future,
    io::{ErrorKind, SeekFrom},
    ops::Deref,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use fs4::tokio::AsyncFileExt;
use serde::{de::DeserializeOwned, Serialize};
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, warn};

use super::entities::{DailyTotals, Session, Settings};

const SESSIONS_FILE: &str = "sessions.jsonl";
const DAILY_TOTALS_FILE: &str = "daily_totals.json";
const SETTINGS_FILE: &str = "settings.json";

/// Durable home of everything the store owns. Loading never fails on bad content: unreadable
/// documents come back as defaults and corrupt session lines are skipped.
pub trait Storage {
    fn load_sessions(&self) -> impl Future<Output = Result<Vec<Session>>>;

    /// Appends to the end of the session log, keeping the given order.
    fn append_sessions(&self, sessions: &[Session]) -> impl Future<Output = Result<()>>;

    fn load_daily_totals(&self) -> impl Future<Output = Result<DailyTotals>>;

    fn save_daily_totals(&self, totals: &DailyTotals) -> impl Future<Output = Result<()>>;

    fn load_settings(&self) -> impl Future<Output = Result<Settings>>;

    fn save_settings(&self, settings: &Settings) -> impl Future<Output = Result<()>>;
}

impl<T: Deref> Storage for T
where
    T::Target: Storage,
{
    fn load_sessions(&self) -> impl Future<Output = Result<Vec<Session>>> {
        self.deref().load_sessions()
    }

    fn append_sessions(&self, sessions: &[Session]) -> impl Future<Output = Result<()>> {
        self.deref().append_sessions(sessions)
    }

    fn load_daily_totals(&self) -> impl Future<Output = Result<DailyTotals>> {
        self.deref().load_daily_totals()
    }

    fn save_daily_totals(&self, totals: &DailyTotals) -> impl Future<Output = Result<()>> {
        self.deref().save_daily_totals(totals)
    }

    fn load_settings(&self) -> impl Future<Output = Result<Settings>> {
        self.deref().load_settings()
    }

    fn save_settings(&self, settings: &Settings) -> impl Future<Output = Result<()>> {
        self.deref().save_settings(settings)
    }
}

/// The main realization of [Storage]. Sessions are a JSON line each in an append-only log,
/// totals and settings are single JSON documents replaced as a whole.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;

        Ok(Self { dir })
    }

    async fn read_sessions(path: &Path) -> Result<Vec<Session>, std::io::Error> {
        debug!("Reading sessions from {path:?}");
        let file = File::open(path).await?;
        file.lock_shared()?;
        let mut reader = BufReader::new(file);
        let mut sessions = vec![];
        let mut line = Vec::<u8>::new();
        let result = loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break Ok(()),
                Ok(_) => {}
                Err(e) => break Err(e),
            }
            if line.trim_ascii().is_empty() {
                continue;
            }
            match serde_json::from_slice::<Session>(&line) {
                Ok(v) => sessions.push(v),
                Err(e) => {
                    // A write cut short by a crash leaves a partial line.
                    warn!(
                        "Skipping corrupted session line in {path:?} {}: {e}",
                        String::from_utf8_lossy(&line).trim_end()
                    )
                }
            }
        };

        reader.into_inner().unlock_async().await?;
        result?;

        Ok(sessions)
    }

    async fn read_document<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {path:?}"))?,
        };
        match serde_json::from_str(&text) {
            Ok(v) => Ok(v),
            Err(e) => {
                warn!("Ignoring unparsable {path:?}: {e}");
                Ok(T::default())
            }
        }
    }

    /// Writes next to the target first so readers never see a half written document.
    async fn write_document<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let tmp_path = self.dir.join(format!("{name}.tmp"));
        let text = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(&tmp_path, text)
            .await
            .with_context(|| format!("Failed to write {tmp_path:?}"))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("Failed to replace {path:?}"))?;
        Ok(())
    }
}

/// Whether the next append starts on a fresh line. Empty files count as such.
async fn ends_with_newline(file: &mut File) -> Result<bool, std::io::Error> {
    if file.metadata().await?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] == b'\n')
}

impl Storage for FileStorage {
    async fn load_sessions(&self) -> Result<Vec<Session>> {
        let path = self.dir.join(SESSIONS_FILE);
        match Self::read_sessions(&path).await {
            Ok(v) => Ok(v),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e).with_context(|| format!("Failed to read {path:?}")),
        }
    }

    async fn append_sessions(&self, sessions: &[Session]) -> Result<()> {
        if sessions.is_empty() {
            return Ok(());
        }
        let mut buffer = Vec::<u8>::new();
        for session in sessions {
            serde_json::to_writer(&mut buffer, session)?;
            buffer.push(b'\n');
        }

        let path = self.dir.join(SESSIONS_FILE);
        let mut file = File::options()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open {path:?}"))?;

        file.lock_exclusive()?;
        let result = async {
            if !ends_with_newline(&mut file).await? {
                warn!("Session log {path:?} ends with a partial line, starting a new one");
                file.write_all(b"\n").await?;
            }
            file.write_all(&buffer).await?;
            file.flush().await
        }
        .await;
        file.unlock_async().await?;
        result?;
        Ok(())
    }

    async fn load_daily_totals(&self) -> Result<DailyTotals> {
        self.read_document(DAILY_TOTALS_FILE).await
    }

    async fn save_daily_totals(&self, totals: &DailyTotals) -> Result<()> {
        self.write_document(DAILY_TOTALS_FILE, totals).await
    }

    async fn load_settings(&self) -> Result<Settings> {
        self.read_document(SETTINGS_FILE).await
    }

    async fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.write_document(SETTINGS_FILE, settings).await
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use anyhow::Result;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::tempdir;

    use super::{FileStorage, Storage, DAILY_TOTALS_FILE, SESSIONS_FILE, SETTINGS_FILE};
    use crate::{
        store::entities::{DailyTotals, DayTotals, Session, Settings, TimePeriod},
        timer::policy::BreakPreset,
    };

    fn session(id: &str) -> Session {
        let start = Utc.with_ymd_and_hms(2024, 4, 5, 9, 0, 0).unwrap();
        let focus = TimePeriod::close(start, start + Duration::seconds(1500));
        let rest = TimePeriod::close(focus.end_time, focus.end_time + Duration::seconds(300));
        Session {
            id: id.into(),
            start_time: start,
            end_time: rest.end_time,
            total_focus_time: focus.duration,
            total_break_time: rest.duration,
            focus_periods: vec![focus],
            break_periods: vec![rest],
        }
    }

    #[tokio::test]
    async fn test_missing_files_load_as_empty() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileStorage::new(dir.path().join("nested"))?;

        assert!(storage.load_sessions().await?.is_empty());
        assert!(storage.load_daily_totals().await?.is_empty());
        assert_eq!(storage.load_settings().await?, Settings::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_sessions_append_in_order() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileStorage::new(dir.path().to_owned())?;

        storage.append_sessions(&[session("a")]).await?;
        storage.append_sessions(&[session("b"), session("c")]).await?;
        storage.append_sessions(&[]).await?;

        let ids = storage
            .load_sessions()
            .await?
            .into_iter()
            .map(|v| v.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "b", "c"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupted_session_line_is_skipped() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileStorage::new(dir.path().to_owned())?;
        storage.append_sessions(&[session("a")]).await?;
        {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(dir.path().join(SESSIONS_FILE))?;
            file.write_all(b"{\"id\":\"half\",\"startTi\n")?;
        }
        storage.append_sessions(&[session("b")]).await?;

        let sessions = storage.load_sessions().await?;
        assert_eq!(sessions, vec![session("a"), session("b")]);
        Ok(())
    }

    #[tokio::test]
    async fn test_append_after_truncated_tail() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileStorage::new(dir.path().to_owned())?;
        storage.append_sessions(&[session("a")]).await?;
        {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(dir.path().join(SESSIONS_FILE))?;
            file.write_all(b"{\"id\":\"half\",\"startTi")?;
        }
        storage.append_sessions(&[session("b")]).await?;
        storage.append_sessions(&[session("c")]).await?;

        let ids = storage
            .load_sessions()
            .await?
            .into_iter()
            .map(|v| v.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "b", "c"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_skipped() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileStorage::new(dir.path().to_owned())?;
        storage.append_sessions(&[session("a")]).await?;
        {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(dir.path().join(SESSIONS_FILE))?;
            file.write_all(b"{\"id\":\"\xff\xfe\n")?;
        }
        storage.append_sessions(&[session("b"), session("c")]).await?;

        let sessions = storage.load_sessions().await?;
        assert_eq!(sessions, vec![session("a"), session("b"), session("c")]);
        Ok(())
    }

    #[tokio::test]
    async fn test_documents_round_trip_and_recover() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileStorage::new(dir.path().to_owned())?;

        let mut totals = DailyTotals::new();
        totals.insert(
            "2024-04-05".into(),
            DayTotals {
                total_focus: 1500,
                total_break: 300,
            },
        );
        storage.save_daily_totals(&totals).await?;
        let settings = Settings {
            break_preset: BreakPreset::Preset2,
            cues: false,
        };
        storage.save_settings(&settings).await?;

        assert_eq!(storage.load_daily_totals().await?, totals);
        assert_eq!(storage.load_settings().await?, settings);
        let raw = std::fs::read_to_string(dir.path().join(DAILY_TOTALS_FILE))?;
        assert!(raw.contains("\"totalFocus\": 1500"));

        std::fs::write(dir.path().join(DAILY_TOTALS_FILE), "{ not json")?;
        std::fs::write(dir.path().join(SETTINGS_FILE), r#"{"breakPreset":"preset9"}"#)?;
        assert!(storage.load_daily_totals().await?.is_empty());
        assert_eq!(storage.load_settings().await?, Settings::default());
        Ok(())
    }
}
