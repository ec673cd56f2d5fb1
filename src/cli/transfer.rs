use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::{
    interchange::{
        csv::{parse_csv, to_csv_string},
        valid_sessions,
    },
    store::{storage::Storage, SessionStore},
};

use super::open_storage;

pub async fn process_export_command(file: &Path, dir: &Path) -> Result<()> {
    let store = SessionStore::load(open_storage(dir)?).await;
    let count = export_sessions(&store, file).await?;
    println!("Exported {count} sessions to {}", file.display());
    Ok(())
}

pub async fn process_import_command(file: &Path, dir: &Path) -> Result<()> {
    let mut store = SessionStore::load(open_storage(dir)?).await;
    let (read, added) = import_sessions(&mut store, file).await?;
    println!(
        "Imported {added} of {read} valid sessions from {}",
        file.display()
    );
    Ok(())
}

async fn export_sessions<S: Storage, Tz: chrono::TimeZone>(
    store: &SessionStore<S, Tz>,
    file: &Path,
) -> Result<usize> {
    let text = to_csv_string(store.sessions())?;
    tokio::fs::write(file, text)
        .await
        .with_context(|| format!("Failed to write {file:?}"))?;
    info!("Exported {} sessions to {file:?}", store.sessions().len());
    Ok(store.sessions().len())
}

/// Returns how many rows were valid and how many of those were new.
async fn import_sessions<S: Storage, Tz: chrono::TimeZone>(
    store: &mut SessionStore<S, Tz>,
    file: &Path,
) -> Result<(usize, usize)> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {file:?}"))?;
    let sessions = valid_sessions(parse_csv(&text));
    let read = sessions.len();
    let added = store.import_sessions(sessions).await;
    Ok((read, added))
}
