use anyhow::Result;
use tracing::{debug, warn};

use super::{SessionRecord, HEADERS};
use crate::store::entities::Session;

/// Header line followed by one row per session, every field quoted.
pub fn to_csv_string(sessions: &[Session]) -> Result<String> {
    let mut text = HEADERS.join(",");
    text.push('\n');
    for session in sessions {
        let record = SessionRecord::from_session(session)?;
        let row = record.fields().map(quote).join(",");
        text.push_str(&row);
        text.push('\n');
    }
    Ok(text)
}

/// Reads rows back as [SessionRecord]s without validating them. Columns are found by header
/// name, rows with the wrong number of fields are skipped.
pub fn parse_csv(text: &str) -> Vec<SessionRecord> {
    // Spreadsheet tools often start the file with a byte order mark.
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text.lines().filter(|v| !v.trim().is_empty());
    let Some(header_line) = lines.next() else {
        warn!("Empty csv input");
        return vec![];
    };
    let headers = split_row(header_line)
        .into_iter()
        .map(|v| v.trim().to_string())
        .collect::<Vec<_>>();
    debug!("Csv columns {headers:?}");

    let mut records = vec![];
    for line in lines {
        let values = split_row(line);
        if values.len() != headers.len() {
            warn!(
                "Skipping malformed row with {} fields instead of {}: {line}",
                values.len(),
                headers.len()
            );
            continue;
        }
        records.push(SessionRecord::from_columns(
            &headers,
            values.iter().map(|v| v.trim()),
        ));
    }
    records
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Splits on commas outside quotes. Quotes around a field are removed and doubled quotes inside
/// one are collapsed.
fn split_row(line: &str) -> Vec<String> {
    let mut fields = vec![];
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    fields.push(current);
    fields
}
