//! Bulk song import from CSV.
//!
//! Expected header: `code,name,artist,duration,artwork,releaseDate,categories`.
//! The `categories` cell holds a comma separated list of category codes;
//! tokens that are not plain digits are ignored. Rows that cannot be parsed are
//! skipped and logged, the rest of the file is still imported.

use super::models::Song;
use super::trait_def::CatalogStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Read;
use thiserror::Error;
use tracing::{info, warn};

const REQUIRED_COLUMNS: &[&str] = &[
    "code",
    "name",
    "artist",
    "duration",
    "artwork",
    "releaseDate",
    "categories",
];

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("CSV is missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("Unreadable CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

#[derive(Debug, Deserialize)]
struct CsvSongRow {
    code: String,
    name: String,
    artist: String,
    duration: String,
    artwork: String,
    #[serde(rename = "releaseDate")]
    release_date: String,
    categories: String,
}

impl TryFrom<CsvSongRow> for Song {
    type Error = String;

    fn try_from(row: CsvSongRow) -> Result<Self, Self::Error> {
        let code = row
            .code
            .parse::<i64>()
            .map_err(|e| format!("invalid code '{}': {}", row.code, e))?;
        let duration = row
            .duration
            .parse::<i64>()
            .map_err(|e| format!("invalid duration '{}': {}", row.duration, e))?;
        Ok(Song {
            code,
            name: row.name,
            artist: row.artist,
            duration,
            artwork: row.artwork,
            release_date: row.release_date,
            categories: parse_category_codes(&row.categories),
        })
    }
}

fn parse_category_codes(cell: &str) -> BTreeSet<i64> {
    cell.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|token| token.parse::<i64>().ok())
        .collect()
}

/// Imports every well-formed row, overwriting songs that share a code.
/// Store failures abort the import; malformed rows do not.
pub fn import_songs_csv<R: Read>(
    store: &dyn CatalogStore,
    input: R,
) -> Result<ImportReport, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == *column) {
            return Err(ImportError::MissingColumn(column));
        }
    }

    let mut report = ImportReport::default();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                warn!("Skipping unreadable CSV row: {}", err);
                report.skipped += 1;
                continue;
            }
        };
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let song = match record
            .deserialize::<CsvSongRow>(Some(&headers))
            .map_err(|e| e.to_string())
            .and_then(Song::try_from)
        {
            Ok(song) => song,
            Err(reason) => {
                warn!("Skipping CSV row at line {}: {}", line, reason);
                report.skipped += 1;
                continue;
            }
        };

        store.upsert_song(&song)?;
        report.imported += 1;
    }

    info!(
        "CSV import done: {} imported, {} skipped",
        report.imported, report.skipped
    );
    Ok(report)
}
