//! Catalog entities.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub code: i64,
    pub name: String,
    pub artist: String,
    /// Length in seconds.
    pub duration: i64,
    /// Cover URL, may be empty.
    pub artwork: String,
    /// Free-form, as provided by the import source.
    pub release_date: String,
    pub categories: BTreeSet<i64>,
}

/// Compact song row used by category listings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SongSummary {
    pub code: i64,
    pub name: String,
    pub artist: String,
    pub artwork: String,
}

impl From<&Song> for SongSummary {
    fn from(song: &Song) -> Self {
        SongSummary {
            code: song.code,
            name: song.name.clone(),
            artist: song.artist.clone(),
            artwork: song.artwork.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub code: i64,
    pub name: String,
    pub description: String,
    pub logo: String,
}

/// Editable fields of a category, used for both creation and update.
#[derive(Clone, Debug, Deserialize)]
pub struct CategoryFields {
    pub name: String,
    pub description: String,
    pub logo: String,
}

impl CategoryFields {
    /// Returns a copy with every field trimmed.
    pub fn trimmed(&self) -> CategoryFields {
        CategoryFields {
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            logo: self.logo.trim().to_string(),
        }
    }
}
