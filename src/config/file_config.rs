use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub db_dir: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,

    pub stats: Option<StatsConfig>,
}

/// `[stats]` section: leaderboard sizes and minimum samples.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct StatsConfig {
    pub top_songs_limit: Option<usize>,
    pub top_songs_min_votes: Option<usize>,
    pub top_reviewed_limit: Option<usize>,
    pub top_reviewed_min_reviews: Option<usize>,
    pub category_limit: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
