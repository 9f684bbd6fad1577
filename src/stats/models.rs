//! Leaderboard rows, as served to clients.
//!
//! Averages are rounded to 2 decimals and rates are percentages rounded to 1
//! decimal. Rows referencing songs or categories missing from the catalog
//! carry a synthesized name and empty metadata.

use serde::Serialize;

/// Song ranked by mean tier score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopScoredSong {
    pub code: i64,
    pub avg: f64,
    pub votes: usize,
    #[serde(rename = "sRate")]
    pub s_rate: f64,
    pub name: String,
    pub artist: String,
    pub artwork: String,
}

/// Song ranked by share of S placements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopTierRateSong {
    pub code: i64,
    pub votes: usize,
    #[serde(rename = "sCount")]
    pub s_count: usize,
    #[serde(rename = "topCount")]
    pub top_count: usize,
    #[serde(rename = "sRate")]
    pub s_rate: f64,
    #[serde(rename = "topRate")]
    pub top_rate: f64,
    pub name: String,
    pub artist: String,
    pub artwork: String,
}

/// Song ranked by mean review rating.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopReviewedSong {
    pub code: i64,
    pub avg: f64,
    pub reviews: usize,
    pub name: String,
    pub artist: String,
    pub artwork: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAverage {
    pub code: i64,
    pub avg: f64,
    pub placements: usize,
    #[serde(rename = "rankingCount")]
    pub ranking_count: usize,
    pub name: String,
    pub logo: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub total_rankings: usize,
    pub total_placements: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalStats {
    pub overview: Overview,
    pub top_songs: Vec<TopScoredSong>,
    pub top_tier_rate: Vec<TopTierRateSong>,
    pub top_reviewed: Vec<TopReviewedSong>,
    pub categories: Vec<CategoryAverage>,
}
