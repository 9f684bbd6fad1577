use super::models::*;
use super::pipeline::{self, round_to};
use crate::catalog_store::{CatalogStore, Song};
use crate::config::StatsSettings;
use crate::user::{FullUserStore, Ranking, Review};

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Name, artist and artwork of a song, or placeholders when it is missing.
struct SongInfo {
    name: String,
    artist: String,
    artwork: String,
}

fn song_info(code: i64, songs: &HashMap<i64, Song>) -> SongInfo {
    match songs.get(&code) {
        Some(song) => SongInfo {
            name: song.name.clone(),
            artist: song.artist.clone(),
            artwork: song.artwork.clone(),
        },
        None => SongInfo {
            name: format!("Song #{}", code),
            artist: String::new(),
            artwork: String::new(),
        },
    }
}

/// Read-only leaderboards over rankings and reviews.
///
/// Every call reads the stores afresh. Store failures are returned as errors
/// rather than empty leaderboards.
pub struct StatsEngine {
    catalog_store: Arc<dyn CatalogStore>,
    user_store: Arc<dyn FullUserStore>,
    settings: StatsSettings,
}

impl StatsEngine {
    pub fn new(
        catalog_store: Arc<dyn CatalogStore>,
        user_store: Arc<dyn FullUserStore>,
        settings: StatsSettings,
    ) -> Self {
        Self {
            catalog_store,
            user_store,
            settings,
        }
    }

    pub fn settings(&self) -> &StatsSettings {
        &self.settings
    }

    pub fn top_by_ranking_score(&self) -> Result<Vec<TopScoredSong>> {
        let rankings = self.user_store.list_all_rankings()?;
        self.enrich_top_scored(&rankings)
    }

    pub fn top_by_tier_rate(&self) -> Result<Vec<TopTierRateSong>> {
        let rankings = self.user_store.list_all_rankings()?;
        self.enrich_top_tier_rate(&rankings)
    }

    pub fn top_by_review_rating(&self) -> Result<Vec<TopReviewedSong>> {
        let reviews = self.user_store.list_all_reviews()?;
        self.enrich_top_reviewed(&reviews)
    }

    pub fn average_per_category(&self) -> Result<Vec<CategoryAverage>> {
        let rankings = self.user_store.list_all_rankings()?;
        self.enrich_categories(&rankings)
    }

    pub fn overview(&self) -> Result<Overview> {
        let rankings = self.user_store.list_all_rankings()?;
        Ok(pipeline::overview(&rankings))
    }

    /// All leaderboards, computed from a single read of each store.
    pub fn global_stats(&self) -> Result<GlobalStats> {
        let rankings = self.user_store.list_all_rankings()?;
        let reviews = self.user_store.list_all_reviews()?;
        debug!(
            "Computing stats over {} rankings and {} reviews",
            rankings.len(),
            reviews.len()
        );

        Ok(GlobalStats {
            overview: pipeline::overview(&rankings),
            top_songs: self.enrich_top_scored(&rankings)?,
            top_tier_rate: self.enrich_top_tier_rate(&rankings)?,
            top_reviewed: self.enrich_top_reviewed(&reviews)?,
            categories: self.enrich_categories(&rankings)?,
        })
    }

    fn enrich_top_scored(&self, rankings: &[Ranking]) -> Result<Vec<TopScoredSong>> {
        let groups = pipeline::top_by_ranking_score(
            rankings,
            self.settings.top_songs_limit,
            self.settings.top_songs_min_votes,
        );
        let codes: Vec<i64> = groups.iter().map(|g| g.code).collect();
        let songs = self.catalog_store.get_songs_by_codes(&codes)?;

        Ok(groups
            .iter()
            .map(|g| {
                let info = song_info(g.code, &songs);
                TopScoredSong {
                    code: g.code,
                    avg: round_to(g.avg_score(), 2),
                    votes: g.votes,
                    s_rate: round_to(g.s_rate() * 100.0, 1),
                    name: info.name,
                    artist: info.artist,
                    artwork: info.artwork,
                }
            })
            .collect())
    }

    fn enrich_top_tier_rate(&self, rankings: &[Ranking]) -> Result<Vec<TopTierRateSong>> {
        let groups = pipeline::top_by_tier_rate(
            rankings,
            self.settings.top_songs_limit,
            self.settings.top_songs_min_votes,
        );
        let codes: Vec<i64> = groups.iter().map(|g| g.code).collect();
        let songs = self.catalog_store.get_songs_by_codes(&codes)?;

        Ok(groups
            .iter()
            .map(|g| {
                let info = song_info(g.code, &songs);
                TopTierRateSong {
                    code: g.code,
                    votes: g.votes,
                    s_count: g.s_count,
                    top_count: g.top_count,
                    s_rate: round_to(g.s_rate() * 100.0, 1),
                    top_rate: round_to(g.top_rate() * 100.0, 1),
                    name: info.name,
                    artist: info.artist,
                    artwork: info.artwork,
                }
            })
            .collect())
    }

    fn enrich_top_reviewed(&self, reviews: &[Review]) -> Result<Vec<TopReviewedSong>> {
        let groups = pipeline::top_by_review_rating(
            reviews,
            self.settings.top_reviewed_limit,
            self.settings.top_reviewed_min_reviews,
        );
        let codes: Vec<i64> = groups.iter().map(|g| g.code).collect();
        let songs = self.catalog_store.get_songs_by_codes(&codes)?;

        Ok(groups
            .iter()
            .map(|g| {
                let info = song_info(g.code, &songs);
                TopReviewedSong {
                    code: g.code,
                    avg: round_to(g.avg_rating(), 2),
                    reviews: g.reviews,
                    name: info.name,
                    artist: info.artist,
                    artwork: info.artwork,
                }
            })
            .collect())
    }

    fn enrich_categories(&self, rankings: &[Ranking]) -> Result<Vec<CategoryAverage>> {
        let groups = pipeline::average_per_category(rankings, self.settings.category_limit);
        let codes: Vec<i64> = groups.iter().map(|g| g.code).collect();
        let categories = self.catalog_store.get_categories_by_codes(&codes)?;

        Ok(groups
            .iter()
            .map(|g| {
                let (name, logo) = match categories.get(&g.code) {
                    Some(category) => (category.name.clone(), category.logo.clone()),
                    None => (format!("Category #{}", g.code), String::new()),
                };
                CategoryAverage {
                    code: g.code,
                    avg: round_to(g.avg_score(), 2),
                    placements: g.placements,
                    ranking_count: g.ranking_count,
                    name,
                    logo,
                }
            })
            .collect())
    }
}
