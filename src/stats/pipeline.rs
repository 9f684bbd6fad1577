//! In-memory aggregation stages: flatten placements, group by key, filter on
//! sample size, sort, truncate.
//!
//! Groups are collected in key order and sorted with a stable sort, so rows
//! tied on every sort key keep ascending code order.

use super::models::Overview;
use crate::user::{Ranking, Review};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

const S_TIER_SCORE: i64 = 5;
const TOP_TIERS_MIN_SCORE: i64 = 4;

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn ratio(part: i64, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn descending(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongScores {
    pub code: i64,
    pub votes: usize,
    pub total_score: i64,
    pub s_count: usize,
    pub top_count: usize,
}

impl SongScores {
    pub fn avg_score(&self) -> f64 {
        ratio(self.total_score, self.votes)
    }

    pub fn s_rate(&self) -> f64 {
        ratio(self.s_count as i64, self.votes)
    }

    pub fn top_rate(&self) -> f64 {
        ratio(self.top_count as i64, self.votes)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongRatings {
    pub code: i64,
    pub reviews: usize,
    pub total_rating: i64,
}

impl SongRatings {
    pub fn avg_rating(&self) -> f64 {
        ratio(self.total_rating, self.reviews)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryScores {
    pub code: i64,
    pub placements: usize,
    pub total_score: i64,
    pub ranking_count: usize,
}

impl CategoryScores {
    pub fn avg_score(&self) -> f64 {
        ratio(self.total_score, self.placements)
    }
}

/// Every placement of every ranking, grouped by song.
pub fn group_by_song(rankings: &[Ranking]) -> Vec<SongScores> {
    let mut groups: BTreeMap<i64, SongScores> = BTreeMap::new();
    for placement in rankings.iter().flat_map(|r| r.rank_list.iter()) {
        let group = groups.entry(placement.song).or_insert_with(|| SongScores {
            code: placement.song,
            ..Default::default()
        });
        group.votes += 1;
        group.total_score = group.total_score.saturating_add(placement.score);
        if placement.score == S_TIER_SCORE {
            group.s_count += 1;
        }
        if placement.score >= TOP_TIERS_MIN_SCORE {
            group.top_count += 1;
        }
    }
    groups.into_values().collect()
}

/// Songs with at least `min_votes` placements, by mean score then votes.
pub fn top_by_ranking_score(rankings: &[Ranking], limit: usize, min_votes: usize) -> Vec<SongScores> {
    let mut groups = group_by_song(rankings);
    groups.retain(|g| g.votes >= min_votes);
    groups.sort_by(|a, b| {
        descending(a.avg_score(), b.avg_score()).then_with(|| b.votes.cmp(&a.votes))
    });
    groups.truncate(limit);
    groups
}

/// Songs with at least `min_votes` placements, by share of S placements then votes.
pub fn top_by_tier_rate(rankings: &[Ranking], limit: usize, min_votes: usize) -> Vec<SongScores> {
    let mut groups = group_by_song(rankings);
    groups.retain(|g| g.votes >= min_votes);
    groups.sort_by(|a, b| descending(a.s_rate(), b.s_rate()).then_with(|| b.votes.cmp(&a.votes)));
    groups.truncate(limit);
    groups
}

/// Songs with at least `min_reviews` reviews, by mean rating then review count.
pub fn top_by_review_rating(
    reviews: &[Review],
    limit: usize,
    min_reviews: usize,
) -> Vec<SongRatings> {
    let mut groups: BTreeMap<i64, SongRatings> = BTreeMap::new();
    for review in reviews {
        let group = groups.entry(review.song_code).or_insert_with(|| SongRatings {
            code: review.song_code,
            ..Default::default()
        });
        group.reviews += 1;
        group.total_rating = group.total_rating.saturating_add(review.rating as i64);
    }

    let mut groups: Vec<SongRatings> = groups
        .into_values()
        .filter(|g| g.reviews >= min_reviews)
        .collect();
    groups.sort_by(|a, b| {
        descending(a.avg_rating(), b.avg_rating()).then_with(|| b.reviews.cmp(&a.reviews))
    });
    groups.truncate(limit);
    groups
}

/// Placements grouped by the category of their ranking. No minimum sample.
pub fn average_per_category(rankings: &[Ranking], limit: usize) -> Vec<CategoryScores> {
    let mut groups: BTreeMap<i64, (CategoryScores, BTreeSet<usize>)> = BTreeMap::new();
    for ranking in rankings {
        for placement in &ranking.rank_list {
            let (group, contributors) = groups.entry(ranking.category_code).or_insert_with(|| {
                (
                    CategoryScores {
                        code: ranking.category_code,
                        ..Default::default()
                    },
                    BTreeSet::new(),
                )
            });
            group.placements += 1;
            group.total_score = group.total_score.saturating_add(placement.score);
            contributors.insert(ranking.id);
        }
    }

    let mut groups: Vec<CategoryScores> = groups
        .into_values()
        .map(|(mut group, contributors)| {
            group.ranking_count = contributors.len();
            group
        })
        .collect();
    groups.sort_by(|a, b| {
        descending(a.avg_score(), b.avg_score()).then_with(|| b.placements.cmp(&a.placements))
    });
    groups.truncate(limit);
    groups
}

/// Placements are counted as stored, so entries dropped at decode still count.
pub fn overview(rankings: &[Ranking]) -> Overview {
    Overview {
        total_rankings: rankings.len(),
        total_placements: rankings.iter().map(|r| r.stored_entries).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::rank_list::decode_rank_list_with_count;
    use crate::user::{Placement, Tier};
    use chrono::Utc;

    fn ranking(id: usize, category_code: i64, rank_list: Vec<Placement>) -> Ranking {
        Ranking {
            id,
            user_id: id,
            category_code,
            ranking_date: Utc::now(),
            stored_entries: rank_list.len(),
            rank_list,
        }
    }

    fn stored_ranking(id: usize, category_code: i64, raw: &str) -> Ranking {
        let (rank_list, stored_entries) = decode_rank_list_with_count(raw);
        Ranking {
            stored_entries,
            ..ranking(id, category_code, rank_list)
        }
    }

    fn review(user: &str, song_code: i64, rating: u8) -> Review {
        Review {
            user_handle: user.to_string(),
            song_code,
            rating,
            comments: "x".to_string(),
            review_date: Utc::now(),
        }
    }

    fn scored(song: i64, score: i64) -> Placement {
        Placement {
            song,
            tier: None,
            score,
        }
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(13.0 / 3.0, 2), 4.33);
        assert_eq!(round_to(2.0 / 3.0 * 100.0, 1), 66.7);
        assert_eq!(round_to(4.0, 2), 4.0);
    }

    #[test]
    fn empty_inputs_produce_empty_outputs() {
        assert!(top_by_ranking_score(&[], 20, 2).is_empty());
        assert!(top_by_tier_rate(&[], 20, 2).is_empty());
        assert!(top_by_review_rating(&[], 20, 2).is_empty());
        assert!(average_per_category(&[], 50).is_empty());
        assert_eq!(overview(&[]), Overview::default());
        assert_eq!(overview(&[ranking(1, 1, vec![])]).total_placements, 0);
    }

    #[test]
    fn category_average_counts_distinct_rankings() {
        let rankings = vec![
            ranking(1, 4, vec![Placement::new(10, Tier::S), Placement::new(11, Tier::B)]),
            ranking(2, 4, vec![Placement::new(10, Tier::S)]),
        ];

        let categories = average_per_category(&rankings, 50);
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].code, 4);
        assert_eq!(round_to(categories[0].avg_score(), 2), 4.33);
        assert_eq!(categories[0].placements, 3);
        assert_eq!(categories[0].ranking_count, 2);
    }

    #[test]
    fn category_average_has_no_minimum_and_sorts() {
        let rankings = vec![
            ranking(1, 1, vec![scored(1, 3), scored(2, 3)]),
            ranking(2, 2, vec![scored(1, 3)]),
            ranking(3, 3, vec![scored(1, 5)]),
        ];
        let codes: Vec<i64> = average_per_category(&rankings, 50)
            .iter()
            .map(|c| c.code)
            .collect();
        assert_eq!(codes, vec![3, 1, 2]);
        assert_eq!(average_per_category(&rankings, 1).len(), 1);
    }

    #[test]
    fn single_placement_never_reaches_top_scores() {
        let rankings = vec![
            ranking(1, 1, vec![scored(99, 5), scored(10, 4)]),
            ranking(2, 1, vec![scored(10, 3)]),
        ];

        let top = top_by_ranking_score(&rankings, 20, 2);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].code, 10);
        assert_eq!(top[0].votes, 2);
        assert_eq!(top[0].avg_score(), 3.5);

        assert!(top_by_tier_rate(&rankings, 20, 2).iter().all(|g| g.code != 99));
    }

    #[test]
    fn top_scores_tie_break_on_votes() {
        let rankings = vec![
            ranking(1, 1, vec![scored(1, 4), scored(2, 4), scored(3, 5)]),
            ranking(2, 1, vec![scored(1, 4), scored(2, 4), scored(3, 3)]),
            ranking(3, 1, vec![scored(2, 4)]),
        ];
        let codes: Vec<i64> = top_by_ranking_score(&rankings, 20, 2)
            .iter()
            .map(|g| g.code)
            .collect();
        assert_eq!(codes, vec![2, 1, 3]);
    }

    #[test]
    fn s_rate_counts_only_top_tier() {
        let rankings = vec![
            ranking(1, 1, vec![scored(1, 5), scored(2, 4)]),
            ranking(2, 1, vec![scored(1, 4), scored(2, 4)]),
            ranking(3, 1, vec![scored(1, 5), scored(2, 5)]),
        ];
        let groups = group_by_song(&rankings);
        assert_eq!(groups[0].s_count, 2);
        assert_eq!(groups[0].top_count, 3);
        assert_eq!(round_to(groups[0].s_rate() * 100.0, 1), 66.7);
        assert_eq!(round_to(groups[1].s_rate() * 100.0, 1), 33.3);

        let by_rate: Vec<i64> = top_by_tier_rate(&rankings, 20, 2)
            .iter()
            .map(|g| g.code)
            .collect();
        assert_eq!(by_rate, vec![1, 2]);
    }

    #[test]
    fn oversized_stored_scores_do_not_overflow() {
        let raw = r#"[{"song": 1, "score": "1e300"}, {"song": 2, "score": 4}]"#;
        let rankings = vec![stored_ranking(1, 7, raw), stored_ranking(2, 7, raw)];

        let top = top_by_ranking_score(&rankings, 20, 2);
        assert_eq!(top[0].code, 1);
        assert_eq!(top[0].total_score, i64::MAX);
        assert!(top[0].avg_score() > 0.0);
        assert_eq!(top_by_tier_rate(&rankings, 20, 2).len(), 2);

        let categories = average_per_category(&rankings, 50);
        assert_eq!(categories[0].total_score, i64::MAX);
        assert!(categories[0].avg_score() > 0.0);
    }

    #[test]
    fn overview_counts_stored_entries() {
        let rankings = vec![
            stored_ranking(1, 1, r#"[{"song": 1, "score": 5}, {"score": 4}, {"song": "x"}]"#),
            stored_ranking(2, 1, r#"[{"song": 2, "score": 3}]"#),
        ];
        assert_eq!(rankings[0].rank_list.len(), 1);
        assert_eq!(
            overview(&rankings),
            Overview {
                total_rankings: 2,
                total_placements: 4,
            }
        );
    }

    #[test]
    fn malformed_scores_count_as_zero() {
        let rankings = vec![
            ranking(1, 1, vec![scored(1, 0)]),
            ranking(2, 1, vec![scored(1, 4)]),
        ];
        let top = top_by_ranking_score(&rankings, 20, 2);
        assert_eq!(top[0].avg_score(), 2.0);
    }

    #[test]
    fn review_tie_break_is_votes_then_stable() {
        let reviews = vec![
            review("a", 7, 4),
            review("b", 7, 4),
            review("a", 5, 4),
            review("b", 5, 4),
            review("c", 5, 4),
            review("a", 3, 4),
            review("b", 3, 4),
            review("a", 1, 5),
        ];

        let first: Vec<i64> = top_by_review_rating(&reviews, 20, 2)
            .iter()
            .map(|g| g.code)
            .collect();
        assert_eq!(first, vec![5, 3, 7]);

        for _ in 0..5 {
            let again: Vec<i64> = top_by_review_rating(&reviews, 20, 2)
                .iter()
                .map(|g| g.code)
                .collect();
            assert_eq!(again, first);
        }
    }

    #[test]
    fn review_limit_truncates() {
        let reviews: Vec<Review> = (0..30)
            .flat_map(|code| vec![review("a", code, 3), review("b", code, 4)])
            .collect();
        assert_eq!(top_by_review_rating(&reviews, 20, 2).len(), 20);
        assert!(top_by_review_rating(&reviews, 20, 3).is_empty());
    }
}
