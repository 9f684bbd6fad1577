use super::permissions::UserRole;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Tier of a tier-list placement. Declaration order is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    S,
    A,
    B,
    C,
    D,
}

impl Tier {
    pub const ALL: [Tier; 5] = [Tier::S, Tier::A, Tier::B, Tier::C, Tier::D];

    pub fn score(self) -> i64 {
        match self {
            Tier::S => 5,
            Tier::A => 4,
            Tier::B => 3,
            Tier::C => 2,
            Tier::D => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::S => "S",
            Tier::A => "A",
            Tier::B => "B",
            Tier::C => "C",
            Tier::D => "D",
        }
    }

    /// Exact, case-sensitive match on the tier letter.
    pub fn from_name(name: &str) -> Option<Tier> {
        match name {
            "S" => Some(Tier::S),
            "A" => Some(Tier::A),
            "B" => Some(Tier::B),
            "C" => Some(Tier::C),
            "D" => Some(Tier::D),
            _ => None,
        }
    }
}

/// One song placed in a tier, as stored inside a ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub song: i64,
    /// `None` when the stored tier is not one of S..D.
    pub tier: Option<Tier>,
    pub score: i64,
}

impl Placement {
    pub fn new(song: i64, tier: Tier) -> Self {
        Placement {
            song,
            tier: Some(tier),
            score: tier.score(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ranking {
    pub id: usize,
    pub user_id: usize,
    pub category_code: i64,
    pub ranking_date: DateTime<Utc>,
    pub rank_list: Vec<Placement>,
    /// Entries in the stored list, including ones too malformed to decode.
    pub stored_entries: usize,
}

/// Tier submission as sent by clients: tier name to song codes.
pub type TierSubmission = BTreeMap<String, Vec<i64>>;

/// A user's saved tier list for one category, rebuilt from their ranking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SavedTiers {
    #[serde(rename = "S")]
    pub s: Vec<i64>,
    #[serde(rename = "A")]
    pub a: Vec<i64>,
    #[serde(rename = "B")]
    pub b: Vec<i64>,
    #[serde(rename = "C")]
    pub c: Vec<i64>,
    #[serde(rename = "D")]
    pub d: Vec<i64>,
}

impl SavedTiers {
    pub fn tier(&self, tier: Tier) -> &Vec<i64> {
        match tier {
            Tier::S => &self.s,
            Tier::A => &self.a,
            Tier::B => &self.b,
            Tier::C => &self.c,
            Tier::D => &self.d,
        }
    }

    fn tier_mut(&mut self, tier: Tier) -> &mut Vec<i64> {
        match tier {
            Tier::S => &mut self.s,
            Tier::A => &mut self.a,
            Tier::B => &mut self.b,
            Tier::C => &mut self.c,
            Tier::D => &mut self.d,
        }
    }

    /// Placements with an unknown tier are left out.
    pub fn from_rank_list(rank_list: &[Placement]) -> Self {
        let mut tiers = SavedTiers::default();
        for placement in rank_list {
            if let Some(tier) = placement.tier {
                tiers.tier_mut(tier).push(placement.song);
            }
        }
        tiers
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub user_handle: String,
    pub song_code: i64,
    pub rating: u8,
    pub comments: String,
    pub review_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserActivity {
    pub handle: String,
    pub mail: String,
    pub role: UserRole,
    pub reviews: usize,
    pub rankings: usize,
    pub last_review: Option<DateTime<Utc>>,
    pub last_ranking: Option<DateTime<Utc>>,
}
