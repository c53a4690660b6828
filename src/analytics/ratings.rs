use std::collections::HashMap;

use crate::db::models::{normalize_team_name, PowerRating};

/// Frozen view of one season's power ratings, taken once per batch run.
///
/// Rank is `1 + (number of teams with a strictly greater rating)`, so equal
/// ratings share a rank. Lookups never touch the database.
#[derive(Debug, Clone, Default)]
pub struct SeasonRatings {
    by_team: HashMap<String, f64>,
    /// All ratings, sorted descending
    sorted: Vec<f64>,
}

impl SeasonRatings {
    pub fn new(ratings: &[PowerRating]) -> Self {
        let by_team: HashMap<String, f64> = ratings
            .iter()
            .filter(|r| r.rating.is_finite())
            .map(|r| (normalize_team_name(&r.team), r.rating))
            .collect();
        let mut sorted: Vec<f64> = by_team.values().copied().collect();
        sorted.sort_by(|a, b| b.total_cmp(a));
        SeasonRatings { by_team, sorted }
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Rating for a team, matched after trimming and lower-casing
    pub fn rating(&self, team: &str) -> Option<f64> {
        self.by_team.get(&normalize_team_name(team)).copied()
    }

    /// Rank of an arbitrary rating value against the snapshot
    pub fn rank_of_rating(&self, rating: f64) -> u32 {
        let higher = self.sorted.partition_point(|&r| r > rating);
        higher as u32 + 1
    }

    pub fn rank(&self, team: &str) -> Option<u32> {
        self.rating(team).map(|r| self.rank_of_rating(r))
    }

    /// (rating, rank) in one lookup
    pub fn lookup(&self, team: &str) -> Option<(f64, u32)> {
        self.rating(team).map(|r| (r, self.rank_of_rating(r)))
    }
}
