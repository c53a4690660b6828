use anyhow::Result;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

use super::ratings::SeasonRatings;
use crate::db::models::{normalize_team_name, Game};
use crate::db::{Database, GameQuery};
use crate::error::CalcError;

const TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub season: i32,
    pub games_checked: usize,
    /// Invariant violations; any of these fails the run
    pub issues: Vec<String>,
    /// Data gaps that only reduce coverage
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// Turn violations into [`CalcError::Validation`].
    pub fn into_result(self) -> Result<Self> {
        if self.issues.is_empty() {
            Ok(self)
        } else {
            Err(CalcError::Validation(self.issues).into())
        }
    }
}

fn check_game(game: &Game, issues: &mut Vec<String>) {
    let label = format!("game {} ({} vs {})", game.id, game.home_team, game.away_team);
    let scored = game.home_points.is_some() && game.away_points.is_some();
    if game.completed && !scored {
        issues.push(format!("{}: completed without a final score", label));
    }
    if !game.completed && (game.home_points.is_some() || game.away_points.is_some()) {
        issues.push(format!("{}: has a score but is not completed", label));
    }

    match (game.home_pregame_win_probability, game.away_pregame_win_probability) {
        (Some(h), Some(a)) => {
            if !(0.0..=1.0).contains(&h) || !(0.0..=1.0).contains(&a) {
                issues.push(format!("{}: win probability outside [0, 1]", label));
            }
            if (h + a - 1.0).abs() > TOLERANCE {
                issues.push(format!("{}: win probabilities sum to {:.6}", label, h + a));
            }
        }
        (None, None) => {}
        _ => issues.push(format!("{}: only one side has a win probability", label)),
    }

    if let (Some(hs), Some(as_)) = (game.home_spread, game.away_spread) {
        if (hs + as_).abs() > TOLERANCE {
            issues.push(format!("{}: spreads {} / {} are not opposite", label, hs, as_));
        }
        // Favourite carries the negative spread and the better-than-even chance
        if let Some(p) = game.home_pregame_win_probability {
            let favoured_by_spread = hs < -TOLERANCE;
            let favoured_by_probability = p > 0.5 + TOLERANCE;
            let even = hs.abs() <= TOLERANCE && (p - 0.5).abs() <= TOLERANCE;
            if !even && favoured_by_spread != favoured_by_probability {
                issues.push(format!(
                    "{}: home spread {} disagrees with home win probability {:.3}",
                    label, hs, p
                ));
            }
        }
    }
}

/// Check a season's stored games against the data invariants the batch
/// jobs rely on. Only reads.
pub fn validate_season(db: &Database, season: i32) -> Result<ValidationReport> {
    let games = db.query_games(&GameQuery::season(season))?;
    let ratings = SeasonRatings::new(&db.list_ratings(season)?);

    let mut report = ValidationReport {
        season,
        games_checked: games.len(),
        ..Default::default()
    };

    let mut seen = HashSet::new();
    let mut unrated = HashSet::new();
    for game in &games {
        check_game(game, &mut report.issues);

        let key = (
            game.week,
            normalize_team_name(&game.home_team),
            normalize_team_name(&game.away_team),
        );
        if !seen.insert(key) {
            report.issues.push(format!(
                "duplicate game week {}: {} vs {} (id {})",
                game.week, game.home_team, game.away_team, game.id
            ));
        }

        for team in [&game.home_team, &game.away_team] {
            if ratings.rating(team).is_none() && unrated.insert(normalize_team_name(team)) {
                report
                    .warnings
                    .push(format!("{} has no power rating for {}", team, season));
            }
        }
    }

    for w in &report.warnings {
        warn!("{}", w);
    }
    for i in &report.issues {
        warn!("Invalid: {}", i);
    }
    info!(
        "Validated {} games for season {}: {} issue(s), {} warning(s)",
        report.games_checked,
        season,
        report.issues.len(),
        report.warnings.len()
    );
    Ok(report)
}
