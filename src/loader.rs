use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::db::models::{Game, PowerRating, Team, TeamGameStats};
use crate::db::Database;

/// Import document. Every section is optional.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub games: Vec<Game>,
    #[serde(default)]
    pub ratings: Vec<PowerRating>,
    #[serde(default)]
    pub team_stats: Vec<TeamGameStats>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub teams: usize,
    pub games: usize,
    pub ratings: usize,
    pub team_stats: usize,
}

/// Upsert everything in `seed`; loading the same file twice is harmless.
pub fn load_seed(db: &Database, seed: &SeedFile) -> Result<LoadSummary> {
    for team in &seed.teams {
        db.upsert_team(team)?;
    }
    for game in &seed.games {
        db.upsert_game(game)
            .with_context(|| format!("loading game {}", game.id))?;
    }
    for rating in &seed.ratings {
        db.upsert_rating(rating)?;
    }
    for stats in &seed.team_stats {
        db.upsert_team_game_stats(stats)?;
    }
    let summary = LoadSummary {
        teams: seed.teams.len(),
        games: seed.games.len(),
        ratings: seed.ratings.len(),
        team_stats: seed.team_stats.len(),
    };
    info!(
        "Loaded {} teams, {} games, {} ratings, {} stat lines",
        summary.teams, summary.games, summary.ratings, summary.team_stats
    );
    Ok(summary)
}

pub fn load_file(db: &Database, path: &Path) -> Result<LoadSummary> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let seed: SeedFile = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", path.display()))?;
    load_seed(db, &seed)
}
