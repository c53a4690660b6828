//! Top-level season batch drivers. Each run is wrapped in the status tracker.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::luck::{LuckEngine, TurnoverSource, CLOSE_GAME_MARGIN};
use super::ranking::assign_ranks;
use super::ratings::SeasonRatings;
use super::sos::{round_for_storage, SosEngine, TOP_OPPONENT_RANK};
use super::status::{BatchOutcome, StatusTracker};
use super::win_probability::WinProbabilityModel;
use crate::db::models::{CalculationType, FilterResult, GameFilter, SosRecord, Team};
use crate::db::{Database, GameQuery};
use crate::error::CalcError;

#[derive(Debug, Clone)]
pub struct BatchSettings {
    /// Only teams of this classification get records
    pub classification: String,
    pub model: WinProbabilityModel,
    pub top_n: u32,
    pub close_margin: i32,
}

impl Default for BatchSettings {
    fn default() -> Self {
        BatchSettings {
            classification: "fbs".into(),
            model: WinProbabilityModel::default(),
            top_n: TOP_OPPONENT_RANK,
            close_margin: CLOSE_GAME_MARGIN,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SosSummary {
    pub teams: u32,
    /// Teams with no power rating of their own (still computed)
    pub unrated_teams: u32,
    /// Season games left out because they carry no pregame probability
    pub games_without_probability: u32,
}

impl BatchOutcome for SosSummary {
    fn team_count(&self) -> u32 {
        self.teams
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LuckSummary {
    pub teams: u32,
    pub failed: u32,
    pub turnover_data_unavailable: u32,
}

impl BatchOutcome for LuckSummary {
    fn team_count(&self) -> u32 {
        self.teams
    }
}

/// Build the combined four-filter SOS record for one team.
pub fn sos_record(engine: &SosEngine, team: &Team, season: i32) -> SosRecord {
    let mut record = SosRecord {
        team: team.name.clone(),
        season,
        classification: team.classification.clone(),
        conference: team.conference.clone(),
        all_games: FilterResult::default(),
        regular_season: FilterResult::default(),
        conference_games: FilterResult::default(),
        conference_regular: FilterResult::default(),
        updated_at: Utc::now(),
    };
    for filter in GameFilter::COMBINATIONS {
        let metrics = engine.compute_team_sos(&team.name, filter);
        record.filter_mut(filter).metrics = round_for_storage(&metrics);
    }
    record
}

/// Full SOS recompute for a season: every team of the configured
/// classification, four filters each, then ranking. The delete-and-rewrite
/// of the season's rows is a single transaction, so a failed run leaves the
/// previous rows in place.
pub fn run_sos_batch(db: &Database, season: i32, settings: &BatchSettings) -> Result<SosSummary> {
    StatusTracker::new(db).track(CalculationType::Sos, season, || {
        compute_and_store_sos(db, season, settings)
    })
}

fn compute_and_store_sos(
    db: &Database,
    season: i32,
    settings: &BatchSettings,
) -> Result<SosSummary> {
    let games = db.query_games(&GameQuery::season(season))?;
    let ratings = SeasonRatings::new(&db.list_ratings(season)?);
    let teams = db.list_teams(&settings.classification)?;
    info!(
        "SOS: {} teams, {} games, {} rated teams (season {})",
        teams.len(),
        games.len(),
        ratings.len(),
        season
    );

    if ratings.is_empty() {
        warn!("No power ratings for season {}; every opponent is unrated", season);
    }

    let games_without_probability = games
        .iter()
        .filter(|g| g.home_pregame_win_probability.is_none())
        .count() as u32;
    if games_without_probability > 0 {
        warn!(
            "{} games have no pregame probability and are excluded (missing ratings or spreads not computed)",
            games_without_probability
        );
    }

    let engine = SosEngine::new(&games, &ratings).with_top_n(settings.top_n);
    let mut unrated_teams = 0;
    let mut records = Vec::with_capacity(teams.len());
    for team in &teams {
        if ratings.rating(&team.name).is_none() {
            debug!("{} has no power rating for {}", team.name, season);
            unrated_teams += 1;
        }
        records.push(sos_record(&engine, team, season));
    }

    assign_ranks(&mut records);
    db.replace_sos_records(season, &settings.classification, &records)?;

    let summary = SosSummary {
        teams: records.len() as u32,
        unrated_teams,
        games_without_probability,
    };
    info!(
        "SOS stored for {} teams ({} unrated, {} games excluded)",
        summary.teams, summary.unrated_teams, summary.games_without_probability
    );
    Ok(summary)
}

/// Luck pass over every team of the configured classification, upserting
/// one record per team.
pub fn run_luck_batch(db: &Database, season: i32, settings: &BatchSettings) -> Result<LuckSummary> {
    run_luck_batch_with(db, db, season, settings)
}

/// As [`run_luck_batch`] with an explicit turnover source. A team that fails
/// is logged and skipped; any failure makes the run as a whole fail with
/// [`CalcError::PartialFailure`] after the other teams are written.
pub fn run_luck_batch_with(
    db: &Database,
    turnovers: &dyn TurnoverSource,
    season: i32,
    settings: &BatchSettings,
) -> Result<LuckSummary> {
    StatusTracker::new(db).track(CalculationType::Luck, season, || {
        let ratings = SeasonRatings::new(&db.list_ratings(season)?);
        let teams = db.list_teams(&settings.classification)?;
        let engine = LuckEngine::new(turnovers, &ratings).with_close_margin(settings.close_margin);
        info!("Luck: {} teams (season {})", teams.len(), season);

        let mut summary = LuckSummary::default();
        for team in &teams {
            let result = db
                .query_games(&GameQuery {
                    team: Some(team.name.clone()),
                    completed_only: true,
                    ..GameQuery::season(season)
                })
                .and_then(|games| engine.compute_team_luck(team, season, &games))
                .and_then(|record| {
                    db.upsert_luck_record(&record)?;
                    Ok(record)
                });
            match result {
                Ok(record) => {
                    summary.teams += 1;
                    if !record.turnover_data_available {
                        summary.turnover_data_unavailable += 1;
                    }
                }
                Err(e) => {
                    error!("Luck calculation failed for {}: {:#}", team.name, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Luck stored for {} teams ({} failed, {} without turnover data)",
            summary.teams, summary.failed, summary.turnover_data_unavailable
        );
        if summary.failed > 0 {
            return Err(CalcError::PartialFailure {
                failed: summary.failed as usize,
                total: teams.len(),
            }
            .into());
        }
        Ok(summary)
    })
}
