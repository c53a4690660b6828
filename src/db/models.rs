use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CalcError;

/// A team as loaded by the importer. Read-only to the analytics core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    pub conference: Option<String>,
    /// Competitive tier, e.g. "fbs" or "fcs"
    pub classification: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonType {
    Regular,
    Postseason,
}

impl SeasonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeasonType::Regular => "regular",
            SeasonType::Postseason => "postseason",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CalcError> {
        match s {
            "regular" => Ok(SeasonType::Regular),
            "postseason" => Ok(SeasonType::Postseason),
            other => Err(CalcError::UnknownSeasonType(other.to_string())),
        }
    }
}

/// A scheduled or completed game. The spread and pregame probability fields
/// are filled in by the spread calculator; everything else is import data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: i64,
    pub season: i32,
    pub week: i32,
    pub season_type: SeasonType,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub home_points: Option<i32>,
    #[serde(default)]
    pub away_points: Option<i32>,
    pub completed: bool,
    #[serde(default)]
    pub conference_game: bool,
    #[serde(default)]
    pub neutral_site: bool,
    #[serde(default)]
    pub home_spread: Option<f64>,
    #[serde(default)]
    pub away_spread: Option<f64>,
    #[serde(default)]
    pub home_pregame_win_probability: Option<f64>,
    #[serde(default)]
    pub away_pregame_win_probability: Option<f64>,
    /// Post-outcome win probability from the game-statistics feed
    #[serde(default)]
    pub home_postgame_win_probability: Option<f64>,
    #[serde(default)]
    pub away_postgame_win_probability: Option<f64>,
}

impl Game {
    /// Whether `team` (already normalized) played on the home side.
    pub fn is_home(&self, team: &str) -> bool {
        normalize_team_name(&self.home_team) == team
    }

    pub fn opponent(&self, is_home: bool) -> &str {
        if is_home {
            &self.away_team
        } else {
            &self.home_team
        }
    }

    /// Final score as (team points, opponent points), if recorded.
    pub fn score_for(&self, is_home: bool) -> Option<(i32, i32)> {
        let (home, away) = (self.home_points?, self.away_points?);
        Some(if is_home { (home, away) } else { (away, home) })
    }

    pub fn pregame_win_probability(&self, is_home: bool) -> Option<f64> {
        if is_home {
            self.home_pregame_win_probability
        } else {
            self.away_pregame_win_probability
        }
    }

    pub fn postgame_win_probability(&self, is_home: bool) -> Option<f64> {
        if is_home {
            self.home_postgame_win_probability
        } else {
            self.away_postgame_win_probability
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerRating {
    pub team: String,
    pub season: i32,
    pub rating: f64,
    #[serde(default)]
    pub offense: Option<f64>,
    #[serde(default)]
    pub defense: Option<f64>,
}

/// Per-team turnover box score for one game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamGameStats {
    pub game_id: i64,
    pub team: String,
    pub fumbles: i32,
    pub fumbles_lost: i32,
    pub interceptions_thrown: i32,
    /// Passes defended, interceptions included
    pub passes_defended: i32,
}

/// Strength-of-schedule numbers for one team under one filter combination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SosMetrics {
    pub avg_sos_overall: f64,
    pub avg_sos_played: f64,
    pub avg_sos_remaining: f64,
    pub wins: u32,
    pub losses: u32,
    pub expected_wins_played: f64,
    pub expected_wins_remaining: f64,
    pub projected_wins: f64,
    /// wins − projected_wins
    pub win_difference: f64,
    pub top40_wins: u32,
    pub top40_games: u32,
    pub top40_games_played: u32,
    pub top40_games_remaining: u32,
    pub coinflip_games: u32,
    pub coinflip_played: u32,
    pub coinflip_remaining: u32,
    pub sure_thing_games: u32,
    pub sure_thing_played: u32,
    pub sure_thing_remaining: u32,
    pub longshot_games: u32,
    pub longshot_played: u32,
    pub longshot_remaining: u32,
    pub games_played: u32,
    pub games_remaining: u32,
}

/// One of the four game-filter regimes an SOS figure is computed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameFilter {
    pub regular_season_only: bool,
    pub conference_only: bool,
}

impl GameFilter {
    pub const ALL_GAMES: GameFilter = GameFilter::new(false, false);
    pub const REGULAR_SEASON: GameFilter = GameFilter::new(true, false);
    pub const CONFERENCE: GameFilter = GameFilter::new(false, true);
    pub const CONFERENCE_REGULAR: GameFilter = GameFilter::new(true, true);

    /// Every combination, in storage order.
    pub const COMBINATIONS: [GameFilter; 4] = [
        GameFilter::ALL_GAMES,
        GameFilter::REGULAR_SEASON,
        GameFilter::CONFERENCE,
        GameFilter::CONFERENCE_REGULAR,
    ];

    pub const fn new(regular_season_only: bool, conference_only: bool) -> Self {
        GameFilter {
            regular_season_only,
            conference_only,
        }
    }

    pub fn matches(&self, game: &Game) -> bool {
        (!self.regular_season_only || game.season_type == SeasonType::Regular)
            && (!self.conference_only || game.conference_game)
    }

    /// Column-group prefix in the `sos_records` table.
    pub fn column_prefix(&self) -> &'static str {
        match (self.regular_season_only, self.conference_only) {
            (false, false) => "all",
            (true, false) => "reg",
            (false, true) => "conf",
            (true, true) => "confreg",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterResult {
    pub metrics: SosMetrics,
    pub rank: Option<u32>,
}

/// One stored SOS row: all four filter combinations side by side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SosRecord {
    pub team: String,
    pub season: i32,
    pub classification: String,
    pub conference: Option<String>,
    pub all_games: FilterResult,
    pub regular_season: FilterResult,
    pub conference_games: FilterResult,
    pub conference_regular: FilterResult,
    pub updated_at: DateTime<Utc>,
}

impl SosRecord {
    pub fn filter(&self, filter: GameFilter) -> &FilterResult {
        match (filter.regular_season_only, filter.conference_only) {
            (false, false) => &self.all_games,
            (true, false) => &self.regular_season,
            (false, true) => &self.conference_games,
            (true, true) => &self.conference_regular,
        }
    }

    pub fn filter_mut(&mut self, filter: GameFilter) -> &mut FilterResult {
        match (filter.regular_season_only, filter.conference_only) {
            (false, false) => &mut self.all_games,
            (true, false) => &mut self.regular_season,
            (false, true) => &mut self.conference_games,
            (true, true) => &mut self.conference_regular,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LuckRecord {
    pub team: String,
    pub season: i32,
    pub conference: Option<String>,
    pub power_rank: Option<u32>,
    pub wins: u32,
    pub losses: u32,
    /// Flat 0.5-per-game baseline, not model based
    pub expected_wins: f64,
    pub expected_vs_actual: f64,
    pub deserved_wins: f64,
    pub deserved_vs_actual: f64,
    pub expected_vs_deserved: f64,
    pub close_game_wins: u32,
    pub close_games: u32,
    pub turnover_data_available: bool,
    pub fumble_recovery_rate: Option<f64>,
    pub interception_rate: Option<f64>,
    pub turnover_margin: Option<i32>,
    pub games_analyzed: u32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationType {
    Sos,
    Luck,
}

impl CalculationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationType::Sos => "sos",
            CalculationType::Luck => "luck",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CalcError> {
        match s {
            "sos" => Ok(CalculationType::Sos),
            "luck" => Ok(CalculationType::Luck),
            other => Err(CalcError::UnknownCalculationType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationState {
    NotStarted,
    Running,
    Completed,
    Failed,
}

impl CalculationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationState::NotStarted => "not_started",
            CalculationState::Running => "running",
            CalculationState::Completed => "completed",
            CalculationState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CalcError> {
        match s {
            "not_started" => Ok(CalculationState::NotStarted),
            "running" => Ok(CalculationState::Running),
            "completed" => Ok(CalculationState::Completed),
            "failed" => Ok(CalculationState::Failed),
            other => Err(CalcError::UnknownCalculationState(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationStatus {
    pub calculation_type: CalculationType,
    pub season: i32,
    pub status: CalculationState,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub team_count: Option<u32>,
    pub error_message: Option<String>,
}

impl CalculationStatus {
    /// Status for a (type, season) that has never been run.
    pub fn not_started(calculation_type: CalculationType, season: i32) -> Self {
        CalculationStatus {
            calculation_type,
            season,
            status: CalculationState::NotStarted,
            started_at: None,
            completed_at: None,
            team_count: None,
            error_message: None,
        }
    }
}

/// Team-name matching rule shared by every lookup: trim and lower-case.
pub fn normalize_team_name(name: &str) -> String {
    name.trim().to_lowercase()
}
