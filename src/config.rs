use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::analytics::luck::CLOSE_GAME_MARGIN;
use crate::analytics::sos::TOP_OPPONENT_RANK;
use crate::analytics::win_probability::{DEFAULT_STD_DEV, HOME_FIELD_ADVANTAGE};
use crate::analytics::{BatchSettings, WinProbabilityModel};

/// College football strength-of-schedule and luck analytics
#[derive(Parser, Debug, Clone)]
#[command(name = "schedule-strength", version, about)]
pub struct Config {
    /// SQLite database path
    #[arg(
        long,
        env = "DATABASE_PATH",
        default_value = "schedule_strength.db",
        global = true
    )]
    pub database_path: String,

    /// Team classification that gets SOS and luck records
    #[arg(long, env = "CLASSIFICATION", default_value = "fbs", global = true)]
    pub classification: String,

    /// Points added to the home side's rating differential
    #[arg(
        long,
        env = "HOME_FIELD_ADVANTAGE",
        default_value_t = HOME_FIELD_ADVANTAGE,
        global = true
    )]
    pub home_field_advantage: f64,

    /// Standard deviation of the game-outcome distribution, in points
    #[arg(
        long,
        env = "WIN_PROB_STD_DEV",
        default_value_t = DEFAULT_STD_DEV,
        global = true
    )]
    pub std_dev: f64,

    /// Final margin at or under which a game is close
    #[arg(
        long,
        env = "CLOSE_GAME_MARGIN",
        default_value_t = CLOSE_GAME_MARGIN,
        global = true
    )]
    pub close_game_margin: i32,

    /// Opponents ranked at or above this count as top opponents
    #[arg(
        long,
        env = "TOP_N_OPPONENTS",
        default_value_t = TOP_OPPONENT_RANK,
        global = true
    )]
    pub top_n: u32,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compute spreads and pregame win probabilities for every game
    Spreads { season: i32 },
    /// Remove computed spreads and probabilities
    Clear { season: i32 },
    /// Recompute strength of schedule (all four filters) and rank teams
    Sos { season: i32 },
    /// Re-rank the stored SOS records
    Rank { season: i32 },
    /// Compute luck metrics
    Luck { season: i32 },
    /// Check stored game data for invariant violations
    Validate { season: i32 },
    /// Show calculation status
    Status { season: i32 },
    /// Import teams, games, ratings and turnover stats from a JSON file
    Load { file: PathBuf },
    /// Serve status and results as JSON
    Serve {
        #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:8080")]
        addr: String,
    },
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.std_dev.is_finite() || self.std_dev <= 0.0 {
            anyhow::bail!("std_dev must be positive");
        }
        if !self.home_field_advantage.is_finite() {
            anyhow::bail!("home_field_advantage must be a finite number");
        }
        if self.close_game_margin < 0 {
            anyhow::bail!("close_game_margin must not be negative");
        }
        if self.top_n == 0 {
            anyhow::bail!("top_n must be at least 1");
        }
        if self.classification.trim().is_empty() {
            anyhow::bail!("classification must not be empty");
        }
        Ok(())
    }

    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            classification: self.classification.clone(),
            model: WinProbabilityModel::new(self.std_dev, self.home_field_advantage),
            top_n: self.top_n,
            close_margin: self.close_game_margin,
        }
    }
}
