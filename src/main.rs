use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use tracing::info;

mod analytics;
mod api;
mod config;
mod db;
mod error;
mod loader;

use analytics::ranking::rank_season;
use analytics::spreads::{calculate_season_spreads, clear_season_spreads};
use analytics::validate::validate_season;
use analytics::{run_luck_batch, run_sos_batch};
use api::AppState;
use config::{Command, Config};
use db::Database;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    let settings = config.batch_settings();
    match &config.command {
        Command::Spreads { season } => {
            let s = calculate_season_spreads(&db, *season, &settings.model)?;
            println!(
                "Season {}: {} games, {} updated, {} skipped (missing ratings)",
                season, s.games, s.updated, s.skipped
            );
        }
        Command::Clear { season } => {
            let cleared = clear_season_spreads(&db, *season)?;
            println!("Season {}: cleared spreads on {} games", season, cleared);
        }
        Command::Sos { season } => {
            let s = run_sos_batch(&db, *season, &settings)?;
            println!(
                "Season {}: SOS computed for {} teams ({} unrated, {} games without probability)",
                season, s.teams, s.unrated_teams, s.games_without_probability
            );
        }
        Command::Rank { season } => {
            let ranked = rank_season(&db, *season)?;
            println!("Season {}: ranked {} SOS records", season, ranked);
        }
        Command::Luck { season } => {
            let s = run_luck_batch(&db, *season, &settings)?;
            println!(
                "Season {}: luck computed for {} teams ({} without turnover data)",
                season, s.teams, s.turnover_data_unavailable
            );
        }
        Command::Validate { season } => {
            let report = validate_season(&db, *season)?;
            for w in &report.warnings {
                println!("warning: {}", w);
            }
            for i in &report.issues {
                println!("issue: {}", i);
            }
            println!(
                "Season {}: {} games checked, {} issue(s), {} warning(s)",
                season,
                report.games_checked,
                report.issues.len(),
                report.warnings.len()
            );
            if !report.is_valid() {
                report.into_result()?;
            }
        }
        Command::Status { season } => {
            for s in api::season_status(&db, *season)? {
                let teams = s.team_count.map(|n| n.to_string()).unwrap_or_else(|| "-".into());
                println!(
                    "{:<5} {:<12} teams={:<5} {}",
                    s.calculation_type.as_str(),
                    s.status.as_str(),
                    teams,
                    s.error_message.unwrap_or_default()
                );
            }
        }
        Command::Load { file } => {
            let s = loader::load_file(&db, file)?;
            println!(
                "Loaded {} teams, {} games, {} ratings, {} stat lines",
                s.teams, s.games, s.ratings, s.team_stats
            );
        }
        Command::Serve { addr } => {
            let app = api::router(AppState { db: db.clone() });
            let addr: SocketAddr = addr.parse()?;
            info!("API listening on http://{}", addr);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
