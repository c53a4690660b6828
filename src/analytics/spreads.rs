use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use super::ratings::SeasonRatings;
use super::win_probability::WinProbabilityModel;
use crate::db::models::Game;
use crate::db::{Database, GameQuery, SpreadUpdate};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpreadSummary {
    pub games: usize,
    pub updated: usize,
    /// Games where either side had no power rating
    pub skipped: usize,
}

/// Point spread and win probabilities for one game, or `None` when either
/// side is unrated.
///
/// Spreads use the betting convention: the favourite's spread is negative.
pub fn game_spread(
    model: &WinProbabilityModel,
    ratings: &SeasonRatings,
    game: &Game,
) -> Option<SpreadUpdate> {
    let home = ratings.rating(&game.home_team)?;
    let away = ratings.rating(&game.away_team)?;
    let diff = model.rating_diff(home, away, game.neutral_site);
    let (home_win_probability, away_win_probability) =
        model.matchup(home, away, game.neutral_site);
    Some(SpreadUpdate {
        game_id: game.id,
        home_spread: -diff,
        away_spread: diff,
        home_win_probability,
        away_win_probability,
    })
}

/// Compute and persist spreads/probabilities for every game in the season.
/// Existing values are overwritten, so reruns are safe.
pub fn calculate_season_spreads(
    db: &Database,
    season: i32,
    model: &WinProbabilityModel,
) -> Result<SpreadSummary> {
    let games = db.query_games(&GameQuery::season(season))?;
    let ratings = SeasonRatings::new(&db.list_ratings(season)?);
    info!(
        "Computing spreads for {} games ({} rated teams, season {})",
        games.len(),
        ratings.len(),
        season
    );

    let mut updates = Vec::with_capacity(games.len());
    let mut skipped = 0;
    for game in &games {
        match game_spread(model, &ratings, game) {
            Some(update) => updates.push(update),
            None => {
                debug!(
                    "Skipping game {} ({} vs {}): missing rating",
                    game.id, game.home_team, game.away_team
                );
                skipped += 1;
            }
        }
    }

    let updated = db.update_game_spreads(&updates)?;
    info!(
        "Spreads updated for {} games, {} skipped for missing ratings",
        updated, skipped
    );
    Ok(SpreadSummary {
        games: games.len(),
        updated,
        skipped,
    })
}

/// Null the derived spread/probability fields for a season.
pub fn clear_season_spreads(db: &Database, season: i32) -> Result<usize> {
    let cleared = db.clear_game_spreads(season)?;
    info!("Cleared spreads/probabilities on {} games (season {})", cleared, season);
    Ok(cleared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{PowerRating, SeasonType};
    use approx::assert_relative_eq;

    fn game(id: i64, home: &str, away: &str, neutral: bool) -> Game {
        Game {
            id,
            season: 2024,
            week: 1,
            season_type: SeasonType::Regular,
            start_date: None,
            home_team: home.into(),
            away_team: away.into(),
            home_points: None,
            away_points: None,
            completed: false,
            conference_game: false,
            neutral_site: neutral,
            home_spread: None,
            away_spread: None,
            home_pregame_win_probability: None,
            away_pregame_win_probability: None,
            home_postgame_win_probability: None,
            away_postgame_win_probability: None,
        }
    }

    fn rating(team: &str, value: f64) -> PowerRating {
        PowerRating {
            team: team.into(),
            season: 2024,
            rating: value,
            offense: None,
            defense: None,
        }
    }

    #[test]
    fn neutral_site_spread() {
        let ratings = SeasonRatings::new(&[rating("A", 10.0), rating("B", 8.0)]);
        let u = game_spread(&WinProbabilityModel::default(), &ratings, &game(1, "A", "B", true))
            .unwrap();
        assert_relative_eq!(u.home_spread, -2.0, epsilon = 1e-12);
        assert_relative_eq!(u.away_spread, 2.0, epsilon = 1e-12);
        assert_relative_eq!(u.home_win_probability, 0.5589, epsilon = 5e-4);
    }

    #[test]
    fn spread_sign_matches_favourite() {
        let ratings = SeasonRatings::new(&[
            rating("A", 12.0),
            rating("B", -3.0),
            rating("C", 11.0),
            rating("D", 30.0),
        ]);
        let model = WinProbabilityModel::default();
        let teams = ["A", "B", "C", "D"];
        let mut id = 0;
        for home in teams {
            for away in teams {
                if home == away {
                    continue;
                }
                for neutral in [true, false] {
                    id += 1;
                    let u = game_spread(&model, &ratings, &game(id, home, away, neutral)).unwrap();
                    assert_eq!(u.home_spread, -u.away_spread);
                    assert_eq!(u.home_spread < 0.0, u.home_win_probability > 0.5);
                    assert_relative_eq!(
                        u.home_win_probability + u.away_win_probability,
                        1.0,
                        epsilon = 1e-12
                    );
                }
            }
        }
    }

    #[test]
    fn home_field_moves_the_line() {
        let ratings = SeasonRatings::new(&[rating("A", 7.0), rating("B", 7.0)]);
        let u = game_spread(&WinProbabilityModel::default(), &ratings, &game(1, "A", "B", false))
            .unwrap();
        assert_relative_eq!(u.home_spread, -2.15, epsilon = 1e-12);
    }

    #[test]
    fn season_run_skips_unrated_and_is_rerunnable() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_rating(&rating("A", 10.0)).unwrap();
        db.upsert_rating(&rating("B", 8.0)).unwrap();
        db.upsert_game(&game(1, "A", "B", true)).unwrap();
        db.upsert_game(&game(2, "A", "Unrated", false)).unwrap();

        let model = WinProbabilityModel::default();
        let first = calculate_season_spreads(&db, 2024, &model).unwrap();
        assert_eq!(
            first,
            SpreadSummary {
                games: 2,
                updated: 1,
                skipped: 1
            }
        );
        let second = calculate_season_spreads(&db, 2024, &model).unwrap();
        assert_eq!(first, second);

        let games = db.query_games(&GameQuery::season(2024)).unwrap();
        assert_relative_eq!(games[0].home_spread.unwrap(), -2.0, epsilon = 1e-12);
        assert!(games[1].home_pregame_win_probability.is_none());

        assert_eq!(clear_season_spreads(&db, 2024).unwrap(), 2);
        let games = db.query_games(&GameQuery::season(2024)).unwrap();
        assert!(games.iter().all(|g| g.home_spread.is_none()));
    }
}
