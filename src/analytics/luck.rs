//! Luck metrics: how a team's record compares with a naive baseline and with
//! what its in-game performance deserved.
//!
//! Two distinct "expected" notions exist side by side:
//! SOS `projected_wins` is model based, while luck `expected_wins` is a flat
//! 0.5 per game.

use anyhow::Result;
use chrono::Utc;
use std::collections::HashSet;

use super::ratings::SeasonRatings;
use super::round_to;
use crate::db::models::{normalize_team_name, Game, LuckRecord, Team, TeamGameStats};
use crate::db::Database;
use crate::error::CalcError;

/// Final margin at or under which a game counts as close.
pub const CLOSE_GAME_MARGIN: i32 = 8;

/// Per-game win credit for the naive expected-wins baseline.
const BASELINE_WIN_PROBABILITY: f64 = 0.5;

/// Where per-game turnover box scores come from.
pub trait TurnoverSource {
    /// Stat lines recorded for a game, normally one per side.
    fn team_game_stats(&self, game_id: i64) -> Result<Vec<TeamGameStats>>;
}

impl TurnoverSource for Database {
    fn team_game_stats(&self, game_id: i64) -> Result<Vec<TeamGameStats>> {
        self.list_team_game_stats(game_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnoverLuck {
    /// Share of all fumbles in the team's games that the team recovered
    pub fumble_recovery_rate: Option<f64>,
    /// Interceptions caught per pass defended
    pub interception_rate: Option<f64>,
    /// Takeaways minus giveaways
    pub turnover_margin: i32,
    /// Games that had stat lines for both sides
    pub games: u32,
}

/// Aggregate turnover luck across `games`. Only games with stat lines for
/// both the team and its opponent count. Returns
/// [`CalcError::TurnoverDataUnavailable`] when no game qualifies.
pub fn turnover_luck(
    source: &dyn TurnoverSource,
    team: &str,
    season: i32,
    games: &[Game],
) -> Result<TurnoverLuck> {
    let key = normalize_team_name(team);
    let mut total_fumbles = 0;
    let mut recovered = 0;
    let mut interceptions = 0;
    let mut passes_defended = 0;
    let mut takeaways = 0;
    let mut giveaways = 0;
    let mut counted = 0;

    for game in games {
        let lines = source.team_game_stats(game.id)?;
        let opponent = normalize_team_name(game.opponent(game.is_home(&key)));
        let own = lines.iter().find(|l| normalize_team_name(&l.team) == key);
        let opp = lines.iter().find(|l| normalize_team_name(&l.team) == opponent);
        let (Some(own), Some(opp)) = (own, opp) else {
            continue;
        };

        counted += 1;
        total_fumbles += own.fumbles + opp.fumbles;
        recovered += (own.fumbles - own.fumbles_lost) + opp.fumbles_lost;
        interceptions += opp.interceptions_thrown;
        passes_defended += own.passes_defended;
        takeaways += opp.fumbles_lost + opp.interceptions_thrown;
        giveaways += own.fumbles_lost + own.interceptions_thrown;
    }

    if counted == 0 {
        return Err(CalcError::TurnoverDataUnavailable {
            team: team.to_string(),
            season,
        }
        .into());
    }

    let rate = |num: i32, den: i32| (den > 0).then(|| round_to(num as f64 / den as f64, 3));
    Ok(TurnoverLuck {
        fumble_recovery_rate: rate(recovered, total_fumbles),
        interception_rate: rate(interceptions, passes_defended),
        turnover_margin: takeaways - giveaways,
        games: counted,
    })
}

fn is_unavailable(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<CalcError>(),
        Some(CalcError::TurnoverDataUnavailable { .. })
    )
}

pub struct LuckEngine<'a> {
    turnovers: &'a dyn TurnoverSource,
    ratings: &'a SeasonRatings,
    close_margin: i32,
}

impl<'a> LuckEngine<'a> {
    pub fn new(turnovers: &'a dyn TurnoverSource, ratings: &'a SeasonRatings) -> Self {
        LuckEngine {
            turnovers,
            ratings,
            close_margin: CLOSE_GAME_MARGIN,
        }
    }

    pub fn with_close_margin(mut self, margin: i32) -> Self {
        self.close_margin = margin;
        self
    }

    /// Luck record for `team` from its games; only completed games with a
    /// final score are analysed, each (week, home, away) once.
    pub fn compute_team_luck(
        &self,
        team: &Team,
        season: i32,
        games: &[Game],
    ) -> Result<LuckRecord> {
        let key = normalize_team_name(&team.name);
        let mut seen = HashSet::new();
        let completed: Vec<Game> = games
            .iter()
            .filter(|g| g.completed && g.home_points.is_some() && g.away_points.is_some())
            .filter(|g| {
                let home = normalize_team_name(&g.home_team);
                let away = normalize_team_name(&g.away_team);
                (home == key || away == key) && seen.insert((g.week, home, away))
            })
            .cloned()
            .collect();

        let mut wins = 0;
        let mut losses = 0;
        let mut close_games = 0;
        let mut close_game_wins = 0;
        let mut expected_wins = 0.0;
        let mut deserved_wins = 0.0;

        for game in &completed {
            let is_home = game.is_home(&key);
            let Some((us, them)) = game.score_for(is_home) else {
                continue;
            };
            let won = us > them;
            if won {
                wins += 1;
            } else if us < them {
                losses += 1;
            }
            if (us - them).abs() <= self.close_margin {
                close_games += 1;
                if won {
                    close_game_wins += 1;
                }
            }
            expected_wins += BASELINE_WIN_PROBABILITY;
            deserved_wins += game
                .postgame_win_probability(is_home)
                .unwrap_or(BASELINE_WIN_PROBABILITY);
        }

        let turnovers = match turnover_luck(self.turnovers, &team.name, season, &completed) {
            Ok(t) => Some(t),
            Err(e) if is_unavailable(&e) => None,
            Err(e) => return Err(e),
        };

        let actual = wins as f64;
        Ok(LuckRecord {
            team: team.name.clone(),
            season,
            conference: team.conference.clone(),
            power_rank: self.ratings.rank(&team.name),
            wins,
            losses,
            expected_wins: round_to(expected_wins, 2),
            expected_vs_actual: round_to(actual - expected_wins, 2),
            deserved_wins: round_to(deserved_wins, 2),
            deserved_vs_actual: round_to(deserved_wins - actual, 2),
            expected_vs_deserved: round_to(deserved_wins - expected_wins, 2),
            close_game_wins,
            close_games,
            turnover_data_available: turnovers.is_some(),
            fumble_recovery_rate: turnovers.and_then(|t| t.fumble_recovery_rate),
            interception_rate: turnovers.and_then(|t| t.interception_rate),
            turnover_margin: turnovers.map(|t| t.turnover_margin),
            games_analyzed: completed.len() as u32,
            updated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{PowerRating, SeasonType};
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeStats(HashMap<i64, Vec<TeamGameStats>>);

    impl TurnoverSource for FakeStats {
        fn team_game_stats(&self, game_id: i64) -> Result<Vec<TeamGameStats>> {
            Ok(self.0.get(&game_id).cloned().unwrap_or_default())
        }
    }

    fn team(name: &str) -> Team {
        Team {
            name: name.into(),
            conference: Some("Big Ten".into()),
            classification: "fbs".into(),
        }
    }

    fn result(id: i64, home: &str, away: &str, hp: i32, ap: i32) -> Game {
        Game {
            id,
            season: 2024,
            week: id as i32,
            season_type: SeasonType::Regular,
            start_date: None,
            home_team: home.into(),
            away_team: away.into(),
            home_points: Some(hp),
            away_points: Some(ap),
            completed: true,
            conference_game: true,
            neutral_site: false,
            home_spread: None,
            away_spread: None,
            home_pregame_win_probability: None,
            away_pregame_win_probability: None,
            home_postgame_win_probability: None,
            away_postgame_win_probability: None,
        }
    }

    fn line(
        game_id: i64,
        team: &str,
        fumbles: i32,
        lost: i32,
        ints: i32,
        pd: i32,
    ) -> TeamGameStats {
        TeamGameStats {
            game_id,
            team: team.into(),
            fumbles,
            fumbles_lost: lost,
            interceptions_thrown: ints,
            passes_defended: pd,
        }
    }

    fn ratings() -> SeasonRatings {
        SeasonRatings::new(&[
            PowerRating {
                team: "Iowa".into(),
                season: 2024,
                rating: 9.0,
                offense: None,
                defense: None,
            },
            PowerRating {
                team: "Purdue".into(),
                season: 2024,
                rating: 12.0,
                offense: None,
                defense: None,
            },
        ])
    }

    #[test]
    fn close_games_and_baselines() {
        let mut won_close = result(1, "Iowa", "Purdue", 13, 10);
        won_close.home_postgame_win_probability = Some(0.35);
        won_close.away_postgame_win_probability = Some(0.65);
        let mut lost_big = result(2, "Ohio State", "Iowa", 38, 7);
        lost_big.away_postgame_win_probability = Some(0.05);
        let won_big = result(3, "Iowa", "Illinois", 31, 3);
        let mut upcoming = result(4, "Iowa", "Nebraska", 0, 0);
        upcoming.completed = false;
        upcoming.home_points = None;
        upcoming.away_points = None;

        let games = vec![won_close, lost_big, won_big, upcoming];
        let stats = FakeStats::default();
        let ratings = ratings();
        let rec = LuckEngine::new(&stats, &ratings)
            .compute_team_luck(&team("Iowa"), 2024, &games)
            .unwrap();

        assert_eq!((rec.wins, rec.losses), (2, 1));
        assert_eq!(rec.games_analyzed, 3);
        assert_eq!((rec.close_game_wins, rec.close_games), (1, 1));
        assert_relative_eq!(rec.expected_wins, 1.5);
        assert_relative_eq!(rec.expected_vs_actual, 0.5);
        // 0.35 + 0.05 + 0.5 fallback
        assert_relative_eq!(rec.deserved_wins, 0.9, epsilon = 1e-9);
        assert_relative_eq!(rec.deserved_vs_actual, -1.1, epsilon = 1e-9);
        assert_relative_eq!(rec.expected_vs_deserved, -0.6, epsilon = 1e-9);
        assert_eq!(rec.power_rank, Some(2));
        assert!(!rec.turnover_data_available);
        assert!(rec.turnover_margin.is_none());
    }

    #[test]
    fn eight_point_margin_is_close() {
        let games = vec![result(1, "Iowa", "Purdue", 10, 18), result(2, "Iowa", "Rutgers", 19, 10)];
        let stats = FakeStats::default();
        let ratings = ratings();
        let rec = LuckEngine::new(&stats, &ratings)
            .compute_team_luck(&team("Iowa"), 2024, &games)
            .unwrap();
        assert_eq!(rec.close_games, 1);
        assert_eq!(rec.close_game_wins, 0);
    }

    #[test]
    fn turnover_luck_from_box_scores() {
        let games = vec![
            result(1, "Iowa", "Purdue", 20, 17),
            result(2, "Minnesota", "Iowa", 14, 21),
        ];
        let mut stats = FakeStats::default();
        stats.0.insert(
            1,
            vec![line(1, "Iowa", 2, 1, 0, 6), line(1, "Purdue", 3, 2, 2, 4)],
        );
        stats.0.insert(
            2,
            vec![line(2, "Iowa", 1, 0, 1, 4), line(2, "Minnesota", 0, 0, 1, 5)],
        );

        let t = turnover_luck(&stats, "Iowa", 2024, &games).unwrap();
        // fumbles: 2+3+1+0 = 6; recovered: (2-1)+2 + (1-0)+0 = 4
        assert_relative_eq!(t.fumble_recovery_rate.unwrap(), 0.667);
        // interceptions caught: 2+1 = 3 over 10 passes defended
        assert_relative_eq!(t.interception_rate.unwrap(), 0.3);
        // takeaways: (2+2)+(0+1) = 5; giveaways: (1+0)+(0+1) = 2
        assert_eq!(t.turnover_margin, 3);
        assert_eq!(t.games, 2);
    }

    #[test]
    fn missing_turnover_data_is_reported_unavailable() {
        let games = vec![result(1, "Iowa", "Purdue", 20, 17)];
        let mut stats = FakeStats::default();
        // Only one side recorded
        stats.0.insert(1, vec![line(1, "Iowa", 1, 1, 0, 3)]);
        let err = turnover_luck(&stats, "Iowa", 2024, &games).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CalcError>(),
            Some(CalcError::TurnoverDataUnavailable { season: 2024, .. })
        ));
    }

    #[test]
    fn duplicate_rows_count_once() {
        let won = result(1, "Iowa", "Purdue", 24, 20);
        let mut repeat = result(7, " iowa", "PURDUE", 24, 20);
        repeat.week = won.week;
        let games = vec![won, repeat, result(2, "Iowa", "Illinois", 10, 31)];
        let stats = FakeStats::default();
        let ratings = ratings();
        let rec = LuckEngine::new(&stats, &ratings)
            .compute_team_luck(&team("Iowa"), 2024, &games)
            .unwrap();
        assert_eq!(rec.games_analyzed, 2);
        assert_eq!((rec.wins, rec.losses), (1, 1));
        assert_eq!((rec.close_game_wins, rec.close_games), (1, 1));
        assert_relative_eq!(rec.expected_wins, 1.0);
    }

    #[test]
    fn team_without_games_gets_empty_record() {
        let stats = FakeStats::default();
        let ratings = ratings();
        let rec = LuckEngine::new(&stats, &ratings)
            .compute_team_luck(&team("Purdue"), 2024, &[])
            .unwrap();
        assert_eq!(rec.games_analyzed, 0);
        assert_eq!(rec.expected_wins, 0.0);
        assert_eq!(rec.power_rank, Some(1));
    }
}
