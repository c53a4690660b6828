//! Strength-of-schedule computation for one team under one game filter.
//!
//! Works from an in-memory slice of the season's games (already enriched with
//! pregame win probabilities) and a frozen [`SeasonRatings`] snapshot, so a
//! batch run reads the store once and every team sees the same rankings.

use std::collections::HashSet;

use super::ratings::SeasonRatings;
use super::round_to;
use crate::db::models::{normalize_team_name, Game, GameFilter, SosMetrics};

/// Opponents ranked at or above this are "top-40" opponents.
pub const TOP_OPPONENT_RANK: u32 = 40;

const COINFLIP_LOW: f64 = 0.4;
const COINFLIP_HIGH: f64 = 0.6;
const SURE_THING_MIN: f64 = 0.8;
const LONGSHOT_MAX: f64 = 0.2;

/// Game difficulty from the team's own pregame win probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    CoinFlip,
    SureThing,
    Longshot,
}

/// Buckets are `[0.4, 0.6]`, `[0.8, 1]` and `[0, 0.2]`. Probabilities in
/// (0.2, 0.4) or (0.6, 0.8) belong to no bucket.
pub fn classify(win_probability: f64) -> Option<Difficulty> {
    if (COINFLIP_LOW..=COINFLIP_HIGH).contains(&win_probability) {
        Some(Difficulty::CoinFlip)
    } else if win_probability >= SURE_THING_MIN {
        Some(Difficulty::SureThing)
    } else if win_probability <= LONGSHOT_MAX {
        Some(Difficulty::Longshot)
    } else {
        None
    }
}

/// Running totals for either the played or the remaining side of a schedule.
#[derive(Debug, Default)]
struct Tally {
    games: u32,
    rating_sum: f64,
    rated_opponents: u32,
    expected_wins: f64,
    top_games: u32,
    coinflip: u32,
    sure_thing: u32,
    longshot: u32,
}

impl Tally {
    fn add(&mut self, opponent: Option<(f64, u32)>, win_probability: f64, top_n: u32) -> bool {
        self.games += 1;
        self.expected_wins += win_probability;
        let mut top_opponent = false;
        if let Some((rating, rank)) = opponent {
            self.rating_sum += rating;
            self.rated_opponents += 1;
            if rank <= top_n {
                self.top_games += 1;
                top_opponent = true;
            }
        }
        match classify(win_probability) {
            Some(Difficulty::CoinFlip) => self.coinflip += 1,
            Some(Difficulty::SureThing) => self.sure_thing += 1,
            Some(Difficulty::Longshot) => self.longshot += 1,
            None => {}
        }
        top_opponent
    }

    fn average(&self) -> f64 {
        if self.rated_opponents == 0 {
            0.0
        } else {
            self.rating_sum / self.rated_opponents as f64
        }
    }
}

pub struct SosEngine<'a> {
    games: &'a [Game],
    ratings: &'a SeasonRatings,
    top_n: u32,
}

impl<'a> SosEngine<'a> {
    /// `games` should be one season's games; ones without a pregame
    /// probability are ignored.
    pub fn new(games: &'a [Game], ratings: &'a SeasonRatings) -> Self {
        SosEngine {
            games,
            ratings,
            top_n: TOP_OPPONENT_RANK,
        }
    }

    pub fn with_top_n(mut self, top_n: u32) -> Self {
        self.top_n = top_n;
        self
    }

    /// The team's probability-bearing games that pass `filter`, deduplicated
    /// on (week, home, away), with the home flag and the team's own pregame
    /// win probability.
    fn team_games(&self, team: &str, filter: GameFilter) -> Vec<(&'a Game, bool, f64)> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for game in self.games {
            let home = normalize_team_name(&game.home_team);
            let away = normalize_team_name(&game.away_team);
            let is_home = if home == team {
                true
            } else if away == team {
                false
            } else {
                continue;
            };
            let Some(p) = game.pregame_win_probability(is_home) else {
                continue;
            };
            if filter.matches(game) && seen.insert((game.week, home, away)) {
                out.push((game, is_home, p));
            }
        }
        out
    }

    /// SOS metrics for `team` under `filter`. A team with no matching games
    /// gets an all-zero record.
    pub fn compute_team_sos(&self, team: &str, filter: GameFilter) -> SosMetrics {
        let team = normalize_team_name(team);
        let mut played = Tally::default();
        let mut remaining = Tally::default();
        let mut wins = 0;
        let mut losses = 0;
        let mut top_wins = 0;

        for (game, is_home, p) in self.team_games(&team, filter) {
            let opponent = self.ratings.lookup(game.opponent(is_home));

            if game.completed {
                let top_opponent = played.add(opponent, p, self.top_n);
                match game.score_for(is_home) {
                    Some((us, them)) if us > them => {
                        wins += 1;
                        if top_opponent {
                            top_wins += 1;
                        }
                    }
                    Some((us, them)) if us < them => losses += 1,
                    _ => {}
                }
            } else {
                remaining.add(opponent, p, self.top_n);
            }
        }

        let rated = played.rated_opponents + remaining.rated_opponents;
        let avg_sos_overall = if rated == 0 {
            0.0
        } else {
            (played.rating_sum + remaining.rating_sum) / rated as f64
        };
        let projected_wins = played.expected_wins + remaining.expected_wins;

        SosMetrics {
            avg_sos_overall,
            avg_sos_played: played.average(),
            avg_sos_remaining: remaining.average(),
            wins,
            losses,
            expected_wins_played: played.expected_wins,
            expected_wins_remaining: remaining.expected_wins,
            projected_wins,
            win_difference: wins as f64 - projected_wins,
            top40_wins: top_wins,
            top40_games: played.top_games + remaining.top_games,
            top40_games_played: played.top_games,
            top40_games_remaining: remaining.top_games,
            coinflip_games: played.coinflip + remaining.coinflip,
            coinflip_played: played.coinflip,
            coinflip_remaining: remaining.coinflip,
            sure_thing_games: played.sure_thing + remaining.sure_thing,
            sure_thing_played: played.sure_thing,
            sure_thing_remaining: remaining.sure_thing,
            longshot_games: played.longshot + remaining.longshot,
            longshot_played: played.longshot,
            longshot_remaining: remaining.longshot,
            games_played: played.games,
            games_remaining: remaining.games,
        }
    }
}

/// Storage precision: SOS averages to 3 places, win totals to 1. Projected
/// wins is re-derived from the rounded parts so the stored row still
/// satisfies `win_difference = wins − (played + remaining)`.
pub fn round_for_storage(m: &SosMetrics) -> SosMetrics {
    let expected_wins_played = round_to(m.expected_wins_played, 1);
    let expected_wins_remaining = round_to(m.expected_wins_remaining, 1);
    let projected_wins = round_to(expected_wins_played + expected_wins_remaining, 1);
    SosMetrics {
        avg_sos_overall: round_to(m.avg_sos_overall, 3),
        avg_sos_played: round_to(m.avg_sos_played, 3),
        avg_sos_remaining: round_to(m.avg_sos_remaining, 3),
        expected_wins_played,
        expected_wins_remaining,
        projected_wins,
        win_difference: round_to(m.wins as f64 - projected_wins, 1),
        ..m.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{PowerRating, SeasonType};
    use approx::assert_relative_eq;

    fn rating(team: &str, value: f64) -> PowerRating {
        PowerRating {
            team: team.into(),
            season: 2024,
            rating: value,
            offense: None,
            defense: None,
        }
    }

    fn game(id: i64, week: i32, home: &str, away: &str, home_p: f64) -> Game {
        Game {
            id,
            season: 2024,
            week,
            season_type: SeasonType::Regular,
            start_date: None,
            home_team: home.into(),
            away_team: away.into(),
            home_points: None,
            away_points: None,
            completed: false,
            conference_game: false,
            neutral_site: false,
            home_spread: None,
            away_spread: None,
            home_pregame_win_probability: Some(home_p),
            away_pregame_win_probability: Some(1.0 - home_p),
            home_postgame_win_probability: None,
            away_postgame_win_probability: None,
        }
    }

    fn finished(mut g: Game, home_points: i32, away_points: i32) -> Game {
        g.completed = true;
        g.home_points = Some(home_points);
        g.away_points = Some(away_points);
        g
    }

    /// 130 rated teams where "Opp" (5.0) is ranked 12th.
    fn league() -> SeasonRatings {
        let mut ratings = vec![rating("Opp", 5.0)];
        for i in 0..11 {
            ratings.push(rating(&format!("Strong{}", i), 10.0 + i as f64));
        }
        for i in 0..118 {
            ratings.push(rating(&format!("Weak{}", i), -1.0 - i as f64));
        }
        SeasonRatings::new(&ratings)
    }

    #[test]
    fn single_completed_win_against_top_opponent() {
        let ratings = league();
        assert_eq!(ratings.rank("Opp"), Some(12));
        let games = vec![finished(game(1, 1, "Team X", "Opp", 0.55), 30, 10)];
        let engine = SosEngine::new(&games, &ratings);

        let m = engine.compute_team_sos("Team X", GameFilter::ALL_GAMES);
        assert_eq!(m.top40_games, 1);
        assert_eq!(m.top40_games_played, 1);
        assert_eq!(m.top40_wins, 1);
        assert_eq!(m.coinflip_games, 1);
        assert_eq!(m.coinflip_played, 1);
        assert_relative_eq!(m.avg_sos_played, 5.0);
        assert_relative_eq!(m.avg_sos_overall, 5.0);
        assert_eq!(m.wins, 1);
        assert_eq!(m.losses, 0);
        assert_relative_eq!(m.expected_wins_played, 0.55);
        assert_relative_eq!(m.win_difference, 0.45, epsilon = 1e-12);
        assert_eq!(m.games_played, 1);
        assert_eq!(m.games_remaining, 0);
    }

    #[test]
    fn no_games_yields_zero_record() {
        let ratings = league();
        let games = vec![game(1, 1, "A", "B", 0.5)];
        let engine = SosEngine::new(&games, &ratings);
        for filter in GameFilter::COMBINATIONS {
            assert_eq!(engine.compute_team_sos("Nobody", filter), SosMetrics::default());
        }
    }

    #[test]
    fn splits_played_and_remaining() {
        let ratings = SeasonRatings::new(&[
            rating("Us", 0.0),
            rating("P1", 4.0),
            rating("P2", 8.0),
            rating("R1", 12.0),
        ]);
        let games = vec![
            finished(game(1, 1, "Us", "P1", 0.45), 21, 24),
            finished(game(2, 2, "P2", "Us", 0.9), 35, 14),
            game(3, 3, "Us", "R1", 0.15),
        ];
        let m = SosEngine::new(&games, &ratings).compute_team_sos("us", GameFilter::ALL_GAMES);

        assert_eq!((m.wins, m.losses), (0, 2));
        assert_relative_eq!(m.avg_sos_played, 6.0);
        assert_relative_eq!(m.avg_sos_remaining, 12.0);
        assert_relative_eq!(m.avg_sos_overall, 8.0);
        assert_relative_eq!(m.expected_wins_played, 0.45 + 0.1, epsilon = 1e-12);
        assert_relative_eq!(m.expected_wins_remaining, 0.15, epsilon = 1e-12);
        assert_relative_eq!(m.projected_wins, 0.7, epsilon = 1e-12);
        assert_eq!(m.coinflip_played, 1);
        assert_eq!(m.longshot_played, 1);
        assert_eq!(m.longshot_remaining, 1);
        assert_eq!(m.longshot_games, 2);
        assert_eq!(m.sure_thing_games, 0);
        assert_eq!(m.games_played, 2);
        assert_eq!(m.games_remaining, 1);
    }

    #[test]
    fn unrated_opponent_counts_as_game_but_not_in_average() {
        let ratings = SeasonRatings::new(&[rating("Us", 0.0), rating("Rated", 3.0)]);
        let games = vec![
            finished(game(1, 1, "Us", "Rated", 0.6), 10, 7),
            finished(game(2, 2, "Us", "FCS Team", 0.97), 56, 0),
        ];
        let m = SosEngine::new(&games, &ratings).compute_team_sos("Us", GameFilter::ALL_GAMES);
        assert_eq!(m.games_played, 2);
        assert_eq!(m.wins, 2);
        assert_relative_eq!(m.avg_sos_played, 3.0);
        assert_relative_eq!(m.expected_wins_played, 1.57, epsilon = 1e-12);
    }

    #[test]
    fn duplicate_source_rows_count_once() {
        let ratings = SeasonRatings::new(&[rating("A", 1.0), rating("B", 2.0)]);
        let games = vec![game(1, 4, "A", "B", 0.5), game(2, 4, "A ", "b", 0.5)];
        let m = SosEngine::new(&games, &ratings).compute_team_sos("A", GameFilter::ALL_GAMES);
        assert_eq!(m.games_remaining, 1);
    }

    #[test]
    fn games_without_probability_are_ignored() {
        let ratings = SeasonRatings::new(&[rating("A", 1.0), rating("B", 2.0)]);
        let mut g = game(1, 1, "A", "B", 0.5);
        g.home_pregame_win_probability = None;
        let games = vec![g];
        let m = SosEngine::new(&games, &ratings).compute_team_sos("A", GameFilter::ALL_GAMES);
        assert_eq!(m, SosMetrics::default());
    }

    #[test]
    fn filters_restrict_games() {
        let ratings = SeasonRatings::new(&[
            rating("A", 0.0),
            rating("Conf", 10.0),
            rating("NonConf", 2.0),
            rating("Bowl", 20.0),
        ]);
        let mut conf = finished(game(1, 1, "A", "Conf", 0.3), 3, 7);
        conf.conference_game = true;
        let nonconf = finished(game(2, 2, "A", "NonConf", 0.5), 7, 3);
        let mut bowl = game(3, 16, "Bowl", "A", 0.7);
        bowl.season_type = SeasonType::Postseason;
        let mut conf_title = game(4, 15, "A", "Conf", 0.5);
        conf_title.conference_game = true;
        conf_title.season_type = SeasonType::Postseason;
        let games = vec![conf, nonconf, bowl, conf_title];
        let engine = SosEngine::new(&games, &ratings);

        let all = engine.compute_team_sos("A", GameFilter::ALL_GAMES);
        assert_eq!(all.games_played + all.games_remaining, 4);

        let regular = engine.compute_team_sos("A", GameFilter::REGULAR_SEASON);
        assert_eq!(regular.games_played, 2);
        assert_eq!(regular.games_remaining, 0);
        assert_relative_eq!(regular.avg_sos_overall, 6.0);

        let conference = engine.compute_team_sos("A", GameFilter::CONFERENCE);
        assert_eq!(conference.games_played + conference.games_remaining, 2);

        let both = engine.compute_team_sos("A", GameFilter::CONFERENCE_REGULAR);
        assert_eq!(both.games_played, 1);
        assert_eq!(both.losses, 1);
        assert_relative_eq!(both.avg_sos_overall, 10.0);
    }

    #[test]
    fn difficulty_buckets_are_disjoint() {
        for i in 0..=1000 {
            let p = i as f64 / 1000.0;
            let hits = [
                (COINFLIP_LOW..=COINFLIP_HIGH).contains(&p),
                p >= SURE_THING_MIN,
                p <= LONGSHOT_MAX,
            ]
            .iter()
            .filter(|&&b| b)
            .count();
            assert!(hits <= 1, "p={} in {} buckets", p, hits);
        }
        assert_eq!(classify(0.4), Some(Difficulty::CoinFlip));
        assert_eq!(classify(0.6), Some(Difficulty::CoinFlip));
        assert_eq!(classify(0.8), Some(Difficulty::SureThing));
        assert_eq!(classify(0.2), Some(Difficulty::Longshot));
        assert_eq!(classify(0.7), None);
        assert_eq!(classify(0.3), None);
    }

    #[test]
    fn win_difference_identity_holds() {
        let ratings = league();
        let games = vec![
            finished(game(1, 1, "X", "Opp", 0.55), 30, 10),
            finished(game(2, 2, "Weak3", "X", 0.37), 14, 28),
            game(3, 3, "X", "Strong2", 0.22),
            game(4, 4, "Weak40", "X", 0.08),
        ];
        let m = SosEngine::new(&games, &ratings).compute_team_sos("X", GameFilter::ALL_GAMES);
        assert_eq!(
            m.win_difference,
            m.wins as f64 - (m.expected_wins_played + m.expected_wins_remaining)
        );

        let stored = round_for_storage(&m);
        assert_relative_eq!(
            stored.win_difference,
            stored.wins as f64 - (stored.expected_wins_played + stored.expected_wins_remaining),
            epsilon = 1e-9
        );
    }

    #[test]
    fn storage_rounding_is_stable() {
        let m = SosMetrics {
            avg_sos_overall: 4.123_456,
            avg_sos_played: 3.999_6,
            expected_wins_played: 5.26,
            expected_wins_remaining: 2.04,
            wins: 6,
            ..Default::default()
        };
        let r = round_for_storage(&m);
        assert_eq!(r.avg_sos_overall, 4.123);
        assert_eq!(r.avg_sos_played, 4.0);
        assert_eq!(r.expected_wins_played, 5.3);
        assert_eq!(r.projected_wins, 7.3);
        assert_eq!(r.win_difference, -1.3);
        assert_eq!(round_for_storage(&r), r);
    }
}
