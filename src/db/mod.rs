use anyhow::Result;
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

pub mod models;
use models::*;

use crate::error::CalcError;

/// Thread-safe SQLite handle (single connection with mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// Optional predicates for game reads. `season` is always applied.
#[derive(Debug, Clone, Default)]
pub struct GameQuery {
    pub season: i32,
    pub team: Option<String>,
    pub season_type: Option<SeasonType>,
    pub conference_only: bool,
    pub completed_only: bool,
}

impl GameQuery {
    pub fn season(season: i32) -> Self {
        GameQuery {
            season,
            ..Default::default()
        }
    }
}

/// Derived spread/probability values for one game.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpreadUpdate {
    pub game_id: i64,
    pub home_spread: f64,
    pub away_spread: f64,
    pub home_win_probability: f64,
    pub away_win_probability: f64,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::from_connection(conn)
    }

    /// Fresh private in-memory database
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CalcError::LockPoisoned.into())
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA_SQL)?;
        conn.execute_batch(&sos_schema_sql())?;
        Ok(())
    }

    // ── Teams ─────────────────────────────────────────────────────────────────

    pub fn upsert_team(&self, team: &Team) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO teams (name, conference, classification) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET
                conference=excluded.conference,
                classification=excluded.classification",
            params![team.name, team.conference, team.classification],
        )?;
        Ok(())
    }

    /// Teams in one classification, ordered by name
    pub fn list_teams(&self, classification: &str) -> Result<Vec<Team>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT name, conference, classification FROM teams
             WHERE classification = ?1 ORDER BY name",
        )?;
        let teams = stmt
            .query_map(params![classification], |row| {
                Ok(Team {
                    name: row.get(0)?,
                    conference: row.get(1)?,
                    classification: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(teams)
    }

    // ── Games ─────────────────────────────────────────────────────────────────

    /// Insert or replace a game by id
    pub fn upsert_game(&self, game: &Game) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO games (
                id, season, week, season_type, start_date, home_team, away_team,
                home_points, away_points, completed, conference_game, neutral_site,
                home_spread, away_spread,
                home_pregame_win_probability, away_pregame_win_probability,
                home_postgame_win_probability, away_postgame_win_probability
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)
             ON CONFLICT(id) DO UPDATE SET
                season=excluded.season,
                week=excluded.week,
                season_type=excluded.season_type,
                start_date=excluded.start_date,
                home_team=excluded.home_team,
                away_team=excluded.away_team,
                home_points=excluded.home_points,
                away_points=excluded.away_points,
                completed=excluded.completed,
                conference_game=excluded.conference_game,
                neutral_site=excluded.neutral_site,
                home_spread=excluded.home_spread,
                away_spread=excluded.away_spread,
                home_pregame_win_probability=excluded.home_pregame_win_probability,
                away_pregame_win_probability=excluded.away_pregame_win_probability,
                home_postgame_win_probability=excluded.home_postgame_win_probability,
                away_postgame_win_probability=excluded.away_postgame_win_probability",
            params![
                game.id,
                game.season,
                game.week,
                game.season_type.as_str(),
                game.start_date,
                game.home_team,
                game.away_team,
                game.home_points,
                game.away_points,
                game.completed,
                game.conference_game,
                game.neutral_site,
                game.home_spread,
                game.away_spread,
                game.home_pregame_win_probability,
                game.away_pregame_win_probability,
                game.home_postgame_win_probability,
                game.away_postgame_win_probability,
            ],
        )?;
        Ok(())
    }

    /// Games matching the query, ordered by week then id
    pub fn query_games(&self, query: &GameQuery) -> Result<Vec<Game>> {
        let mut sql = String::from(
            "SELECT id, season, week, season_type, start_date, home_team, away_team,
                    home_points, away_points, completed, conference_game, neutral_site,
                    home_spread, away_spread,
                    home_pregame_win_probability, away_pregame_win_probability,
                    home_postgame_win_probability, away_postgame_win_probability
             FROM games WHERE season = ?",
        );
        let mut args: Vec<Value> = vec![Value::Integer(query.season as i64)];

        if let Some(team) = &query.team {
            sql.push_str(" AND (lower(trim(home_team)) = ? OR lower(trim(away_team)) = ?)");
            let team = normalize_team_name(team);
            args.push(Value::Text(team.clone()));
            args.push(Value::Text(team));
        }
        if let Some(season_type) = query.season_type {
            sql.push_str(" AND season_type = ?");
            args.push(Value::Text(season_type.as_str().to_string()));
        }
        if query.conference_only {
            sql.push_str(" AND conference_game = 1");
        }
        if query.completed_only {
            sql.push_str(" AND completed = 1");
        }
        sql.push_str(" ORDER BY week, id");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let games = stmt
            .query_map(params_from_iter(args.iter()), map_game)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(games)
    }

    /// Write derived spread/probability fields, all-or-nothing
    pub fn update_game_spreads(&self, updates: &[SpreadUpdate]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE games SET home_spread=?1, away_spread=?2,
                    home_pregame_win_probability=?3, away_pregame_win_probability=?4
                 WHERE id=?5",
            )?;
            for u in updates {
                stmt.execute(params![
                    u.home_spread,
                    u.away_spread,
                    u.home_win_probability,
                    u.away_win_probability,
                    u.game_id,
                ])?;
            }
        }
        tx.commit()?;
        Ok(updates.len())
    }

    /// Null out the four derived fields for every game in the season
    pub fn clear_game_spreads(&self, season: i32) -> Result<usize> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE games SET home_spread=NULL, away_spread=NULL,
                home_pregame_win_probability=NULL, away_pregame_win_probability=NULL
             WHERE season=?1",
            params![season],
        )?;
        Ok(n)
    }

    // ── Power ratings ─────────────────────────────────────────────────────────

    pub fn upsert_rating(&self, rating: &PowerRating) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO power_ratings (team, season, rating, offense, defense)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(team, season) DO UPDATE SET
                rating=excluded.rating,
                offense=excluded.offense,
                defense=excluded.defense",
            params![
                rating.team,
                rating.season,
                rating.rating,
                rating.offense,
                rating.defense
            ],
        )?;
        Ok(())
    }

    pub fn list_ratings(&self, season: i32) -> Result<Vec<PowerRating>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT team, season, rating, offense, defense FROM power_ratings
             WHERE season = ?1 ORDER BY rating DESC, team",
        )?;
        let ratings = stmt
            .query_map(params![season], |row| {
                Ok(PowerRating {
                    team: row.get(0)?,
                    season: row.get(1)?,
                    rating: row.get(2)?,
                    offense: row.get(3)?,
                    defense: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ratings)
    }

    // ── Turnover stats ────────────────────────────────────────────────────────

    pub fn upsert_team_game_stats(&self, stats: &TeamGameStats) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO game_team_stats
                (game_id, team, fumbles, fumbles_lost, interceptions_thrown, passes_defended)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(game_id, team) DO UPDATE SET
                fumbles=excluded.fumbles,
                fumbles_lost=excluded.fumbles_lost,
                interceptions_thrown=excluded.interceptions_thrown,
                passes_defended=excluded.passes_defended",
            params![
                stats.game_id,
                stats.team,
                stats.fumbles,
                stats.fumbles_lost,
                stats.interceptions_thrown,
                stats.passes_defended,
            ],
        )?;
        Ok(())
    }

    /// Stat lines recorded for a game (normally one per side)
    pub fn list_team_game_stats(&self, game_id: i64) -> Result<Vec<TeamGameStats>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT game_id, team, fumbles, fumbles_lost, interceptions_thrown, passes_defended
             FROM game_team_stats WHERE game_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![game_id], |row| {
                Ok(TeamGameStats {
                    game_id: row.get(0)?,
                    team: row.get(1)?,
                    fumbles: row.get(2)?,
                    fumbles_lost: row.get(3)?,
                    interceptions_thrown: row.get(4)?,
                    passes_defended: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── SOS records ───────────────────────────────────────────────────────────

    /// Replace every SOS row for (season, classification) in one transaction.
    /// On error nothing is changed.
    pub fn replace_sos_records(
        &self,
        season: i32,
        classification: &str,
        records: &[SosRecord],
    ) -> Result<usize> {
        let insert_sql = sos_insert_sql();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM sos_records WHERE season=?1 AND classification=?2",
            params![season, classification],
        )?;
        {
            let mut stmt = tx.prepare(&insert_sql)?;
            for record in records {
                stmt.execute(params_from_iter(sos_values(record).iter()))?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// All SOS rows for a season, ordered by team name
    pub fn list_sos_records(&self, season: i32) -> Result<Vec<SosRecord>> {
        let sql = format!(
            "SELECT team, season, classification, conference, updated_at, {}
             FROM sos_records WHERE season = ?1 ORDER BY team, classification",
            sos_metric_columns().join(", ")
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![season], map_sos_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Write rank columns for one filter combination, all-or-nothing.
    /// Keys are (team, classification).
    pub fn update_sos_ranks(
        &self,
        season: i32,
        filter: GameFilter,
        ranks: &[((String, String), Option<u32>)],
    ) -> Result<()> {
        let sql = format!(
            "UPDATE sos_records SET {}_rank = ?1 WHERE season = ?2 AND team = ?3 AND classification = ?4",
            filter.column_prefix()
        );
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for ((team, classification), rank) in ranks {
                stmt.execute(params![rank, season, team, classification])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    // ── Luck records ──────────────────────────────────────────────────────────

    pub fn upsert_luck_record(&self, rec: &LuckRecord) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO luck_records (
                team, season, conference, power_rank, wins, losses,
                expected_wins, expected_vs_actual, deserved_wins, deserved_vs_actual,
                expected_vs_deserved, close_game_wins, close_games,
                turnover_data_available, fumble_recovery_rate, interception_rate,
                turnover_margin, games_analyzed, updated_at
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19)
             ON CONFLICT(team, season) DO UPDATE SET
                conference=excluded.conference,
                power_rank=excluded.power_rank,
                wins=excluded.wins,
                losses=excluded.losses,
                expected_wins=excluded.expected_wins,
                expected_vs_actual=excluded.expected_vs_actual,
                deserved_wins=excluded.deserved_wins,
                deserved_vs_actual=excluded.deserved_vs_actual,
                expected_vs_deserved=excluded.expected_vs_deserved,
                close_game_wins=excluded.close_game_wins,
                close_games=excluded.close_games,
                turnover_data_available=excluded.turnover_data_available,
                fumble_recovery_rate=excluded.fumble_recovery_rate,
                interception_rate=excluded.interception_rate,
                turnover_margin=excluded.turnover_margin,
                games_analyzed=excluded.games_analyzed,
                updated_at=excluded.updated_at",
            params![
                rec.team,
                rec.season,
                rec.conference,
                rec.power_rank,
                rec.wins,
                rec.losses,
                rec.expected_wins,
                rec.expected_vs_actual,
                rec.deserved_wins,
                rec.deserved_vs_actual,
                rec.expected_vs_deserved,
                rec.close_game_wins,
                rec.close_games,
                rec.turnover_data_available,
                rec.fumble_recovery_rate,
                rec.interception_rate,
                rec.turnover_margin,
                rec.games_analyzed,
                rec.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn list_luck_records(&self, season: i32) -> Result<Vec<LuckRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT team, season, conference, power_rank, wins, losses,
                    expected_wins, expected_vs_actual, deserved_wins, deserved_vs_actual,
                    expected_vs_deserved, close_game_wins, close_games,
                    turnover_data_available, fumble_recovery_rate, interception_rate,
                    turnover_margin, games_analyzed, updated_at
             FROM luck_records WHERE season = ?1 ORDER BY team",
        )?;
        let records = stmt
            .query_map(params![season], map_luck_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    // ── Calculation status ────────────────────────────────────────────────────

    pub fn upsert_calculation_status(&self, status: &CalculationStatus) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO calculation_status (
                calculation_type, season, status, started_at, completed_at,
                team_count, error_message
             ) VALUES (?1,?2,?3,?4,?5,?6,?7)
             ON CONFLICT(calculation_type, season) DO UPDATE SET
                status=excluded.status,
                started_at=excluded.started_at,
                completed_at=excluded.completed_at,
                team_count=excluded.team_count,
                error_message=excluded.error_message",
            params![
                status.calculation_type.as_str(),
                status.season,
                status.status.as_str(),
                status.started_at,
                status.completed_at,
                status.team_count,
                status.error_message,
            ],
        )?;
        Ok(())
    }

    pub fn get_calculation_status(
        &self,
        calculation_type: CalculationType,
        season: i32,
    ) -> Result<Option<CalculationStatus>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT calculation_type, season, status, started_at, completed_at,
                        team_count, error_message
                 FROM calculation_status WHERE calculation_type = ?1 AND season = ?2",
                params![calculation_type.as_str(), season],
                map_status_row,
            )
            .optional()?;
        row.map(parse_status_row).transpose()
    }

    pub fn list_calculation_status(&self, season: i32) -> Result<Vec<CalculationStatus>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT calculation_type, season, status, started_at, completed_at,
                    team_count, error_message
             FROM calculation_status WHERE season = ?1 ORDER BY calculation_type",
        )?;
        let rows = stmt
            .query_map(params![season], map_status_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(parse_status_row).collect()
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn map_game(row: &rusqlite::Row) -> rusqlite::Result<Game> {
    let season_type: String = row.get(3)?;
    let season_type = SeasonType::parse(&season_type).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Game {
        id: row.get(0)?,
        season: row.get(1)?,
        week: row.get(2)?,
        season_type,
        start_date: row.get(4)?,
        home_team: row.get(5)?,
        away_team: row.get(6)?,
        home_points: row.get(7)?,
        away_points: row.get(8)?,
        completed: row.get(9)?,
        conference_game: row.get(10)?,
        neutral_site: row.get(11)?,
        home_spread: row.get(12)?,
        away_spread: row.get(13)?,
        home_pregame_win_probability: row.get(14)?,
        away_pregame_win_probability: row.get(15)?,
        home_postgame_win_probability: row.get(16)?,
        away_postgame_win_probability: row.get(17)?,
    })
}

fn map_luck_record(row: &rusqlite::Row) -> rusqlite::Result<LuckRecord> {
    Ok(LuckRecord {
        team: row.get(0)?,
        season: row.get(1)?,
        conference: row.get(2)?,
        power_rank: row.get(3)?,
        wins: row.get(4)?,
        losses: row.get(5)?,
        expected_wins: row.get(6)?,
        expected_vs_actual: row.get(7)?,
        deserved_wins: row.get(8)?,
        deserved_vs_actual: row.get(9)?,
        expected_vs_deserved: row.get(10)?,
        close_game_wins: row.get(11)?,
        close_games: row.get(12)?,
        turnover_data_available: row.get(13)?,
        fumble_recovery_rate: row.get(14)?,
        interception_rate: row.get(15)?,
        turnover_margin: row.get(16)?,
        games_analyzed: row.get(17)?,
        updated_at: row.get(18)?,
    })
}

type StatusRow = (
    String,
    i32,
    String,
    Option<chrono::DateTime<Utc>>,
    Option<chrono::DateTime<Utc>>,
    Option<u32>,
    Option<String>,
);

fn map_status_row(row: &rusqlite::Row) -> rusqlite::Result<StatusRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn parse_status_row(row: StatusRow) -> Result<CalculationStatus> {
    let (kind, season, status, started_at, completed_at, team_count, error_message) = row;
    Ok(CalculationStatus {
        calculation_type: CalculationType::parse(&kind)?,
        season,
        status: CalculationState::parse(&status)?,
        started_at,
        completed_at,
        team_count,
        error_message,
    })
}

// The sos_records table stores four copies of the metric block, one per
// filter combination, with column names `<prefix>_<field>`.

const METRIC_FIELDS: [&str; 24] = [
    "avg_sos_overall",
    "avg_sos_played",
    "avg_sos_remaining",
    "wins",
    "losses",
    "expected_wins_played",
    "expected_wins_remaining",
    "projected_wins",
    "win_difference",
    "top40_wins",
    "top40_games",
    "top40_games_played",
    "top40_games_remaining",
    "coinflip_games",
    "coinflip_played",
    "coinflip_remaining",
    "sure_thing_games",
    "sure_thing_played",
    "sure_thing_remaining",
    "longshot_games",
    "longshot_played",
    "longshot_remaining",
    "games_played",
    "games_remaining",
];

/// Indices into METRIC_FIELDS stored as REAL
const REAL_FIELDS: [usize; 7] = [0, 1, 2, 5, 6, 7, 8];

fn sos_metric_columns() -> Vec<String> {
    let mut cols = Vec::with_capacity(GameFilter::COMBINATIONS.len() * (METRIC_FIELDS.len() + 1));
    for filter in GameFilter::COMBINATIONS {
        let prefix = filter.column_prefix();
        for field in METRIC_FIELDS {
            cols.push(format!("{}_{}", prefix, field));
        }
        cols.push(format!("{}_rank", prefix));
    }
    cols
}

fn sos_schema_sql() -> String {
    let mut cols = Vec::new();
    for filter in GameFilter::COMBINATIONS {
        let prefix = filter.column_prefix();
        for (i, field) in METRIC_FIELDS.iter().enumerate() {
            let ty = if REAL_FIELDS.contains(&i) {
                "REAL    NOT NULL DEFAULT 0"
            } else {
                "INTEGER NOT NULL DEFAULT 0"
            };
            cols.push(format!("    {}_{} {}", prefix, field, ty));
        }
        cols.push(format!("    {}_rank INTEGER", prefix));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS sos_records (
    team           TEXT    NOT NULL,
    season         INTEGER NOT NULL,
    classification TEXT    NOT NULL,
    conference     TEXT,
    updated_at     TEXT    NOT NULL,
{},
    PRIMARY KEY (team, season, classification)
);
CREATE INDEX IF NOT EXISTS idx_sos_season ON sos_records(season);",
        cols.join(",\n")
    )
}

fn sos_insert_sql() -> String {
    let cols = sos_metric_columns();
    let placeholders = vec!["?"; cols.len() + 5].join(", ");
    format!(
        "INSERT INTO sos_records (team, season, classification, conference, updated_at, {})
         VALUES ({})",
        cols.join(", "),
        placeholders
    )
}

fn metric_values(m: &SosMetrics) -> [Value; 24] {
    let int = |v: u32| Value::Integer(v as i64);
    [
        Value::Real(m.avg_sos_overall),
        Value::Real(m.avg_sos_played),
        Value::Real(m.avg_sos_remaining),
        int(m.wins),
        int(m.losses),
        Value::Real(m.expected_wins_played),
        Value::Real(m.expected_wins_remaining),
        Value::Real(m.projected_wins),
        Value::Real(m.win_difference),
        int(m.top40_wins),
        int(m.top40_games),
        int(m.top40_games_played),
        int(m.top40_games_remaining),
        int(m.coinflip_games),
        int(m.coinflip_played),
        int(m.coinflip_remaining),
        int(m.sure_thing_games),
        int(m.sure_thing_played),
        int(m.sure_thing_remaining),
        int(m.longshot_games),
        int(m.longshot_played),
        int(m.longshot_remaining),
        int(m.games_played),
        int(m.games_remaining),
    ]
}

fn sos_values(rec: &SosRecord) -> Vec<Value> {
    let mut values = vec![
        Value::Text(rec.team.clone()),
        Value::Integer(rec.season as i64),
        Value::Text(rec.classification.clone()),
        rec.conference.clone().map_or(Value::Null, Value::Text),
        Value::Text(rec.updated_at.to_rfc3339()),
    ];
    for filter in GameFilter::COMBINATIONS {
        let result = rec.filter(filter);
        values.extend(metric_values(&result.metrics));
        values.push(result.rank.map_or(Value::Null, |r| Value::Integer(r as i64)));
    }
    values
}

fn map_metrics(row: &rusqlite::Row, base: usize) -> rusqlite::Result<FilterResult> {
    let metrics = SosMetrics {
        avg_sos_overall: row.get(base)?,
        avg_sos_played: row.get(base + 1)?,
        avg_sos_remaining: row.get(base + 2)?,
        wins: row.get(base + 3)?,
        losses: row.get(base + 4)?,
        expected_wins_played: row.get(base + 5)?,
        expected_wins_remaining: row.get(base + 6)?,
        projected_wins: row.get(base + 7)?,
        win_difference: row.get(base + 8)?,
        top40_wins: row.get(base + 9)?,
        top40_games: row.get(base + 10)?,
        top40_games_played: row.get(base + 11)?,
        top40_games_remaining: row.get(base + 12)?,
        coinflip_games: row.get(base + 13)?,
        coinflip_played: row.get(base + 14)?,
        coinflip_remaining: row.get(base + 15)?,
        sure_thing_games: row.get(base + 16)?,
        sure_thing_played: row.get(base + 17)?,
        sure_thing_remaining: row.get(base + 18)?,
        longshot_games: row.get(base + 19)?,
        longshot_played: row.get(base + 20)?,
        longshot_remaining: row.get(base + 21)?,
        games_played: row.get(base + 22)?,
        games_remaining: row.get(base + 23)?,
    };
    Ok(FilterResult {
        metrics,
        rank: row.get(base + METRIC_FIELDS.len())?,
    })
}

fn map_sos_record(row: &rusqlite::Row) -> rusqlite::Result<SosRecord> {
    let block = METRIC_FIELDS.len() + 1;
    Ok(SosRecord {
        team: row.get(0)?,
        season: row.get(1)?,
        classification: row.get(2)?,
        conference: row.get(3)?,
        updated_at: row.get(4)?,
        all_games: map_metrics(row, 5)?,
        regular_season: map_metrics(row, 5 + block)?,
        conference_games: map_metrics(row, 5 + 2 * block)?,
        conference_regular: map_metrics(row, 5 + 3 * block)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS). `sos_records` is
/// generated separately by `sos_schema_sql`.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS teams (
    name           TEXT    PRIMARY KEY,
    conference     TEXT,
    classification TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS games (
    id                            INTEGER PRIMARY KEY,
    season                        INTEGER NOT NULL,
    week                          INTEGER NOT NULL,
    season_type                   TEXT    NOT NULL DEFAULT 'regular',
    start_date                    TEXT,
    home_team                     TEXT    NOT NULL,
    away_team                     TEXT    NOT NULL,
    home_points                   INTEGER,
    away_points                   INTEGER,
    completed                     INTEGER NOT NULL DEFAULT 0,
    conference_game               INTEGER NOT NULL DEFAULT 0,
    neutral_site                  INTEGER NOT NULL DEFAULT 0,
    home_spread                   REAL,
    away_spread                   REAL,
    home_pregame_win_probability  REAL,
    away_pregame_win_probability  REAL,
    home_postgame_win_probability REAL,
    away_postgame_win_probability REAL
);

CREATE TABLE IF NOT EXISTS power_ratings (
    team    TEXT    NOT NULL,
    season  INTEGER NOT NULL,
    rating  REAL    NOT NULL,
    offense REAL,
    defense REAL,
    PRIMARY KEY (team, season)
);

CREATE TABLE IF NOT EXISTS game_team_stats (
    game_id              INTEGER NOT NULL,
    team                 TEXT    NOT NULL,
    fumbles              INTEGER NOT NULL DEFAULT 0,
    fumbles_lost         INTEGER NOT NULL DEFAULT 0,
    interceptions_thrown INTEGER NOT NULL DEFAULT 0,
    passes_defended      INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (game_id, team)
);

CREATE TABLE IF NOT EXISTS luck_records (
    team                    TEXT    NOT NULL,
    season                  INTEGER NOT NULL,
    conference              TEXT,
    power_rank              INTEGER,
    wins                    INTEGER NOT NULL,
    losses                  INTEGER NOT NULL,
    expected_wins           REAL    NOT NULL,
    expected_vs_actual      REAL    NOT NULL,
    deserved_wins           REAL    NOT NULL,
    deserved_vs_actual      REAL    NOT NULL,
    expected_vs_deserved    REAL    NOT NULL,
    close_game_wins         INTEGER NOT NULL,
    close_games             INTEGER NOT NULL,
    turnover_data_available INTEGER NOT NULL DEFAULT 0,
    fumble_recovery_rate    REAL,
    interception_rate       REAL,
    turnover_margin         INTEGER,
    games_analyzed          INTEGER NOT NULL,
    updated_at              TEXT    NOT NULL,
    PRIMARY KEY (team, season)
);

CREATE TABLE IF NOT EXISTS calculation_status (
    calculation_type TEXT    NOT NULL,
    season           INTEGER NOT NULL,
    status           TEXT    NOT NULL DEFAULT 'not_started',
    started_at       TEXT,
    completed_at     TEXT,
    team_count       INTEGER,
    error_message    TEXT,
    PRIMARY KEY (calculation_type, season)
);

CREATE INDEX IF NOT EXISTS idx_games_season ON games(season);
CREATE INDEX IF NOT EXISTS idx_games_home ON games(season, home_team);
CREATE INDEX IF NOT EXISTS idx_games_away ON games(season, away_team);
"#;
