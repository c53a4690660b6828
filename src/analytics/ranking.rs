use anyhow::Result;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::info;

use crate::db::models::{GameFilter, SosRecord};
use crate::db::Database;

/// A record takes part in ranking for a filter only if that filter matched
/// at least one game; otherwise its overall SOS is treated as absent.
fn has_overall_sos(record: &SosRecord, filter: GameFilter) -> bool {
    let m = &record.filter(filter).metrics;
    m.games_played + m.games_remaining > 0
}

/// Descending overall SOS; ties broken by team name, then classification.
fn compare(a: &SosRecord, b: &SosRecord, filter: GameFilter) -> Ordering {
    let av = a.filter(filter).metrics.avg_sos_overall;
    let bv = b.filter(filter).metrics.avg_sos_overall;
    bv.total_cmp(&av)
        .then_with(|| a.team.cmp(&b.team))
        .then_with(|| a.classification.cmp(&b.classification))
}

/// Rank (1-based, no ties) per record index for one filter combination.
pub fn ranks_for(records: &[SosRecord], filter: GameFilter) -> Vec<Option<u32>> {
    let mut order: Vec<usize> = (0..records.len())
        .filter(|&i| has_overall_sos(&records[i], filter))
        .collect();
    order.sort_by(|&a, &b| compare(&records[a], &records[b], filter));

    let mut ranks = vec![None; records.len()];
    for (pos, idx) in order.into_iter().enumerate() {
        ranks[idx] = Some(pos as u32 + 1);
    }
    ranks
}

/// Fill in the rank of every filter combination, in place.
pub fn assign_ranks(records: &mut [SosRecord]) {
    for filter in GameFilter::COMBINATIONS {
        let ranks = ranks_for(records, filter);
        for (record, rank) in records.iter_mut().zip(ranks) {
            record.filter_mut(filter).rank = rank;
        }
    }
}

/// Re-rank the persisted SOS rows of a season. Each classification is ranked
/// on its own, the same scope the SOS batch uses. Idempotent.
pub fn rank_season(db: &Database, season: i32) -> Result<usize> {
    let mut groups: BTreeMap<String, Vec<SosRecord>> = BTreeMap::new();
    for record in db.list_sos_records(season)? {
        groups
            .entry(record.classification.clone())
            .or_default()
            .push(record);
    }

    let mut total = 0;
    for (classification, records) in &groups {
        for filter in GameFilter::COMBINATIONS {
            let ranks: Vec<_> = ranks_for(records, filter)
                .into_iter()
                .zip(records)
                .map(|(rank, r)| ((r.team.clone(), r.classification.clone()), rank))
                .collect();
            db.update_sos_ranks(season, filter, &ranks)?;
        }
        info!(
            "Ranked {} {} SOS records for season {}",
            records.len(),
            classification,
            season
        );
        total += records.len();
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::FilterResult;
    use chrono::Utc;

    fn record(team: &str, overall: f64, games: u32) -> SosRecord {
        let mut result = FilterResult::default();
        result.metrics.avg_sos_overall = overall;
        result.metrics.games_played = games;
        SosRecord {
            team: team.into(),
            season: 2024,
            classification: "fbs".into(),
            conference: None,
            all_games: result.clone(),
            regular_season: result.clone(),
            conference_games: result.clone(),
            conference_regular: result,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn ranks_descending_with_stable_ties() {
        let records = vec![
            record("Zeta", 5.0, 3),
            record("Alpha", 5.0, 3),
            record("Mid", 7.5, 3),
            record("Low", -2.0, 3),
        ];
        let ranks = ranks_for(&records, GameFilter::ALL_GAMES);
        assert_eq!(ranks, vec![Some(3), Some(2), Some(1), Some(4)]);
    }

    #[test]
    fn records_without_games_are_unranked() {
        let records = vec![record("A", 3.0, 2), record("B", 0.0, 0)];
        assert_eq!(ranks_for(&records, GameFilter::CONFERENCE), vec![Some(1), None]);
    }

    #[test]
    fn ranks_are_contiguous_and_unique() {
        let mut records: Vec<_> = (0..25)
            .map(|i| record(&format!("T{:02}", i), (i % 7) as f64, 1))
            .collect();
        assign_ranks(&mut records);
        for filter in GameFilter::COMBINATIONS {
            let mut ranks: Vec<u32> = records
                .iter()
                .map(|r| r.filter(filter).rank.unwrap())
                .collect();
            ranks.sort_unstable();
            assert_eq!(ranks, (1..=25).collect::<Vec<_>>());
        }
    }

    #[test]
    fn reranking_persisted_rows_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let mut records = vec![record("A", 1.0, 1), record("B", 9.0, 1), record("C", 4.0, 1)];
        records[0].conference_games.metrics.games_played = 0;
        db.replace_sos_records(2024, "fbs", &records).unwrap();

        rank_season(&db, 2024).unwrap();
        let first = db.list_sos_records(2024).unwrap();
        rank_season(&db, 2024).unwrap();
        let second = db.list_sos_records(2024).unwrap();

        let ranks = |rs: &[SosRecord], f| rs.iter().map(|r| r.filter(f).rank).collect::<Vec<_>>();
        for filter in GameFilter::COMBINATIONS {
            assert_eq!(ranks(&first, filter), ranks(&second, filter));
        }
        // Rows come back ordered by team: A, B, C
        assert_eq!(ranks(&first, GameFilter::ALL_GAMES), vec![Some(3), Some(1), Some(2)]);
        assert_eq!(ranks(&first, GameFilter::CONFERENCE), vec![None, Some(1), Some(2)]);
    }

    #[test]
    fn classifications_are_ranked_separately() {
        let db = Database::open_in_memory().unwrap();
        let mut fbs = vec![record("F1", 10.0, 1), record("F2", 0.0, 1)];
        let mut fcs = vec![record("C1", 30.0, 1), record("C2", 20.0, 1)];
        for r in &mut fcs {
            r.classification = "fcs".into();
        }
        assign_ranks(&mut fbs);
        assign_ranks(&mut fcs);
        db.replace_sos_records(2024, "fbs", &fbs).unwrap();
        db.replace_sos_records(2024, "fcs", &fcs).unwrap();

        let ranks = |rs: &[SosRecord]| {
            rs.iter()
                .map(|r| (r.team.clone(), r.all_games.rank))
                .collect::<Vec<_>>()
        };
        let written = ranks(&db.list_sos_records(2024).unwrap());
        assert_eq!(
            written,
            vec![
                ("C1".to_string(), Some(1)),
                ("C2".to_string(), Some(2)),
                ("F1".to_string(), Some(1)),
                ("F2".to_string(), Some(2)),
            ]
        );

        assert_eq!(rank_season(&db, 2024).unwrap(), 4);
        assert_eq!(ranks(&db.list_sos_records(2024).unwrap()), written);
    }
}
