use anyhow::Result;
use chrono::Utc;
use tracing::{error, info};

use crate::db::models::{CalculationState, CalculationStatus, CalculationType};
use crate::db::Database;

/// Anything a tracked batch job returns; the team count is stored on success.
pub trait BatchOutcome {
    fn team_count(&self) -> u32;
}

impl BatchOutcome for u32 {
    fn team_count(&self) -> u32 {
        *self
    }
}

/// Records the `not_started → running → completed | failed` lifecycle of a
/// batch run, one live row per (calculation type, season).
pub struct StatusTracker<'a> {
    db: &'a Database,
}

impl<'a> StatusTracker<'a> {
    pub fn new(db: &'a Database) -> Self {
        StatusTracker { db }
    }

    /// Enter `running`. A rerun resets the previous outcome.
    pub fn start(&self, kind: CalculationType, season: i32) -> Result<()> {
        self.db.upsert_calculation_status(&CalculationStatus {
            status: CalculationState::Running,
            started_at: Some(Utc::now()),
            ..CalculationStatus::not_started(kind, season)
        })
    }

    pub fn complete(&self, kind: CalculationType, season: i32, team_count: u32) -> Result<()> {
        let mut status = self.current(kind, season)?;
        status.status = CalculationState::Completed;
        status.completed_at = Some(Utc::now());
        status.team_count = Some(team_count);
        status.error_message = None;
        self.db.upsert_calculation_status(&status)
    }

    pub fn fail(&self, kind: CalculationType, season: i32, message: &str) -> Result<()> {
        let mut status = self.current(kind, season)?;
        status.status = CalculationState::Failed;
        status.completed_at = Some(Utc::now());
        status.error_message = Some(message.to_string());
        self.db.upsert_calculation_status(&status)
    }

    /// Current status; `not_started` if the pair has never run.
    pub fn current(&self, kind: CalculationType, season: i32) -> Result<CalculationStatus> {
        Ok(self
            .db
            .get_calculation_status(kind, season)?
            .unwrap_or_else(|| CalculationStatus::not_started(kind, season)))
    }

    /// Run `job` bracketed by the status transitions. On error the status is
    /// marked failed with the error text and the error is returned unchanged;
    /// nothing the job already wrote is rolled back here.
    pub fn track<T, F>(&self, kind: CalculationType, season: i32, job: F) -> Result<T>
    where
        T: BatchOutcome,
        F: FnOnce() -> Result<T>,
    {
        self.start(kind, season)?;
        info!("{} calculation started for season {}", kind.as_str(), season);
        match job() {
            Ok(outcome) => {
                let team_count = outcome.team_count();
                self.complete(kind, season, team_count)?;
                info!(
                    "{} calculation completed for season {} ({} teams)",
                    kind.as_str(),
                    season,
                    team_count
                );
                Ok(outcome)
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!(
                    "{} calculation failed for season {}: {}",
                    kind.as_str(),
                    season,
                    message
                );
                if let Err(status_err) = self.fail(kind, season, &message) {
                    error!("Could not record failure status: {}", status_err);
                }
                Err(e)
            }
        }
    }
}
