//! Domain error types for the analytics batch jobs.

use thiserror::Error;

/// Errors that callers may want to match on. Everything else travels as
/// `anyhow::Error`.
#[derive(Error, Debug)]
pub enum CalcError {
    /// One or more teams failed while the rest of the batch completed.
    #[error("{failed} of {total} teams failed")]
    PartialFailure { failed: usize, total: usize },

    /// Stored data violates one or more invariants.
    #[error("validation failed with {} issue(s): {}", .0.len(), .0.join("; "))]
    Validation(Vec<String>),

    /// No turnover statistics exist for the team/season.
    #[error("turnover data unavailable for {team} ({season})")]
    TurnoverDataUnavailable { team: String, season: i32 },

    #[error("unknown calculation type: {0}")]
    UnknownCalculationType(String),

    #[error("unknown calculation state: {0}")]
    UnknownCalculationState(String),

    #[error("unknown season type: {0}")]
    UnknownSeasonType(String),

    /// The shared database connection mutex was poisoned by a panicking holder.
    #[error("database connection lock poisoned")]
    LockPoisoned,
}
