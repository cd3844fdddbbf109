//! Pipeline error type

use thiserror::Error;
use yelp_common::YelpError;

use crate::coordinator::Phase;
use crate::relation::Relation;

pub type Result<T> = std::result::Result<T, IngestError>;

/// Fatal pipeline errors
///
/// Malformed records and referential rejections are not errors; they are counted in the
/// run summary. Everything here stops the run.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Common(#[from] YelpError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Batch of {rows} rows for {relation} failed after {attempts} attempts: {source}")]
    BatchFailed {
        relation: Relation,
        rows: usize,
        attempts: u32,
        #[source]
        source: Box<IngestError>,
    },

    #[error("Phase {phase} cannot start: prerequisite phases not loaded: {}", format_phases(.missing))]
    PhaseOrder { phase: Phase, missing: Vec<Phase> },

    #[error("Phase {phase} failed (last completed phase: {}): {source}", last_completed_label(.last_completed))]
    PhaseFailed {
        phase: Phase,
        last_completed: Option<Phase>,
        #[source]
        source: Box<IngestError>,
    },

    #[error("Run cancelled (last completed phase: {})", last_completed_label(.last_completed))]
    Cancelled { last_completed: Option<Phase> },

    /// Store-level failure not originating from sqlx (e.g. the in-memory store)
    #[error("Store error: {0}")]
    Store(String),
}

impl IngestError {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Common(YelpError::from(err))
    }
}

fn format_phases(phases: &[Phase]) -> String {
    phases
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn last_completed_label(phase: &Option<Phase>) -> String {
    match phase {
        Some(p) => p.to_string(),
        None => "none".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order_lists_missing_phases() {
        let err = IngestError::PhaseOrder {
            phase: Phase::Reviews,
            missing: vec![Phase::Businesses, Phase::Users],
        };
        assert_eq!(
            err.to_string(),
            "Phase reviews cannot start: prerequisite phases not loaded: businesses, users"
        );
    }

    #[test]
    fn test_cancelled_names_last_completed_phase() {
        let err = IngestError::Cancelled {
            last_completed: Some(Phase::Users),
        };
        assert!(err.to_string().contains("last completed phase: users"));

        let err = IngestError::Cancelled {
            last_completed: None,
        };
        assert!(err.to_string().contains("none"));
    }

    #[test]
    fn test_phase_failure_names_last_completed_phase() {
        let err = IngestError::PhaseFailed {
            phase: Phase::Reviews,
            last_completed: Some(Phase::UserDetails),
            source: Box::new(IngestError::store("disk full")),
        };
        assert_eq!(
            err.to_string(),
            "Phase reviews failed (last completed phase: user_details): Store error: disk full"
        );
    }

    #[test]
    fn test_batch_failure_keeps_cause() {
        let err = IngestError::BatchFailed {
            relation: Relation::Review,
            rows: 10,
            attempts: 2,
            source: Box::new(IngestError::store("connection reset")),
        };
        let msg = err.to_string();
        assert!(msg.contains("reviews"));
        assert!(msg.contains("connection reset"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
