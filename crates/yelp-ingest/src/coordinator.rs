//! Phase-ordered run coordination
//!
//! A run walks the selected phases in their fixed order. Each phase streams one source
//! file through normalize -> validate -> accumulate -> load and only completes once its
//! final flush has been committed. A phase never starts before the phases it depends on
//! have completed in this run or were declared as already loaded.

use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;
use yelp_common::YelpError;

use crate::accumulator::{BatchAccumulator, Flushed};
use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::loader::BulkLoader;
use crate::normalize::{normalize, EntityKind};
use crate::progress::{format_bytes, phase_progress};
use crate::reader::{EntityStreamReader, ReadEvent};
use crate::relation::{Relation, RelationSet, RootEntity};
use crate::stats::{PhaseStats, RunSummary};
use crate::store::BulkStore;
use crate::validator::{MembershipSet, ReferenceValidator};

const PROGRESS_EVERY: u64 = 4096;

/// Pipeline phases in dependency order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Businesses,
    Users,
    BusinessDetails,
    UserDetails,
    Reviews,
    Tips,
    Checkins,
}

impl Phase {
    pub const ALL: [Phase; 7] = [
        Phase::Businesses,
        Phase::Users,
        Phase::BusinessDetails,
        Phase::UserDetails,
        Phase::Reviews,
        Phase::Tips,
        Phase::Checkins,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Phase::Businesses => "businesses",
            Phase::Users => "users",
            Phase::BusinessDetails => "business_details",
            Phase::UserDetails => "user_details",
            Phase::Reviews => "reviews",
            Phase::Tips => "tips",
            Phase::Checkins => "checkins",
        }
    }

    /// Source file this phase streams
    pub fn source(self) -> EntityKind {
        match self {
            Phase::Businesses | Phase::BusinessDetails => EntityKind::Business,
            Phase::Users | Phase::UserDetails => EntityKind::User,
            Phase::Reviews => EntityKind::Review,
            Phase::Tips => EntityKind::Tip,
            Phase::Checkins => EntityKind::Checkin,
        }
    }

    /// Relations this phase writes
    pub fn relations(self) -> &'static [Relation] {
        match self {
            Phase::Businesses => &[Relation::Business],
            Phase::Users => &[Relation::User],
            Phase::BusinessDetails => &[
                Relation::BusinessCategory,
                Relation::BusinessHours,
                Relation::BusinessAttribute,
            ],
            Phase::UserDetails => &[Relation::UserFriend, Relation::UserEliteYear],
            Phase::Reviews => &[Relation::Review],
            Phase::Tips => &[Relation::Tip],
            Phase::Checkins => &[Relation::Checkin],
        }
    }

    pub fn wanted(self) -> RelationSet {
        RelationSet::of(self.relations())
    }

    /// Root entities whose committed identities the validator needs
    pub fn parents(self) -> &'static [RootEntity] {
        match self {
            Phase::Businesses | Phase::Users => &[],
            Phase::BusinessDetails | Phase::Checkins => &[RootEntity::Business],
            Phase::UserDetails => &[RootEntity::User],
            Phase::Reviews | Phase::Tips => &[RootEntity::Business, RootEntity::User],
        }
    }

    /// Phases that must be complete before this one starts
    pub fn requires(self) -> &'static [Phase] {
        match self {
            Phase::Businesses | Phase::Users => &[],
            Phase::BusinessDetails | Phase::Checkins => &[Phase::Businesses],
            Phase::UserDetails => &[Phase::Users],
            Phase::Reviews | Phase::Tips => &[Phase::Businesses, Phase::Users],
        }
    }

    /// Whether a repeated record identity within the phase is skipped
    pub fn skips_duplicate_identities(self) -> bool {
        matches!(
            self,
            Phase::Businesses | Phase::Users | Phase::BusinessDetails | Phase::UserDetails
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Phase {
    type Err = YelpError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Phase::ALL
            .into_iter()
            .find(|p| p.name() == normalized)
            .ok_or_else(|| {
                YelpError::Parse(format!(
                    "unknown phase '{}', expected one of: {}",
                    s,
                    Phase::ALL.map(Phase::name).join(", ")
                ))
            })
    }
}

/// Drives the pipeline through its phases
pub struct RunCoordinator<S> {
    config: IngestConfig,
    loader: BulkLoader<S>,
    cancel: CancellationToken,
    completed: BTreeSet<Phase>,
    summary: RunSummary,
}

impl<S: BulkStore> RunCoordinator<S> {
    pub fn new(store: Arc<S>, config: IngestConfig) -> Self {
        Self {
            config,
            loader: BulkLoader::new(store),
            cancel: CancellationToken::new(),
            completed: BTreeSet::new(),
            summary: RunSummary::new(Uuid::new_v4()),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.loader = self.loader.with_retry_delay(delay);
        self
    }

    /// Treat `phases` as loaded by an earlier run
    pub fn assume_loaded(mut self, phases: impl IntoIterator<Item = Phase>) -> Self {
        self.completed.extend(phases);
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.summary.run_id
    }

    pub fn is_complete(&self, phase: Phase) -> bool {
        self.completed.contains(&phase)
    }

    /// Fails with [`IngestError::PhaseOrder`] unless every prerequisite is complete
    pub fn check_ready(&self, phase: Phase) -> Result<()> {
        let missing: Vec<Phase> = phase
            .requires()
            .iter()
            .copied()
            .filter(|p| !self.completed.contains(p))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(IngestError::PhaseOrder { phase, missing })
        }
    }

    /// Run the selected phases (all of them when `selected` is empty) in dependency order
    pub async fn run(mut self, selected: &[Phase]) -> Result<RunSummary> {
        let phases: Vec<Phase> = if selected.is_empty() {
            Phase::ALL.to_vec()
        } else {
            selected.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
        };

        let span = info_span!("run", run_id = %self.summary.run_id);
        async move {
            let started = Instant::now();
            info!(
                phases = ?phases.iter().map(|p| p.name()).collect::<Vec<_>>(),
                dataset_dir = %self.config.dataset_dir.display(),
                "Starting ingestion run"
            );

            for phase in phases {
                let last_completed = self.summary.last_completed();
                if self.cancel.is_cancelled() {
                    return Err(IngestError::Cancelled { last_completed });
                }
                self.check_ready(phase)?;

                let stats = match self
                    .run_phase(phase)
                    .instrument(info_span!("phase", phase = %phase))
                    .await
                {
                    Ok(stats) => stats,
                    Err(e) => {
                        error!(phase = %phase, error = %e, "Phase failed");
                        return Err(IngestError::PhaseFailed {
                            phase,
                            last_completed,
                            source: Box::new(e),
                        });
                    },
                };

                self.completed.insert(phase);
                self.summary.phases.push((phase, stats));
            }

            self.summary.elapsed = started.elapsed();
            info!(
                admitted = self.summary.total_admitted(),
                elapsed_secs = self.summary.elapsed.as_secs_f64(),
                "Ingestion run complete"
            );
            Ok(self.summary)
        }
        .instrument(span)
        .await
    }

    async fn build_validator(&self, phase: Phase) -> Result<ReferenceValidator> {
        let mut validator = ReferenceValidator::new();
        for parent in phase.parents() {
            let ids = self.loader.store().fetch_identities(*parent).await?;
            info!(parent = %parent, identities = ids.len(), "Loaded membership set");
            validator = validator.with_parent(*parent, MembershipSet::new(ids));
        }
        Ok(validator)
    }

    /// Stream one phase's source file to completion
    async fn run_phase(&self, phase: Phase) -> Result<PhaseStats> {
        let started = Instant::now();
        let kind = phase.source();
        let wanted = phase.wanted();
        let path = self.config.source_path(kind);

        let mut reader = EntityStreamReader::open(&path)?.with_limit(self.config.record_limit);
        let size = std::fs::metadata(&path)?.len();
        info!(
            source = %path.display(),
            size = %format_bytes(size),
            "Phase started"
        );

        let validator = self.build_validator(phase).await?;
        let config = &self.config;
        let mut accumulator =
            BatchAccumulator::new(self.loader.clone(), |relation| config.batch_size_for(relation));
        let mut seen: HashSet<String> = HashSet::new();
        let mut stats = PhaseStats::default();
        for relation in phase.relations() {
            stats.relation_mut(*relation);
        }

        let progress = phase_progress(size, phase.name(), self.config.show_progress);

        while let Some(event) = reader.next() {
            let event = event?;
            stats.records_read += 1;
            if stats.records_read % PROGRESS_EVERY == 0 {
                progress.set_position(reader.bytes_read());
            }

            let (line, fields) = match event {
                ReadEvent::Record { line, fields } => (line, fields),
                ReadEvent::Malformed { line, error } => {
                    stats.records_malformed += 1;
                    debug!(line, error = %error, "Skipping unparseable line");
                    continue;
                },
            };

            let normalized = match normalize(kind, &fields, wanted) {
                Ok(normalized) => normalized,
                Err(e) => {
                    stats.records_malformed += 1;
                    debug!(line, error = %e, "Skipping malformed record");
                    continue;
                },
            };

            if phase.skips_duplicate_identities() {
                if let Some(identity) = normalized.identity {
                    if !seen.insert(identity) {
                        stats.records_duplicate += 1;
                        for row in &normalized.rows {
                            let counters = stats.relation_mut(row.relation());
                            counters.candidates += 1;
                            counters.rejected_duplicate += 1;
                        }
                        debug!(line, "Skipping duplicate identity");
                        continue;
                    }
                }
            }

            for relation in normalized.dropped_elements {
                stats.relation_mut(relation).malformed += 1;
            }

            for row in normalized.rows {
                let counters = stats.relation_mut(row.relation());
                counters.candidates += 1;
                if let Err(rejection) = validator.check(&row) {
                    counters.record_rejection(rejection);
                    continue;
                }
                if let Some(flushed) = accumulator.add(row).await? {
                    record_flush(&mut stats, flushed);
                }
            }
        }

        for flushed in accumulator.finish().await? {
            record_flush(&mut stats, flushed);
        }
        progress.finish_and_clear();

        stats.elapsed = started.elapsed();
        info!(
            records_read = stats.records_read,
            records_malformed = stats.records_malformed,
            records_duplicate = stats.records_duplicate,
            batches = stats.batches,
            admitted = stats.admitted(),
            elapsed_secs = stats.elapsed.as_secs_f64(),
            "Phase complete"
        );
        for (relation, counters) in &stats.relations {
            info!(
                relation = %relation,
                candidates = counters.candidates,
                admitted = counters.admitted,
                rejected_reference = counters.rejected_reference,
                rejected_self_reference = counters.rejected_self_reference,
                rejected_duplicate = counters.rejected_duplicate,
                malformed = counters.malformed,
                "Relation counters"
            );
        }
        Ok(stats)
    }
}

fn record_flush(stats: &mut PhaseStats, flushed: Flushed) {
    stats.relation_mut(flushed.relation).admitted += flushed.rows;
    stats.batches += 1;
}
