//! Run counters and the final summary

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

use crate::coordinator::Phase;
use crate::relation::Relation;
use crate::validator::Rejection;

/// Counters for one relation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelationStats {
    /// Rows produced by the normalizer
    pub candidates: u64,
    /// Rows handed to the loader and committed
    pub admitted: u64,
    pub rejected_reference: u64,
    pub rejected_self_reference: u64,
    /// Rows whose record repeated an identity already seen in the phase
    pub rejected_duplicate: u64,
    /// Elements dropped inside otherwise valid records
    pub malformed: u64,
}

impl RelationStats {
    pub fn rejected(&self) -> u64 {
        self.rejected_reference + self.rejected_self_reference + self.rejected_duplicate
    }

    pub fn record_rejection(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::MissingParent(_) => self.rejected_reference += 1,
            Rejection::SelfReference => self.rejected_self_reference += 1,
        }
    }

    fn merge(&mut self, other: &RelationStats) {
        self.candidates += other.candidates;
        self.admitted += other.admitted;
        self.rejected_reference += other.rejected_reference;
        self.rejected_self_reference += other.rejected_self_reference;
        self.rejected_duplicate += other.rejected_duplicate;
        self.malformed += other.malformed;
    }
}

/// Counters for one completed phase
#[derive(Debug, Clone, Default, Serialize)]
pub struct PhaseStats {
    pub records_read: u64,
    pub records_malformed: u64,
    /// Records skipped because their identity already appeared in this phase
    pub records_duplicate: u64,
    pub batches: u64,
    pub relations: BTreeMap<Relation, RelationStats>,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl PhaseStats {
    pub fn relation_mut(&mut self, relation: Relation) -> &mut RelationStats {
        self.relations.entry(relation).or_default()
    }

    pub fn relation(&self, relation: Relation) -> RelationStats {
        self.relations.get(&relation).copied().unwrap_or_default()
    }

    pub fn admitted(&self) -> u64 {
        self.relations.values().map(|s| s.admitted).sum()
    }
}

/// Final report of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// Completed phases in execution order
    pub phases: Vec<(Phase, PhaseStats)>,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            phases: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn last_completed(&self) -> Option<Phase> {
        self.phases.last().map(|(phase, _)| *phase)
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseStats> {
        self.phases.iter().find(|(p, _)| *p == phase).map(|(_, s)| s)
    }

    /// Cumulative counters per relation across all phases
    pub fn relations(&self) -> BTreeMap<Relation, RelationStats> {
        let mut totals: BTreeMap<Relation, RelationStats> = BTreeMap::new();
        for (_, phase) in &self.phases {
            for (relation, stats) in &phase.relations {
                totals.entry(*relation).or_default().merge(stats);
            }
        }
        totals
    }

    pub fn relation(&self, relation: Relation) -> RelationStats {
        self.relations().get(&relation).copied().unwrap_or_default()
    }

    pub fn total_admitted(&self) -> u64 {
        self.phases.iter().map(|(_, s)| s.admitted()).sum()
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::RootEntity;

    #[test]
    fn test_relation_totals_merge_across_phases() {
        let mut summary = RunSummary::new(Uuid::new_v4());

        let mut reviews = PhaseStats::default();
        reviews.relation_mut(Relation::Review).candidates = 10;
        reviews.relation_mut(Relation::Review).admitted = 8;
        reviews
            .relation_mut(Relation::Review)
            .record_rejection(Rejection::MissingParent(RootEntity::User));
        summary.phases.push((Phase::Reviews, reviews));

        let mut more = PhaseStats::default();
        more.relation_mut(Relation::Review).admitted = 2;
        summary.phases.push((Phase::Tips, more));

        let totals = summary.relation(Relation::Review);
        assert_eq!(totals.admitted, 10);
        assert_eq!(totals.rejected_reference, 1);
        assert_eq!(summary.total_admitted(), 10);
        assert_eq!(summary.last_completed(), Some(Phase::Tips));
    }

    #[test]
    fn test_summary_serializes_to_json() {
        let summary = RunSummary::new(Uuid::nil());
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["elapsed"], 0.0);
        assert!(json["phases"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_summary_json_names_phases_and_relations() {
        let mut summary = RunSummary::new(Uuid::nil());
        let mut stats = PhaseStats::default();
        stats.relation_mut(Relation::BusinessHours).malformed = 3;
        summary.phases.push((Phase::BusinessDetails, stats));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["phases"][0][0], "business_details");
        assert_eq!(json["phases"][0][1]["relations"]["business_hours"]["malformed"], 3);
    }
}
