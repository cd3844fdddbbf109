//! Record normalization
//!
//! Turns one raw source record into typed candidate rows across the relations the current
//! phase wants. The whole record is rejected when a mandatory field is unusable; a defective
//! element inside an exploded field drops only that element.

mod business;
mod checkin;
pub mod coerce;
mod review;
mod user;

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::reader::RawRecord;
use crate::relation::{Relation, RelationSet};
use crate::rows::Row;

pub use business::WEEKDAYS;
pub use user::{ELITE_YEAR_MAX, ELITE_YEAR_MIN};

/// Kind of source record, one per input file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Business,
    User,
    Review,
    Tip,
    Checkin,
}

impl EntityKind {
    /// Field carrying the record's own identity, if the kind has one
    pub fn identity_field(self) -> Option<&'static str> {
        match self {
            EntityKind::Business => Some("business_id"),
            EntityKind::User => Some("user_id"),
            EntityKind::Review => Some("review_id"),
            EntityKind::Tip | EntityKind::Checkin => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Business => "business",
            EntityKind::User => "user",
            EntityKind::Review => "review",
            EntityKind::Tip => "tip",
            EntityKind::Checkin => "checkin",
        };
        f.write_str(name)
    }
}

/// Why a whole record was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedRecord {
    #[error("missing mandatory field '{0}'")]
    Missing(&'static str),

    #[error("invalid field '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl MalformedRecord {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Dynamic attribute value, resolved to text before it leaves the normalizer
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Text(String),
    Structured(Value),
}

impl AttributeValue {
    /// `None` for JSON null
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(AttributeValue::Text(s.clone())),
            Value::Bool(_) | Value::Number(_) => Some(AttributeValue::Text(value.to_string())),
            Value::Object(_) | Value::Array(_) => Some(AttributeValue::Structured(value.clone())),
        }
    }

    /// Canonical text: strings verbatim, structured values as JSON with sorted keys
    pub fn into_text(self) -> String {
        match self {
            AttributeValue::Text(s) => s,
            AttributeValue::Structured(v) => sorted(v).to_string(),
        }
    }
}

fn sorted(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sorted(v))).collect())
        },
        Value::Array(items) => Value::Array(items.into_iter().map(sorted).collect()),
        other => other,
    }
}

/// Output of normalizing one record
#[derive(Debug, Default)]
pub struct Normalized {
    /// The record's own identity (business, user or review id)
    pub identity: Option<String>,
    pub rows: Vec<Row>,
    /// One entry per exploded element dropped as defective
    pub dropped_elements: Vec<Relation>,
}

impl Normalized {
    fn with_identity(identity: String) -> Self {
        Self {
            identity: Some(identity),
            ..Self::default()
        }
    }

    fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    fn drop_element(&mut self, relation: Relation) {
        self.dropped_elements.push(relation);
    }
}

/// Normalize one raw record of `kind`, producing rows only for relations in `wanted`
pub fn normalize(
    kind: EntityKind,
    raw: &RawRecord,
    wanted: RelationSet,
) -> Result<Normalized, MalformedRecord> {
    match kind {
        EntityKind::Business => business::normalize(raw, wanted),
        EntityKind::User => user::normalize(raw, wanted),
        EntityKind::Review => review::normalize_review(raw, wanted),
        EntityKind::Tip => review::normalize_tip(raw, wanted),
        EntityKind::Checkin => checkin::normalize(raw, wanted),
    }
}
