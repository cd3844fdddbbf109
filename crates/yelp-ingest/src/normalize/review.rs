//! Reviews and tips: flat records that reference one user and one business

use serde_json::Value;

use super::coerce::{int_or, present, required_date, required_id};
use super::{MalformedRecord, Normalized};
use crate::reader::RawRecord;
use crate::relation::{Relation, RelationSet};
use crate::rows::{ReviewRow, Row, TipRow};

pub(super) fn normalize_review(
    raw: &RawRecord,
    wanted: RelationSet,
) -> Result<Normalized, MalformedRecord> {
    let review_id = required_id(raw, "review_id")?;
    let user_id = required_id(raw, "user_id")?;
    let business_id = required_id(raw, "business_id")?;
    let stars = review_stars(raw)?;
    let date = required_date(raw, "date")?;

    let mut out = Normalized::with_identity(review_id.clone());
    if wanted.contains(Relation::Review) {
        out.push(Row::Review(ReviewRow {
            review_id,
            user_id,
            business_id,
            stars,
            date,
            text: text(raw),
            useful: int_or(raw, "useful", 0),
            funny: int_or(raw, "funny", 0),
            cool: int_or(raw, "cool", 0),
        }));
    }
    Ok(out)
}

pub(super) fn normalize_tip(raw: &RawRecord, wanted: RelationSet) -> Result<Normalized, MalformedRecord> {
    let user_id = required_id(raw, "user_id")?;
    let business_id = required_id(raw, "business_id")?;
    let date = required_date(raw, "date")?;

    let mut out = Normalized::default();
    if wanted.contains(Relation::Tip) {
        out.push(Row::Tip(TipRow {
            user_id,
            business_id,
            text: text(raw),
            date,
            compliment_count: int_or(raw, "compliment_count", 0),
        }));
    }
    Ok(out)
}

/// Stars are truncated to an integer and must fall in 1..=5
fn review_stars(raw: &RawRecord) -> Result<i16, MalformedRecord> {
    let value = match present(raw, "stars") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
        None => return Err(MalformedRecord::Missing("stars")),
    };
    match value.map(f64::trunc) {
        Some(stars) if (1.0..=5.0).contains(&stars) => Ok(stars as i16),
        _ => Err(MalformedRecord::invalid("stars", "must be between 1 and 5")),
    }
}

/// Free text keeps its content verbatim; only a missing value becomes empty
fn text(raw: &RawRecord) -> String {
    match raw.get("text") {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}
