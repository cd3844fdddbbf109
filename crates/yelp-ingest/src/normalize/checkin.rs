use super::coerce::{dedup, list_elements, parse_timestamp, required_id};
use super::{MalformedRecord, Normalized};
use crate::reader::RawRecord;
use crate::relation::{Relation, RelationSet};
use crate::rows::{CheckinRow, Row};

/// One row per distinct timestamp in the comma-joined `date` field
pub(super) fn normalize(raw: &RawRecord, wanted: RelationSet) -> Result<Normalized, MalformedRecord> {
    let business_id = required_id(raw, "business_id")?;
    let mut out = Normalized::default();
    if !wanted.contains(Relation::Checkin) {
        return Ok(out);
    }

    let mut times = Vec::new();
    for element in list_elements(raw, "date") {
        match parse_timestamp(&element) {
            Some(time) => times.push(time),
            None => out.drop_element(Relation::Checkin),
        }
    }
    for checkin_time in dedup(times) {
        out.push(Row::Checkin(CheckinRow {
            business_id: business_id.clone(),
            checkin_time,
        }));
    }
    Ok(out)
}
