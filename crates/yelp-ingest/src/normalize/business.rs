use serde_json::Value;
use std::collections::HashSet;

use super::coerce::{
    bool_or, int_or, list_elements, object, opt_f64, opt_rating, opt_string, required_id,
};
use super::{AttributeValue, MalformedRecord, Normalized};
use crate::reader::RawRecord;
use crate::relation::{Relation, RelationSet};
use crate::rows::{BusinessAttributeRow, BusinessCategoryRow, BusinessHoursRow, BusinessRow, Row};

/// Day names accepted as `hours` keys
pub const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

pub(super) fn normalize(raw: &RawRecord, wanted: RelationSet) -> Result<Normalized, MalformedRecord> {
    let business_id = required_id(raw, "business_id")?;
    let mut out = Normalized::with_identity(business_id.clone());

    if wanted.contains(Relation::Business) {
        out.push(Row::Business(BusinessRow {
            business_id: business_id.clone(),
            name: opt_string(raw, "name"),
            address: opt_string(raw, "address"),
            city: opt_string(raw, "city"),
            state: opt_string(raw, "state"),
            postal_code: opt_string(raw, "postal_code"),
            latitude: opt_f64(raw, "latitude"),
            longitude: opt_f64(raw, "longitude"),
            stars: opt_rating(raw, "stars"),
            review_count: int_or(raw, "review_count", 0),
            is_open: bool_or(raw, "is_open", true),
        }));
    }

    if wanted.contains(Relation::BusinessCategory) {
        for category in list_elements(raw, "categories") {
            out.push(Row::BusinessCategory(BusinessCategoryRow {
                business_id: business_id.clone(),
                category,
            }));
        }
    }

    if wanted.contains(Relation::BusinessHours) {
        if let Some(hours) = object(raw, "hours") {
            // One row per canonical weekday; later spellings of the same day are dropped
            let mut days: HashSet<&str> = HashSet::new();
            for (day, value) in hours {
                let Some(day) = WEEKDAYS.iter().find(|d| d.eq_ignore_ascii_case(day.trim())) else {
                    out.drop_element(Relation::BusinessHours);
                    continue;
                };
                let hours = match value {
                    Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
                    Value::Null | Value::String(_) => continue,
                    other => other.to_string(),
                };
                if !days.insert(*day) {
                    out.drop_element(Relation::BusinessHours);
                    continue;
                }
                out.push(Row::BusinessHours(BusinessHoursRow {
                    business_id: business_id.clone(),
                    day: (*day).to_string(),
                    hours,
                }));
            }
        }
    }

    if wanted.contains(Relation::BusinessAttribute) {
        if let Some(attributes) = object(raw, "attributes") {
            let mut names: HashSet<&str> = HashSet::new();
            for (name, value) in attributes {
                let name = name.trim();
                if name.is_empty() || !names.insert(name) {
                    out.drop_element(Relation::BusinessAttribute);
                    continue;
                }
                out.push(Row::BusinessAttribute(BusinessAttributeRow {
                    business_id: business_id.clone(),
                    attribute_name: name.to_string(),
                    attribute_value: AttributeValue::from_json(value).map(AttributeValue::into_text),
                }));
            }
        }
    }

    Ok(out)
}
