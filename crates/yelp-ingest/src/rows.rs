//! Typed rows, one struct per target relation
//!
//! Rows are produced by the normalizer, filtered by the validator, buffered by the
//! accumulator and encoded by the loader. Nothing dynamically typed survives into this module.

use chrono::{NaiveDate, NaiveDateTime};

use crate::copy::CopyEncoder;
use crate::relation::{Relation, RootEntity};

#[derive(Debug, Clone, PartialEq)]
pub struct BusinessRow {
    pub business_id: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub stars: Option<f64>,
    pub review_count: i32,
    pub is_open: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessCategoryRow {
    pub business_id: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessHoursRow {
    pub business_id: String,
    pub day: String,
    pub hours: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessAttributeRow {
    pub business_id: String,
    pub attribute_name: String,
    /// Canonical text form; `None` when the source value was null
    pub attribute_value: Option<String>,
}

/// The eleven per-category compliment counters, in column order
pub const COMPLIMENT_FIELDS: [&str; 11] = [
    "compliment_hot",
    "compliment_more",
    "compliment_profile",
    "compliment_cute",
    "compliment_list",
    "compliment_note",
    "compliment_plain",
    "compliment_cool",
    "compliment_funny",
    "compliment_writer",
    "compliment_photos",
];

#[derive(Debug, Clone, PartialEq)]
pub struct UserRow {
    pub user_id: String,
    pub name: Option<String>,
    pub review_count: i32,
    pub yelping_since: Option<NaiveDate>,
    pub useful: i32,
    pub funny: i32,
    pub cool: i32,
    pub fans: i32,
    pub average_stars: Option<f64>,
    /// Indexed like [`COMPLIMENT_FIELDS`]
    pub compliments: [i32; 11],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFriendRow {
    pub user_id: String,
    pub friend_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEliteYearRow {
    pub user_id: String,
    pub year: i16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRow {
    pub review_id: String,
    pub user_id: String,
    pub business_id: String,
    pub stars: i16,
    pub date: NaiveDate,
    pub text: String,
    pub useful: i32,
    pub funny: i32,
    pub cool: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipRow {
    pub user_id: String,
    pub business_id: String,
    pub text: String,
    pub date: NaiveDate,
    pub compliment_count: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinRow {
    pub business_id: String,
    pub checkin_time: NaiveDateTime,
}

/// A candidate row for any relation
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Business(BusinessRow),
    BusinessCategory(BusinessCategoryRow),
    BusinessHours(BusinessHoursRow),
    BusinessAttribute(BusinessAttributeRow),
    User(UserRow),
    UserFriend(UserFriendRow),
    UserEliteYear(UserEliteYearRow),
    Review(ReviewRow),
    Tip(TipRow),
    Checkin(CheckinRow),
}

/// A foreign-key reference carried by a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey<'a> {
    pub parent: RootEntity,
    pub id: &'a str,
}

impl<'a> ForeignKey<'a> {
    fn business(id: &'a str) -> Self {
        Self {
            parent: RootEntity::Business,
            id,
        }
    }

    fn user(id: &'a str) -> Self {
        Self {
            parent: RootEntity::User,
            id,
        }
    }
}

impl Row {
    pub fn relation(&self) -> Relation {
        match self {
            Row::Business(_) => Relation::Business,
            Row::BusinessCategory(_) => Relation::BusinessCategory,
            Row::BusinessHours(_) => Relation::BusinessHours,
            Row::BusinessAttribute(_) => Relation::BusinessAttribute,
            Row::User(_) => Relation::User,
            Row::UserFriend(_) => Relation::UserFriend,
            Row::UserEliteYear(_) => Relation::UserEliteYear,
            Row::Review(_) => Relation::Review,
            Row::Tip(_) => Relation::Tip,
            Row::Checkin(_) => Relation::Checkin,
        }
    }

    /// Foreign keys that must resolve before the row can be admitted (at most two)
    pub fn foreign_keys(&self) -> [Option<ForeignKey<'_>>; 2] {
        match self {
            Row::Business(_) | Row::User(_) => [None, None],
            Row::BusinessCategory(r) => [Some(ForeignKey::business(&r.business_id)), None],
            Row::BusinessHours(r) => [Some(ForeignKey::business(&r.business_id)), None],
            Row::BusinessAttribute(r) => [Some(ForeignKey::business(&r.business_id)), None],
            Row::UserFriend(r) => [
                Some(ForeignKey::user(&r.user_id)),
                Some(ForeignKey::user(&r.friend_id)),
            ],
            Row::UserEliteYear(r) => [Some(ForeignKey::user(&r.user_id)), None],
            Row::Review(r) => [
                Some(ForeignKey::user(&r.user_id)),
                Some(ForeignKey::business(&r.business_id)),
            ],
            Row::Tip(r) => [
                Some(ForeignKey::user(&r.user_id)),
                Some(ForeignKey::business(&r.business_id)),
            ],
            Row::Checkin(r) => [Some(ForeignKey::business(&r.business_id)), None],
        }
    }

    /// Append this row to a `COPY` payload in the relation's declared column order
    pub fn encode(&self, enc: &mut CopyEncoder) {
        match self {
            Row::Business(r) => {
                enc.text(&r.business_id)
                    .opt_text(r.name.as_deref())
                    .opt_text(r.address.as_deref())
                    .opt_text(r.city.as_deref())
                    .opt_text(r.state.as_deref())
                    .opt_text(r.postal_code.as_deref())
                    .opt_value(r.latitude)
                    .opt_value(r.longitude)
                    .opt_value(r.stars)
                    .value(r.review_count)
                    .boolean(r.is_open);
            },
            Row::BusinessCategory(r) => {
                enc.text(&r.business_id).text(&r.category);
            },
            Row::BusinessHours(r) => {
                enc.text(&r.business_id).text(&r.day).text(&r.hours);
            },
            Row::BusinessAttribute(r) => {
                enc.text(&r.business_id)
                    .text(&r.attribute_name)
                    .opt_text(r.attribute_value.as_deref());
            },
            Row::User(r) => {
                enc.text(&r.user_id)
                    .opt_text(r.name.as_deref())
                    .value(r.review_count)
                    .opt_value(r.yelping_since)
                    .value(r.useful)
                    .value(r.funny)
                    .value(r.cool)
                    .value(r.fans)
                    .opt_value(r.average_stars);
                for count in r.compliments {
                    enc.value(count);
                }
            },
            Row::UserFriend(r) => {
                enc.text(&r.user_id).text(&r.friend_id);
            },
            Row::UserEliteYear(r) => {
                enc.text(&r.user_id).value(r.year);
            },
            Row::Review(r) => {
                enc.text(&r.review_id)
                    .text(&r.user_id)
                    .text(&r.business_id)
                    .value(r.stars)
                    .value(r.date)
                    .text(&r.text)
                    .value(r.useful)
                    .value(r.funny)
                    .value(r.cool);
            },
            Row::Tip(r) => {
                enc.text(&r.user_id)
                    .text(&r.business_id)
                    .text(&r.text)
                    .value(r.date)
                    .value(r.compliment_count);
            },
            Row::Checkin(r) => {
                enc.text(&r.business_id)
                    .value(r.checkin_time.format("%Y-%m-%d %H:%M:%S"));
            },
        }
        enc.end_row();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy::decode_line;

    fn encoded(row: &Row) -> Vec<Option<String>> {
        let mut enc = CopyEncoder::new();
        row.encode(&mut enc);
        let text = String::from_utf8(enc.into_bytes()).unwrap();
        decode_line(text.trim_end_matches('\n'))
    }

    fn sample_user() -> UserRow {
        UserRow {
            user_id: "u1".into(),
            name: Some("Walker".into()),
            review_count: 585,
            yelping_since: NaiveDate::from_ymd_opt(2007, 1, 25),
            useful: 7217,
            funny: 1259,
            cool: 5994,
            fans: 267,
            average_stars: Some(3.91),
            compliments: [1; 11],
        }
    }

    #[test]
    fn test_every_row_encodes_its_declared_column_count() {
        let date = NaiveDate::from_ymd_opt(2018, 7, 7).unwrap();
        let rows = vec![
            Row::Business(BusinessRow {
                business_id: "b1".into(),
                name: None,
                address: None,
                city: Some("Tucson".into()),
                state: Some("AZ".into()),
                postal_code: None,
                latitude: Some(32.2),
                longitude: Some(-110.9),
                stars: Some(4.5),
                review_count: 10,
                is_open: true,
            }),
            Row::BusinessCategory(BusinessCategoryRow {
                business_id: "b1".into(),
                category: "Mexican".into(),
            }),
            Row::BusinessHours(BusinessHoursRow {
                business_id: "b1".into(),
                day: "Monday".into(),
                hours: "8:0-18:0".into(),
            }),
            Row::BusinessAttribute(BusinessAttributeRow {
                business_id: "b1".into(),
                attribute_name: "WiFi".into(),
                attribute_value: None,
            }),
            Row::User(sample_user()),
            Row::UserFriend(UserFriendRow {
                user_id: "u1".into(),
                friend_id: "u2".into(),
            }),
            Row::UserEliteYear(UserEliteYearRow {
                user_id: "u1".into(),
                year: 2012,
            }),
            Row::Review(ReviewRow {
                review_id: "r1".into(),
                user_id: "u1".into(),
                business_id: "b1".into(),
                stars: 5,
                date,
                text: "ok".into(),
                useful: 0,
                funny: 0,
                cool: 0,
            }),
            Row::Tip(TipRow {
                user_id: "u1".into(),
                business_id: "b1".into(),
                text: "try it".into(),
                date,
                compliment_count: 0,
            }),
            Row::Checkin(CheckinRow {
                business_id: "b1".into(),
                checkin_time: date.and_hms_opt(19, 49, 16).unwrap(),
            }),
        ];

        for row in &rows {
            assert_eq!(
                encoded(row).len(),
                row.relation().columns().len(),
                "column count mismatch for {}",
                row.relation()
            );
        }
    }

    #[test]
    fn test_user_row_encodes_compliments_last() {
        let fields = encoded(&Row::User(sample_user()));
        assert_eq!(fields[0].as_deref(), Some("u1"));
        assert_eq!(fields[3].as_deref(), Some("2007-01-25"));
        assert_eq!(fields[8].as_deref(), Some("3.91"));
        assert!(fields[9..].iter().all(|f| f.as_deref() == Some("1")));
    }

    #[test]
    fn test_checkin_timestamp_format() {
        let time = NaiveDate::from_ymd_opt(2016, 4, 26)
            .unwrap()
            .and_hms_opt(19, 49, 16)
            .unwrap();
        let fields = encoded(&Row::Checkin(CheckinRow {
            business_id: "b1".into(),
            checkin_time: time,
        }));
        assert_eq!(fields[1].as_deref(), Some("2016-04-26 19:49:16"));
    }

    #[test]
    fn test_review_references_both_parents() {
        let row = Row::Review(ReviewRow {
            review_id: "r1".into(),
            user_id: "u1".into(),
            business_id: "b1".into(),
            stars: 3,
            date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
            text: String::new(),
            useful: 0,
            funny: 0,
            cool: 0,
        });
        let keys: Vec<_> = row.foreign_keys().into_iter().flatten().collect();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].parent, RootEntity::User);
        assert_eq!(keys[1].parent, RootEntity::Business);
        assert_eq!(keys[1].id, "b1");
    }
}
