use super::coerce::{
    dedup, int_or, list_elements, opt_date, opt_rating, opt_string, required_id,
};
use super::{MalformedRecord, Normalized};
use crate::reader::RawRecord;
use crate::relation::{Relation, RelationSet};
use crate::rows::{Row, UserEliteYearRow, UserFriendRow, UserRow, COMPLIMENT_FIELDS};

pub const ELITE_YEAR_MIN: i16 = 2004;
pub const ELITE_YEAR_MAX: i16 = 2099;

pub(super) fn normalize(raw: &RawRecord, wanted: RelationSet) -> Result<Normalized, MalformedRecord> {
    let user_id = required_id(raw, "user_id")?;
    let mut out = Normalized::with_identity(user_id.clone());

    if wanted.contains(Relation::User) {
        let mut compliments = [0; 11];
        for (slot, field) in compliments.iter_mut().zip(COMPLIMENT_FIELDS) {
            *slot = int_or(raw, field, 0);
        }
        out.push(Row::User(UserRow {
            user_id: user_id.clone(),
            name: opt_string(raw, "name"),
            review_count: int_or(raw, "review_count", 0),
            yelping_since: opt_date(raw, "yelping_since"),
            useful: int_or(raw, "useful", 0),
            funny: int_or(raw, "funny", 0),
            cool: int_or(raw, "cool", 0),
            fans: int_or(raw, "fans", 0),
            average_stars: opt_rating(raw, "average_stars"),
            compliments,
        }));
    }

    // Edges are stored as listed; self references are left to the validator
    if wanted.contains(Relation::UserFriend) {
        for friend_id in list_elements(raw, "friends") {
            out.push(Row::UserFriend(UserFriendRow {
                user_id: user_id.clone(),
                friend_id,
            }));
        }
    }

    if wanted.contains(Relation::UserEliteYear) {
        let mut years = Vec::new();
        for element in list_elements(raw, "elite") {
            match parse_elite_year(&element) {
                Some(year) => years.push(year),
                None => out.drop_element(Relation::UserEliteYear),
            }
        }
        for year in dedup(years) {
            out.push(Row::UserEliteYear(UserEliteYearRow {
                user_id: user_id.clone(),
                year,
            }));
        }
    }

    Ok(out)
}

fn parse_elite_year(element: &str) -> Option<i16> {
    element
        .parse::<i16>()
        .ok()
        .filter(|year| (ELITE_YEAR_MIN..=ELITE_YEAR_MAX).contains(year))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn raw(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    fn details() -> RelationSet {
        RelationSet::of(&[Relation::UserFriend, Relation::UserEliteYear])
    }

    fn count(out: &Normalized, relation: Relation) -> usize {
        out.rows.iter().filter(|r| r.relation() == relation).count()
    }

    #[test]
    fn test_user_row_copies_counters() {
        let out = normalize(
            &raw(json!({
                "user_id": "u1",
                "review_count": 585,
                "yelping_since": "2007-01-25 16:47:26",
                "average_stars": 3.91,
                "compliment_photos": 7,
                "compliment_hot": "12"
            })),
            RelationSet::of(&[Relation::User]),
        )
        .unwrap();
        match &out.rows[0] {
            Row::User(u) => {
                assert_eq!(u.review_count, 585);
                assert_eq!(u.yelping_since.unwrap().to_string(), "2007-01-25");
                assert_eq!(u.compliments[0], 12);
                assert_eq!(u.compliments[10], 7);
                assert_eq!(u.compliments[1], 0);
            },
            other => panic!("unexpected row {:?}", other),
        }
    }

    #[test]
    fn test_average_stars_outside_rating_range_is_null() {
        let out = normalize(
            &raw(json!({"user_id": "u1", "average_stars": 12.5})),
            RelationSet::of(&[Relation::User]),
        )
        .unwrap();
        match &out.rows[0] {
            Row::User(u) => assert_eq!(u.average_stars, None),
            other => panic!("unexpected row {:?}", other),
        }
    }

    #[test]
    fn test_friends_from_string_and_array() {
        let from_string = normalize(
            &raw(json!({"user_id": "u1", "friends": "u2, u3, u2"})),
            details(),
        )
        .unwrap();
        assert_eq!(count(&from_string, Relation::UserFriend), 2);

        let from_array = normalize(
            &raw(json!({"user_id": "u1", "friends": ["u2", "u3"]})),
            details(),
        )
        .unwrap();
        assert_eq!(count(&from_array, Relation::UserFriend), 2);

        let none = normalize(&raw(json!({"user_id": "u1", "friends": "None"})), details()).unwrap();
        assert_eq!(count(&none, Relation::UserFriend), 0);
    }

    #[test]
    fn test_elite_years_drop_out_of_range_elements() {
        let out = normalize(
            &raw(json!({"user_id": "u1", "elite": "2010,2011,20,20,abc,2011"})),
            details(),
        )
        .unwrap();
        assert_eq!(count(&out, Relation::UserEliteYear), 2);
        // "20" collapses during explosion, then fails the range check once
        assert_eq!(out.dropped_elements.len(), 2);
        assert!(out
            .dropped_elements
            .iter()
            .all(|r| *r == Relation::UserEliteYear));
    }

    #[test]
    fn test_elite_years_from_array_of_numbers() {
        let out = normalize(
            &raw(json!({"user_id": "u1", "elite": [2015, 2016, 2003]})),
            details(),
        )
        .unwrap();
        assert_eq!(count(&out, Relation::UserEliteYear), 2);
        assert_eq!(out.dropped_elements, vec![Relation::UserEliteYear]);
    }

    proptest! {
        #[test]
        fn prop_friend_rows_match_distinct_ids(ids in prop::collection::vec("[a-z]{1,4}", 0..20)) {
            let joined = ids.join(", ");
            let out = normalize(&raw(json!({"user_id": "me", "friends": joined})), details()).unwrap();
            let distinct: std::collections::HashSet<_> = ids.iter().collect();
            prop_assert_eq!(count(&out, Relation::UserFriend), distinct.len());
        }
    }
}
