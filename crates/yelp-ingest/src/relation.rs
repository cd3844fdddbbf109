//! Target relations and their declared column layouts
//!
//! Column lists here must match `migrations/0001_create_tables.sql` exactly; the bulk loader
//! encodes rows in this order and names the columns explicitly in its `COPY` statement.

use serde::Serialize;
use std::fmt;

/// Root entities: relations other relations reference by foreign key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RootEntity {
    Business,
    User,
}

impl RootEntity {
    /// The relation holding this entity's identities
    pub fn relation(self) -> Relation {
        match self {
            RootEntity::Business => Relation::Business,
            RootEntity::User => Relation::User,
        }
    }
}

impl fmt::Display for RootEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootEntity::Business => write!(f, "business"),
            RootEntity::User => write!(f, "user"),
        }
    }
}

/// One of the ten tables the pipeline writes into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Business,
    BusinessCategory,
    BusinessHours,
    BusinessAttribute,
    User,
    UserFriend,
    UserEliteYear,
    Review,
    Tip,
    Checkin,
}

impl Relation {
    pub const ALL: [Relation; 10] = [
        Relation::Business,
        Relation::BusinessCategory,
        Relation::BusinessHours,
        Relation::BusinessAttribute,
        Relation::User,
        Relation::UserFriend,
        Relation::UserEliteYear,
        Relation::Review,
        Relation::Tip,
        Relation::Checkin,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            Relation::Business => "businesses",
            Relation::BusinessCategory => "business_categories",
            Relation::BusinessHours => "business_hours",
            Relation::BusinessAttribute => "business_attributes",
            Relation::User => "users",
            Relation::UserFriend => "user_friends",
            Relation::UserEliteYear => "user_elite_years",
            Relation::Review => "reviews",
            Relation::Tip => "tips",
            Relation::Checkin => "checkins",
        }
    }

    /// Columns written by the loader, in encoding order
    ///
    /// Sequence-assigned keys (`tip_id`, `checkin_id`) are left to the database.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Relation::Business => &[
                "business_id",
                "name",
                "address",
                "city",
                "state",
                "postal_code",
                "latitude",
                "longitude",
                "stars",
                "review_count",
                "is_open",
            ],
            Relation::BusinessCategory => &["business_id", "category"],
            Relation::BusinessHours => &["business_id", "day", "hours"],
            Relation::BusinessAttribute => &["business_id", "attribute_name", "attribute_value"],
            Relation::User => &[
                "user_id",
                "name",
                "review_count",
                "yelping_since",
                "useful",
                "funny",
                "cool",
                "fans",
                "average_stars",
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
            ],
            Relation::UserFriend => &["user_id", "friend_id"],
            Relation::UserEliteYear => &["user_id", "year"],
            Relation::Review => &[
                "review_id",
                "user_id",
                "business_id",
                "stars",
                "date",
                "text",
                "useful",
                "funny",
                "cool",
            ],
            Relation::Tip => &["user_id", "business_id", "text", "date", "compliment_count"],
            Relation::Checkin => &["business_id", "checkin_time"],
        }
    }

    /// Number of leading columns forming the primary key; `None` for sequence-keyed tables
    pub fn key_width(self) -> Option<usize> {
        match self {
            Relation::Business | Relation::User | Relation::Review => Some(1),
            Relation::BusinessCategory
            | Relation::BusinessHours
            | Relation::BusinessAttribute
            | Relation::UserFriend
            | Relation::UserEliteYear => Some(2),
            Relation::Tip | Relation::Checkin => None,
        }
    }

    /// Whether this relation receives tens of millions of rows in a full dataset
    pub fn is_large(self) -> bool {
        matches!(
            self,
            Relation::Review | Relation::Tip | Relation::Checkin | Relation::UserFriend
        )
    }

    /// `COPY` statement for this relation with its explicit column list
    pub fn copy_statement(self) -> String {
        format!(
            "COPY {} ({}) FROM STDIN",
            self.table_name(),
            self.columns().join(", ")
        )
    }

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Small set of relations, used to tell the normalizer which rows a phase wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelationSet(u16);

impl RelationSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn of(relations: &[Relation]) -> Self {
        relations
            .iter()
            .fold(Self::empty(), |set, relation| set.with(*relation))
    }

    pub fn with(self, relation: Relation) -> Self {
        Self(self.0 | relation.bit())
    }

    pub fn contains(self, relation: Relation) -> bool {
        self.0 & relation.bit() != 0
    }

    pub fn iter(self) -> impl Iterator<Item = Relation> {
        Relation::ALL.into_iter().filter(move |r| self.contains(*r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_statement_lists_columns_in_order() {
        assert_eq!(
            Relation::Checkin.copy_statement(),
            "COPY checkins (business_id, checkin_time) FROM STDIN"
        );
        assert!(Relation::Review
            .copy_statement()
            .starts_with("COPY reviews (review_id, user_id, business_id, stars"));
    }

    #[test]
    fn test_synthetic_keys_are_not_written() {
        assert!(!Relation::Tip.columns().contains(&"tip_id"));
        assert!(!Relation::Checkin.columns().contains(&"checkin_id"));
    }

    #[test]
    fn test_key_columns_lead_the_column_list() {
        for relation in Relation::ALL {
            if let Some(width) = relation.key_width() {
                assert!(width <= relation.columns().len(), "{}", relation);
            }
        }
        assert_eq!(Relation::BusinessHours.columns()[..2], ["business_id", "day"]);
        assert_eq!(Relation::Checkin.key_width(), None);
    }

    #[test]
    fn test_relation_set_membership() {
        let set = RelationSet::of(&[Relation::BusinessCategory, Relation::BusinessHours]);
        assert!(set.contains(Relation::BusinessHours));
        assert!(!set.contains(Relation::Business));
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![Relation::BusinessCategory, Relation::BusinessHours]
        );
        assert!(!RelationSet::empty().contains(Relation::Checkin));
    }

    #[test]
    fn test_user_columns_cover_all_compliments() {
        let compliments = Relation::User
            .columns()
            .iter()
            .filter(|c| c.starts_with("compliment_"))
            .count();
        assert_eq!(compliments, 11);
    }
}
