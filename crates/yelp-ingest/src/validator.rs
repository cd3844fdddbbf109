//! In-memory referential integrity checks
//!
//! A [`ReferenceValidator`] is built once per phase from one bulk read per parent type and
//! answers membership queries without touching the database.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::relation::RootEntity;
use crate::rows::Row;

/// Committed identities of one root entity
#[derive(Debug, Default, Clone)]
pub struct MembershipSet {
    ids: HashSet<String>,
}

impl MembershipSet {
    pub fn new(ids: HashSet<String>) -> Self {
        Self { ids }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<String> for MembershipSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Why a candidate row was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingParent(RootEntity),
    SelfReference,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MissingParent(parent) => write!(f, "unknown {} id", parent),
            Rejection::SelfReference => write!(f, "self reference"),
        }
    }
}

/// Membership sets for the parents a phase needs
#[derive(Debug, Default)]
pub struct ReferenceValidator {
    parents: BTreeMap<RootEntity, MembershipSet>,
}

impl ReferenceValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(mut self, entity: RootEntity, members: MembershipSet) -> Self {
        self.parents.insert(entity, members);
        self
    }

    pub fn parent_len(&self, entity: RootEntity) -> usize {
        self.parents.get(&entity).map_or(0, MembershipSet::len)
    }

    /// Admit or reject one candidate row
    ///
    /// Every foreign key is checked on its own; the row passes only if all of them resolve.
    /// A parent type that was not loaded for this phase resolves nothing.
    pub fn check(&self, row: &Row) -> Result<(), Rejection> {
        if let Row::UserFriend(friend) = row {
            if friend.user_id == friend.friend_id {
                return Err(Rejection::SelfReference);
            }
        }

        for key in row.foreign_keys().into_iter().flatten() {
            let known = self
                .parents
                .get(&key.parent)
                .is_some_and(|set| set.contains(key.id));
            if !known {
                return Err(Rejection::MissingParent(key.parent));
            }
        }
        Ok(())
    }
}
