//! Moderation strikes, numbered per user.

use crate::entity::{Entity, EntityKind, KeyAssignment, ScopedKey};
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStrikeFk {
    User,
}

/// A strike given to a user. `strike_id` identifies the strike within the
/// user's scope; it is not a running count of the user's strikes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStrike {
    pub user_id: u64,
    pub strike_id: u64,
    pub reason: String,
    pub author_id: u64,
    #[serde(rename = "timestamp")]
    pub created_at: Timestamp,
    #[serde(rename = "editedTimestamp")]
    pub edited_at: Timestamp,
}

impl UserStrike {
    pub fn new(user_id: u64, strike_id: u64, reason: impl Into<String>, author_id: u64) -> Self {
        let now = Timestamp::now();
        Self {
            user_id,
            strike_id,
            reason: reason.into(),
            author_id,
            created_at: now,
            edited_at: now,
        }
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.reason = reason.into();
        self.edited_at = Timestamp::now();
    }
}

impl Entity for UserStrike {
    const KIND: EntityKind = EntityKind::UserStrike;
    const KEY_ASSIGNMENT: KeyAssignment = KeyAssignment::Natural;

    type Key = ScopedKey;
    type ForeignKey = UserStrikeFk;

    fn key(&self) -> ScopedKey {
        ScopedKey::new(self.user_id, self.strike_id)
    }

    fn foreign_key(&self, fk: UserStrikeFk) -> Option<u64> {
        match fk {
            UserStrikeFk::User => Some(self.user_id),
        }
    }
}

/// Number of strikes currently held by a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStrikeCount {
    pub user_id: u64,
    pub count: usize,
}
