//! The narrow store facade the core depends on.
//!
//! Every persisted kind implements [`Entity`]; a backend implements
//! [`EntityStore`] once per kind it holds. Existence is always reported
//! explicitly (`Option` / `bool`) and never folded into the error channel.

use crate::jsonl::JsonlError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminator for the persisted entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    BuildRecord,
    UserStrike,
    GuildTicket,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::BuildRecord => "build_record",
            EntityKind::UserStrike => "user_strike",
            EntityKind::GuildTicket => "guild_ticket",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a new row obtains its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAssignment {
    /// The caller supplies the full key; inserting an existing key fails.
    Natural,
    /// The store hands out a fresh integer id that is never reused.
    Surrogate,
}

/// Composite key of a row numbered inside a scope (user strikes, guild tickets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScopedKey {
    pub scope: u64,
    pub seq: u64,
}

impl ScopedKey {
    pub fn new(scope: u64, seq: u64) -> Self {
        Self { scope, seq }
    }
}

impl fmt::Display for ScopedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope, self.seq)
    }
}

/// A persisted row type.
pub trait Entity: Clone + fmt::Debug {
    const KIND: EntityKind;
    const KEY_ASSIGNMENT: KeyAssignment;

    type Key: Clone + Ord + fmt::Debug + fmt::Display;
    type ForeignKey: Copy + fmt::Debug;

    fn key(&self) -> Self::Key;

    /// Value of one foreign-key column, `None` when the column is unused for this row.
    fn foreign_key(&self, fk: Self::ForeignKey) -> Option<u64>;

    /// Called by the store on insert for [`KeyAssignment::Surrogate`] kinds.
    fn assign_surrogate_id(&mut self, _id: u64) {}
}

/// Get / query / insert / update / delete over one entity kind.
pub trait EntityStore<E: Entity> {
    fn get(&self, key: &E::Key) -> Result<Option<E>, StoreError>;

    /// Every row whose `fk` column equals `value`, in key order.
    fn query_by_foreign_key(&self, fk: E::ForeignKey, value: u64) -> Result<Vec<E>, StoreError>;

    /// Persist a new row and return its key.
    fn insert(&mut self, entity: E) -> Result<E::Key, StoreError>;

    /// Replace the row at `key`. Returns `false` when no such row exists.
    fn update(&mut self, key: &E::Key, entity: E) -> Result<bool, StoreError>;

    /// Remove the row at `key`. Returns `false` when no such row exists.
    fn delete(&mut self, key: &E::Key) -> Result<bool, StoreError>;
}

/// Errors raised by a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate {kind} key: {key}")]
    DuplicateKey { kind: EntityKind, key: String },

    #[error("{kind} update for key {key} carries a different key ({actual})")]
    KeyMismatch {
        kind: EntityKind,
        key: String,
        actual: String,
    },

    #[error("{kind} id space exhausted")]
    IdSpaceExhausted { kind: EntityKind },

    #[error(transparent)]
    Jsonl(#[from] JsonlError),
}

impl StoreError {
    pub fn duplicate<E: Entity>(key: &E::Key) -> Self {
        Self::DuplicateKey {
            kind: E::KIND,
            key: key.to_string(),
        }
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }
}
