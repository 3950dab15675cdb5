//! Per-scope monotonic identifiers: strike numbers per user, ticket numbers per guild.
//!
//! The next identifier is one past the highest identifier still present in
//! the scope, or `0` for an empty scope. Allocation is a pure read; callers
//! pair it with an insert under whatever atomicity their store offers, and
//! the store's key uniqueness turns a lost race into `DuplicateSequenceId`.

use recordbook_store::{
    Entity, EntityStore, GuildTicketChannel, GuildTicketFk, StoreError, UserStrike, UserStrikeFk,
};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    /// Strikes, numbered per user.
    User,
    /// Tickets, numbered per guild.
    Guild,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::User => "user",
            ScopeKind::Guild => "guild",
        }
    }
}

impl FromStr for ScopeKind {
    type Err = SequenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(ScopeKind::User),
            "guild" => Ok(ScopeKind::Guild),
            "" => Err(SequenceError::InvalidScope("scope kind is required".to_string())),
            other => Err(SequenceError::InvalidScope(format!(
                "unknown scope kind `{other}` (expected user or guild)"
            ))),
        }
    }
}

/// A `(kind, key)` pair over which sequence identifiers are unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SequenceScope {
    pub kind: ScopeKind,
    pub key: u64,
}

impl SequenceScope {
    pub fn user(user_id: u64) -> Self {
        Self {
            kind: ScopeKind::User,
            key: user_id,
        }
    }

    pub fn guild(guild_id: u64) -> Self {
        Self {
            kind: ScopeKind::Guild,
            key: guild_id,
        }
    }

    /// Parse a scope from its textual kind and decimal key.
    pub fn parse(kind: &str, key: &str) -> Result<Self, SequenceError> {
        let kind: ScopeKind = kind.parse()?;
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(SequenceError::InvalidScope(format!(
                "{} scope key is required",
                kind.as_str()
            )));
        }
        if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SequenceError::InvalidScope(format!(
                "{} scope key `{key}` is not a numeric id",
                kind.as_str()
            )));
        }
        let key = trimmed.parse::<u64>().map_err(|e| {
            SequenceError::InvalidScope(format!("{} scope key `{key}`: {e}", kind.as_str()))
        })?;
        Ok(Self { kind, key })
    }
}

impl fmt::Display for SequenceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.key)
    }
}

/// Rows numbered inside a [`SequenceScope`].
pub trait Sequenced: Entity {
    const SCOPE: ScopeKind;
    /// Foreign-key column holding the scope key.
    const SCOPE_FK: Self::ForeignKey;

    fn seq(&self) -> u64;
}

impl Sequenced for UserStrike {
    const SCOPE: ScopeKind = ScopeKind::User;
    const SCOPE_FK: UserStrikeFk = UserStrikeFk::User;

    fn seq(&self) -> u64 {
        self.strike_id
    }
}

impl Sequenced for GuildTicketChannel {
    const SCOPE: ScopeKind = ScopeKind::Guild;
    const SCOPE_FK: GuildTicketFk = GuildTicketFk::Guild;

    fn seq(&self) -> u64 {
        self.ticket_id
    }
}

/// Next identifier for rows of kind `E` in scope `scope_key`.
pub fn next_seq<E, S>(store: &S, scope_key: u64) -> Result<u64, SequenceError>
where
    E: Sequenced,
    S: EntityStore<E> + ?Sized,
{
    let scope = SequenceScope {
        kind: E::SCOPE,
        key: scope_key,
    };
    let rows = store
        .query_by_foreign_key(E::SCOPE_FK, scope_key)
        .map_err(|source| SequenceError::Store {
            op: "next_id",
            source,
        })?;
    let next = match rows.iter().map(|row| row.seq()).max() {
        None => 0,
        Some(max) => max
            .checked_add(1)
            .ok_or(SequenceError::Exhausted { scope })?,
    };
    tracing::debug!(%scope, next, "allocated sequence id");
    Ok(next)
}

/// Computes the next identifier for any supported scope.
pub struct SequenceAllocator<'s, S: ?Sized> {
    store: &'s S,
}

impl<'s, S> SequenceAllocator<'s, S>
where
    S: EntityStore<UserStrike> + EntityStore<GuildTicketChannel> + ?Sized,
{
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Next identifier for a textual `(scope_kind, scope_key)`.
    pub fn next_id(&self, scope_kind: &str, scope_key: &str) -> Result<u64, SequenceError> {
        let scope = SequenceScope::parse(scope_kind, scope_key)?;
        self.next_in(scope)
    }

    pub fn next_in(&self, scope: SequenceScope) -> Result<u64, SequenceError> {
        match scope.kind {
            ScopeKind::User => next_seq::<UserStrike, S>(self.store, scope.key),
            ScopeKind::Guild => next_seq::<GuildTicketChannel, S>(self.store, scope.key),
        }
    }
}

/// Insert `row` as the next identifier of its scope. A key collision from a
/// concurrent allocation surfaces as [`SequenceError::DuplicateSequenceId`];
/// callers retry the whole allocate-and-insert.
pub fn insert_sequenced<E, S>(store: &mut S, row: E) -> Result<E, SequenceError>
where
    E: Sequenced,
    S: EntityStore<E> + ?Sized,
{
    let scope = SequenceScope {
        kind: E::SCOPE,
        key: row
            .foreign_key(E::SCOPE_FK)
            .ok_or_else(|| SequenceError::InvalidScope("row carries no scope key".to_string()))?,
    };
    let id = row.seq();
    match store.insert(row.clone()) {
        Ok(_) => Ok(row),
        Err(source) if source.is_duplicate_key() => {
            tracing::warn!(%scope, id, "sequence id already taken");
            Err(SequenceError::DuplicateSequenceId { scope, id })
        }
        Err(source) => Err(SequenceError::Store {
            op: "insert_sequenced",
            source,
        }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    #[error("invalid scope: {0}")]
    InvalidScope(String),

    #[error("sequence exhausted for scope {scope}")]
    Exhausted { scope: SequenceScope },

    #[error("sequence id {id} already exists in scope {scope}")]
    DuplicateSequenceId { scope: SequenceScope, id: u64 },

    #[error("{op}: {source}")]
    Store {
        op: &'static str,
        #[source]
        source: StoreError,
    },
}
