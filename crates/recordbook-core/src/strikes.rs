//! Strike issuance and bookkeeping on top of the `user` sequence scope.

use crate::sequence::{SequenceError, insert_sequenced, next_seq};
use recordbook_store::{EntityStore, ScopedKey, UserStrike, UserStrikeCount, UserStrikeFk};
use std::collections::BTreeMap;

/// Allocate the user's next strike id and store the strike under it.
///
/// Not atomic on its own: run it inside one store mutation (for example
/// `mutate_store_jsonl`) so a concurrent issuer cannot take the same id.
pub fn issue_strike<S>(
    store: &mut S,
    user_id: u64,
    author_id: u64,
    reason: impl Into<String>,
) -> Result<UserStrike, SequenceError>
where
    S: EntityStore<UserStrike> + ?Sized,
{
    let strike_id = next_seq::<UserStrike, S>(store, user_id)?;
    let strike = insert_sequenced(store, UserStrike::new(user_id, strike_id, reason, author_id))?;
    tracing::info!(user_id, strike_id, author_id, "strike issued");
    Ok(strike)
}

/// Replace a strike's reason. `None` when the strike does not exist.
pub fn edit_strike<S>(
    store: &mut S,
    user_id: u64,
    strike_id: u64,
    reason: impl Into<String>,
) -> Result<Option<UserStrike>, SequenceError>
where
    S: EntityStore<UserStrike> + ?Sized,
{
    let key = ScopedKey::new(user_id, strike_id);
    let Some(mut strike) = store.get(&key).map_err(store_err("edit_strike"))? else {
        return Ok(None);
    };
    strike.set_reason(reason);
    let found = store
        .update(&key, strike.clone())
        .map_err(store_err("edit_strike"))?;
    Ok(found.then_some(strike))
}

/// Delete a strike, returning it. Later strikes keep their ids.
pub fn revoke_strike<S>(
    store: &mut S,
    user_id: u64,
    strike_id: u64,
) -> Result<Option<UserStrike>, SequenceError>
where
    S: EntityStore<UserStrike> + ?Sized,
{
    let key = ScopedKey::new(user_id, strike_id);
    let Some(strike) = store.get(&key).map_err(store_err("revoke_strike"))? else {
        return Ok(None);
    };
    store.delete(&key).map_err(store_err("revoke_strike"))?;
    tracing::info!(user_id, strike_id, "strike revoked");
    Ok(Some(strike))
}

/// A user's strikes in id order.
pub fn strikes_of<S>(store: &S, user_id: u64) -> Result<Vec<UserStrike>, SequenceError>
where
    S: EntityStore<UserStrike> + ?Sized,
{
    let mut strikes = store
        .query_by_foreign_key(UserStrikeFk::User, user_id)
        .map_err(store_err("strikes_of"))?;
    strikes.sort_by_key(|s| s.strike_id);
    Ok(strikes)
}

pub fn strike_count<S>(store: &S, user_id: u64) -> Result<UserStrikeCount, SequenceError>
where
    S: EntityStore<UserStrike> + ?Sized,
{
    let count = store
        .query_by_foreign_key(UserStrikeFk::User, user_id)
        .map_err(store_err("strike_count"))?
        .len();
    Ok(UserStrikeCount { user_id, count })
}

/// Per-user totals for every user holding at least one strike, by user id.
pub fn strike_counts<'a>(strikes: impl IntoIterator<Item = &'a UserStrike>) -> Vec<UserStrikeCount> {
    let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
    for strike in strikes {
        *counts.entry(strike.user_id).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(user_id, count)| UserStrikeCount { user_id, count })
        .collect()
}

fn store_err(op: &'static str) -> impl FnOnce(recordbook_store::StoreError) -> SequenceError {
    move |source| SequenceError::Store { op, source }
}
