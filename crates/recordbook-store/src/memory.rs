//! Canonical in-memory store and the facade implementation over it.
//!
//! - load/store JSONL
//! - per-kind tables keyed deterministically
//! - surrogate id high-water mark that survives deletes and reloads

use crate::build_record::BuildRecord;
use crate::entity::{Entity, EntityStore, KeyAssignment, StoreError};
use crate::jsonl::{StoreRow, Watermark, read_rows_from_path, write_rows_to_path};
use crate::strike::UserStrike;
use crate::ticket::GuildTicketChannel;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// First surrogate id handed out. Zero is reserved for "no entry".
pub const FIRST_SURROGATE_ID: u64 = 1;

/// In-memory tables for every entity kind.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    build_records: BTreeMap<u64, BuildRecord>,
    user_strikes: BTreeMap<<UserStrike as Entity>::Key, UserStrike>,
    guild_tickets: BTreeMap<<GuildTicketChannel as Entity>::Key, GuildTicketChannel>,
    next_build_record_id: u64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            build_records: BTreeMap::new(),
            user_strikes: BTreeMap::new(),
            guild_tickets: BTreeMap::new(),
            next_build_record_id: FIRST_SURROGATE_ID,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from persisted rows.
    ///
    /// Duplicate keys resolve last-write-wins. The id watermark never drops
    /// below one past the highest build record id present. A row holding the
    /// largest representable id leaves nothing to hand out and is rejected.
    pub fn from_rows(rows: Vec<StoreRow>) -> Result<Self, StoreError> {
        let mut store = Self::default();
        for row in rows {
            match row {
                StoreRow::BuildRecord(record) => {
                    store.build_records.insert(record.id, record);
                }
                StoreRow::UserStrike(strike) => {
                    store.user_strikes.insert(strike.key(), strike);
                }
                StoreRow::GuildTicket(ticket) => {
                    store.guild_tickets.insert(ticket.key(), ticket);
                }
                StoreRow::Watermark(mark) => {
                    store.next_build_record_id =
                        store.next_build_record_id.max(mark.next_build_record_id);
                }
            }
        }
        if let Some(max_id) = store.build_records.keys().next_back() {
            let after = max_id.checked_add(1).ok_or(StoreError::IdSpaceExhausted {
                kind: BuildRecord::KIND,
            })?;
            store.next_build_record_id = store.next_build_record_id.max(after);
        }
        Ok(store)
    }

    /// Snapshot every table as rows, watermark first.
    pub fn to_rows(&self) -> Vec<StoreRow> {
        let mut rows = Vec::with_capacity(self.len() + 1);
        rows.push(StoreRow::Watermark(Watermark {
            next_build_record_id: self.next_build_record_id,
        }));
        rows.extend(self.build_records.values().cloned().map(StoreRow::BuildRecord));
        rows.extend(self.user_strikes.values().cloned().map(StoreRow::UserStrike));
        rows.extend(self.guild_tickets.values().cloned().map(StoreRow::GuildTicket));
        rows
    }

    /// Load store state from a JSONL file.
    pub fn load_jsonl(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let rows = read_rows_from_path(path)?;
        Self::from_rows(rows)
    }

    /// Load from `path`, or start empty when the file does not exist yet.
    pub fn load_jsonl_or_empty(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "store file absent; starting empty");
            return Ok(Self::default());
        }
        Self::load_jsonl(path)
    }

    /// Persist store state to a JSONL file.
    pub fn save_jsonl(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        write_rows_to_path(path, &self.to_rows())?;
        Ok(())
    }

    /// Total number of rows across all tables.
    pub fn len(&self) -> usize {
        self.build_records.len() + self.user_strikes.len() + self.guild_tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Content digest of the store state, stable across save and reload.
    pub fn snapshot_ref(&self) -> Result<String, StoreError> {
        let mut hasher = Sha256::new();
        for row in self.to_rows() {
            let line = serde_json::to_vec(&row).map_err(|e| {
                StoreError::Jsonl(crate::jsonl::JsonlError::Serialize(e.to_string()))
            })?;
            hasher.update(&line);
            hasher.update([0]);
        }
        Ok(format!("rbs1_{:x}", hasher.finalize()))
    }

    /// Next surrogate id the store would assign.
    pub fn next_build_record_id(&self) -> u64 {
        self.next_build_record_id
    }

    pub fn build_records(&self) -> impl Iterator<Item = &BuildRecord> {
        self.build_records.values()
    }

    pub fn user_strikes(&self) -> impl Iterator<Item = &UserStrike> {
        self.user_strikes.values()
    }

    fn take_surrogate_id<E: Entity>(&mut self) -> Result<u64, StoreError> {
        let id = self.next_build_record_id;
        self.next_build_record_id = id
            .checked_add(1)
            .ok_or(StoreError::IdSpaceExhausted { kind: E::KIND })?;
        Ok(id)
    }
}

/// Entity kinds held by [`MemoryStore`].
pub trait Stored: Entity {
    #[doc(hidden)]
    fn table(store: &MemoryStore) -> &BTreeMap<Self::Key, Self>;
    #[doc(hidden)]
    fn table_mut(store: &mut MemoryStore) -> &mut BTreeMap<Self::Key, Self>;
}

impl Stored for BuildRecord {
    fn table(store: &MemoryStore) -> &BTreeMap<u64, Self> {
        &store.build_records
    }

    fn table_mut(store: &mut MemoryStore) -> &mut BTreeMap<u64, Self> {
        &mut store.build_records
    }
}

impl Stored for UserStrike {
    fn table(store: &MemoryStore) -> &BTreeMap<Self::Key, Self> {
        &store.user_strikes
    }

    fn table_mut(store: &mut MemoryStore) -> &mut BTreeMap<Self::Key, Self> {
        &mut store.user_strikes
    }
}

impl Stored for GuildTicketChannel {
    fn table(store: &MemoryStore) -> &BTreeMap<Self::Key, Self> {
        &store.guild_tickets
    }

    fn table_mut(store: &mut MemoryStore) -> &mut BTreeMap<Self::Key, Self> {
        &mut store.guild_tickets
    }
}

impl<E: Stored> EntityStore<E> for MemoryStore {
    fn get(&self, key: &E::Key) -> Result<Option<E>, StoreError> {
        Ok(E::table(self).get(key).cloned())
    }

    fn query_by_foreign_key(&self, fk: E::ForeignKey, value: u64) -> Result<Vec<E>, StoreError> {
        Ok(E::table(self)
            .values()
            .filter(|row| row.foreign_key(fk) == Some(value))
            .cloned()
            .collect())
    }

    fn insert(&mut self, mut entity: E) -> Result<E::Key, StoreError> {
        if E::KEY_ASSIGNMENT == KeyAssignment::Surrogate {
            let id = self.take_surrogate_id::<E>()?;
            entity.assign_surrogate_id(id);
        }
        let key = entity.key();
        let table = E::table_mut(self);
        if table.contains_key(&key) {
            return Err(StoreError::duplicate::<E>(&key));
        }
        table.insert(key.clone(), entity);
        tracing::debug!(kind = %E::KIND, key = %key, "row inserted");
        Ok(key)
    }

    fn update(&mut self, key: &E::Key, entity: E) -> Result<bool, StoreError> {
        let actual = entity.key();
        if &actual != key {
            return Err(StoreError::KeyMismatch {
                kind: E::KIND,
                key: key.to_string(),
                actual: actual.to_string(),
            });
        }
        match E::table_mut(self).get_mut(key) {
            Some(slot) => {
                *slot = entity;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&mut self, key: &E::Key) -> Result<bool, StoreError> {
        Ok(E::table_mut(self).remove(key).is_some())
    }
}
