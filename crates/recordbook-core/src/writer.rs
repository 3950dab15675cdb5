//! Write path for build records.
//!
//! Every new entry goes through [`ChainWriter`], which validates its link
//! before the store sees it. Ties are normalized to point at the chain's
//! anchor so chains written here stay one hop deep.

use crate::chain::{ChainError, ResolverLimits, validate_chain_link};
use crate::resolver::ChainResolver;
use recordbook_store::{Attestation, BuildRecord, BuildRecordFk, EntityStore, Timestamp};

/// Where a new submission goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// A new independent claim.
    Anchor,
    /// A tie with an existing entry (any member of its chain).
    TiesWith(u64),
}

pub struct ChainWriter<'s, S: ?Sized> {
    store: &'s mut S,
    limits: ResolverLimits,
}

impl<'s, S> ChainWriter<'s, S>
where
    S: EntityStore<BuildRecord> + ?Sized,
{
    pub fn new(store: &'s mut S) -> Self {
        Self::with_limits(store, ResolverLimits::default())
    }

    pub fn with_limits(store: &'s mut S, limits: ResolverLimits) -> Self {
        Self { store, limits }
    }

    /// Record `build_id` as holding `record_id`.
    ///
    /// A build holds a record at most once. A tie must name an existing entry
    /// of the same record; the stored link points at that entry's anchor.
    pub fn submit(
        &mut self,
        build_id: u64,
        record_id: u64,
        placement: Placement,
        submitter_id: u64,
    ) -> Result<BuildRecord, ChainError> {
        let held = self
            .store
            .query_by_foreign_key(BuildRecordFk::Build, build_id)
            .map_err(ChainError::store("submit"))?;
        if let Some(existing) = held.iter().find(|e| e.record_id == record_id) {
            tracing::warn!(build_id, record_id, existing = existing.id, "record already held");
            return Err(ChainError::AlreadyHeld {
                build_id,
                record_id,
                existing: existing.id,
            });
        }

        let candidate = match placement {
            Placement::Anchor => BuildRecord::anchor(build_id, record_id, submitter_id),
            Placement::TiesWith(target) => {
                let requested = BuildRecord::joint(build_id, record_id, target, submitter_id);
                validate_chain_link(&*self.store, &requested)?;
                let anchor =
                    ChainResolver::with_limits(&*self.store, self.limits).find_anchor(target)?;
                BuildRecord::joint(build_id, record_id, anchor.id, submitter_id)
            }
        };
        self.insert_validated(candidate)
    }

    /// Insert a prepared entry after validating its link. The link is stored
    /// as given.
    pub fn insert_validated(&mut self, mut candidate: BuildRecord) -> Result<BuildRecord, ChainError> {
        validate_chain_link(&*self.store, &candidate)?;
        let id = self
            .store
            .insert(candidate.clone())
            .map_err(ChainError::store("insert_build_record"))?;
        candidate.id = id;
        tracing::info!(
            entry = id,
            build_id = candidate.build_id,
            record_id = candidate.record_id,
            parent = candidate.parent(),
            "build record stored"
        );
        Ok(candidate)
    }

    /// Mark `entry_id` verified by `by`, or clear the verification with `None`.
    pub fn set_verification(
        &mut self,
        entry_id: u64,
        by: Option<u64>,
    ) -> Result<BuildRecord, ChainError> {
        self.edit(entry_id, "set_verification", |entry| {
            entry.set_verification(by.map(attest))
        })
    }

    /// Mark `entry_id` disputed by `by`, or clear the dispute with `None`.
    pub fn set_dispute(&mut self, entry_id: u64, by: Option<u64>) -> Result<BuildRecord, ChainError> {
        self.edit(entry_id, "set_dispute", |entry| entry.set_dispute(by.map(attest)))
    }

    /// Delete `entry_id`. Entries tied with it are left in place and will
    /// fail resolution until repaired.
    pub fn remove(&mut self, entry_id: u64) -> Result<BuildRecord, ChainError> {
        let entry = self.require(entry_id, "remove")?;
        let dependents = self
            .store
            .query_by_foreign_key(BuildRecordFk::JointParent, entry_id)
            .map_err(ChainError::store("remove"))?;
        self.store
            .delete(&entry_id)
            .map_err(ChainError::store("remove"))?;

        if dependents.is_empty() {
            tracing::info!(entry = entry_id, "build record removed");
        } else {
            tracing::warn!(
                entry = entry_id,
                dependents = dependents.len(),
                "removed build record that other entries tie with"
            );
        }
        Ok(entry)
    }

    fn edit(
        &mut self,
        entry_id: u64,
        op: &'static str,
        apply: impl FnOnce(&mut BuildRecord),
    ) -> Result<BuildRecord, ChainError> {
        let mut entry = self.require(entry_id, op)?;
        apply(&mut entry);
        let found = self
            .store
            .update(&entry_id, entry.clone())
            .map_err(ChainError::store(op))?;
        if !found {
            return Err(ChainError::NotFound(entry_id));
        }
        tracing::debug!(entry = entry_id, op, "build record edited");
        Ok(entry)
    }

    fn require(&self, entry_id: u64, op: &'static str) -> Result<BuildRecord, ChainError> {
        self.store
            .get(&entry_id)
            .map_err(ChainError::store(op))?
            .ok_or(ChainError::NotFound(entry_id))
    }
}

fn attest(by: u64) -> Attestation {
    Attestation {
        by,
        at: Timestamp::now(),
    }
}
