//! Chain resolution: anchor lookup and member discovery over the build-record store.
//!
//! Forward walks follow parent links up to the anchor. Member discovery walks
//! the reverse relation ("entries whose parent is X") breadth-first from the
//! anchor. Both walks are iterative and bounded by [`ResolverLimits`].

use crate::chain::{ChainError, IntegrityFault, ResolverLimits};
use recordbook_store::{BuildRecord, BuildRecordFk, EntityStore};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// An anchor and every entry tied with it, in ascending id order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordChain {
    pub anchor: BuildRecord,
    pub members: Vec<BuildRecord>,
}

impl RecordChain {
    /// Members other than the anchor.
    pub fn joint_entries(&self) -> impl Iterator<Item = &BuildRecord> {
        self.members.iter().filter(|m| m.id != self.anchor.id)
    }
}

pub struct ChainResolver<'s, S: ?Sized> {
    store: &'s S,
    limits: ResolverLimits,
}

impl<'s, S> ChainResolver<'s, S>
where
    S: EntityStore<BuildRecord> + ?Sized,
{
    pub fn new(store: &'s S) -> Self {
        Self::with_limits(store, ResolverLimits::default())
    }

    pub fn with_limits(store: &'s S, limits: ResolverLimits) -> Self {
        Self { store, limits }
    }

    /// The anchor of the chain containing `entry_id`.
    ///
    /// An anchor resolves to itself. Cycles, missing or cross-record links and
    /// walks longer than `max_depth` fail with [`ChainError::ChainIntegrity`].
    pub fn find_anchor(&self, entry_id: u64) -> Result<BuildRecord, ChainError> {
        let start = self
            .fetch(entry_id, "find_anchor")?
            .ok_or(ChainError::NotFound(entry_id))?;
        self.anchor_of(start)
    }

    /// Every entry in the chain containing `entry_id`, anchor included,
    /// in ascending id order.
    pub fn find_chain_members(&self, entry_id: u64) -> Result<Vec<BuildRecord>, ChainError> {
        let anchor = self.find_anchor(entry_id)?;
        self.members_of(anchor)
    }

    /// The earliest member of the chain by creation time.
    pub fn first_joint(&self, entry_id: u64) -> Result<BuildRecord, ChainError> {
        chronological(self.find_chain_members(entry_id)?)
            .into_iter()
            .next()
            .ok_or(ChainError::NotFound(entry_id))
    }

    /// Chain members other than the anchor. Empty for an untied entry.
    pub fn joint_entries(&self, entry_id: u64) -> Result<Vec<BuildRecord>, ChainError> {
        let anchor = self.find_anchor(entry_id)?;
        let anchor_id = anchor.id;
        Ok(self
            .members_of(anchor)?
            .into_iter()
            .filter(|m| m.id != anchor_id)
            .collect())
    }

    /// Every chain holding `record_id`, ordered by anchor id.
    pub fn holders_of(&self, record_id: u64) -> Result<Vec<RecordChain>, ChainError> {
        let entries = self
            .store
            .query_by_foreign_key(BuildRecordFk::Record, record_id)
            .map_err(ChainError::store("holders_of"))?;
        let total = entries.len();

        let mut chains = Vec::new();
        let mut covered = 0usize;
        for anchor in entries.into_iter().filter(|e| !e.is_joint()) {
            let members = self.members_of(anchor.clone())?;
            covered += members.len();
            chains.push(RecordChain { anchor, members });
        }

        if covered < total {
            tracing::warn!(
                record_id,
                unreachable = total - covered,
                "record has entries not reachable from any anchor"
            );
        }
        Ok(chains)
    }

    fn anchor_of(&self, start: BuildRecord) -> Result<BuildRecord, ChainError> {
        let record_id = start.record_id;
        let mut visited = BTreeSet::from([start.id]);
        let mut current = start;
        let mut hops = 0usize;

        while let Some(parent) = current.parent() {
            if hops >= self.limits.max_depth {
                return Err(ChainError::integrity(
                    current.id,
                    IntegrityFault::DepthExceeded {
                        limit: self.limits.max_depth,
                    },
                ));
            }
            hops += 1;

            if !visited.insert(parent) {
                return Err(ChainError::integrity(
                    current.id,
                    IntegrityFault::Cycle { revisited: parent },
                ));
            }

            let Some(next) = self.fetch(parent, "find_anchor")? else {
                return Err(ChainError::integrity(
                    current.id,
                    IntegrityFault::MissingLink { target: parent },
                ));
            };
            if next.record_id != record_id {
                return Err(ChainError::integrity(
                    current.id,
                    IntegrityFault::CrossRecord {
                        target: parent,
                        expected_record: record_id,
                        found_record: next.record_id,
                    },
                ));
            }

            tracing::debug!(entry = current.id, parent, "followed chain link");
            current = next;
        }
        Ok(current)
    }

    fn members_of(&self, anchor: BuildRecord) -> Result<Vec<BuildRecord>, ChainError> {
        let record_id = anchor.record_id;
        let mut members = BTreeMap::new();
        let mut queue = VecDeque::from([(anchor.id, 0usize)]);
        members.insert(anchor.id, anchor);

        while let Some((id, depth)) = queue.pop_front() {
            let tied = self
                .store
                .query_by_foreign_key(BuildRecordFk::JointParent, id)
                .map_err(ChainError::store("find_chain_members"))?;

            for child in tied {
                if child.record_id != record_id {
                    tracing::warn!(
                        entry = child.id,
                        parent = id,
                        record_id,
                        "skipping tie from another record"
                    );
                    continue;
                }
                if members.contains_key(&child.id) {
                    continue;
                }
                if depth >= self.limits.max_depth {
                    return Err(ChainError::integrity(
                        child.id,
                        IntegrityFault::DepthExceeded {
                            limit: self.limits.max_depth,
                        },
                    ));
                }
                queue.push_back((child.id, depth + 1));
                members.insert(child.id, child);
            }
        }

        tracing::debug!(record_id, members = members.len(), "resolved chain members");
        Ok(members.into_values().collect())
    }

    fn fetch(&self, id: u64, op: &'static str) -> Result<Option<BuildRecord>, ChainError> {
        self.store.get(&id).map_err(ChainError::store(op))
    }
}

/// Sort chain members by creation time, oldest first; ties broken by id.
pub fn chronological(mut members: Vec<BuildRecord>) -> Vec<BuildRecord> {
    members.sort_by_key(|m| (m.created_at, m.id));
    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use recordbook_store::{ChainLink, JsonlError, MemoryStore, StoreError, Timestamp};

    fn at(secs: u32) -> Timestamp {
        Timestamp::from(Utc.with_ymd_and_hms(2021, 3, 4, 10, 0, secs).unwrap())
    }

    fn insert(store: &mut MemoryStore, record: BuildRecord) -> u64 {
        store.insert(record).expect("insert should succeed")
    }

    /// Rewrite an entry's link in place, bypassing validation.
    fn relink(store: &mut MemoryStore, id: u64, link: ChainLink) {
        let mut row: BuildRecord = store
            .get(&id)
            .expect("get should succeed")
            .expect("row should exist");
        row.link = link;
        assert!(store.update(&id, row).expect("update should succeed"));
    }

    /// Delegates to a [`MemoryStore`] but fails chosen lookups.
    struct FlakyStore {
        inner: MemoryStore,
        fail_get: Option<u64>,
        fail_children_of: Option<u64>,
    }

    impl FlakyStore {
        fn unreadable() -> StoreError {
            StoreError::Jsonl(JsonlError::Corrupt("unreadable row".to_string()))
        }
    }

    impl EntityStore<BuildRecord> for FlakyStore {
        fn get(&self, key: &u64) -> Result<Option<BuildRecord>, StoreError> {
            if self.fail_get == Some(*key) {
                return Err(Self::unreadable());
            }
            EntityStore::<BuildRecord>::get(&self.inner, key)
        }

        fn query_by_foreign_key(
            &self,
            fk: BuildRecordFk,
            value: u64,
        ) -> Result<Vec<BuildRecord>, StoreError> {
            if fk == BuildRecordFk::JointParent && self.fail_children_of == Some(value) {
                return Err(Self::unreadable());
            }
            EntityStore::<BuildRecord>::query_by_foreign_key(&self.inner, fk, value)
        }

        fn insert(&mut self, entity: BuildRecord) -> Result<u64, StoreError> {
            EntityStore::<BuildRecord>::insert(&mut self.inner, entity)
        }

        fn update(&mut self, key: &u64, entity: BuildRecord) -> Result<bool, StoreError> {
            EntityStore::<BuildRecord>::update(&mut self.inner, key, entity)
        }

        fn delete(&mut self, key: &u64) -> Result<bool, StoreError> {
            EntityStore::<BuildRecord>::delete(&mut self.inner, key)
        }
    }

    /// Anchor 1, tie 2 on 1, tie 3 on 2, all on record 10.
    fn stacked_chain() -> MemoryStore {
        let mut store = MemoryStore::new();
        let anchor = insert(&mut store, BuildRecord::anchor(100, 10, 1));
        let middle = insert(&mut store, BuildRecord::joint(101, 10, anchor, 1));
        insert(&mut store, BuildRecord::joint(102, 10, middle, 1));
        store
    }

    fn ids(members: &[BuildRecord]) -> Vec<u64> {
        members.iter().map(|m| m.id).collect()
    }

    /// Anchor 1 with ties 2 and 3 on record 10.
    fn flat_chain() -> MemoryStore {
        let mut store = MemoryStore::new();
        let anchor = insert(&mut store, BuildRecord::anchor(100, 10, 1));
        insert(&mut store, BuildRecord::joint(101, 10, anchor, 1));
        insert(&mut store, BuildRecord::joint(102, 10, anchor, 1));
        store
    }

    #[test]
    fn flat_chain_resolves_from_every_member() {
        let store = flat_chain();
        let resolver = ChainResolver::new(&store);

        for id in [1, 2, 3] {
            assert_eq!(resolver.find_anchor(id).expect("anchor").id, 1);
            assert_eq!(ids(&resolver.find_chain_members(id).expect("members")), [1, 2, 3]);
        }
    }

    #[test]
    fn untied_anchor_is_its_own_chain() {
        let mut store = MemoryStore::new();
        insert(&mut store, BuildRecord::anchor(100, 10, 1));
        insert(&mut store, BuildRecord::anchor(200, 20, 1));

        let resolver = ChainResolver::new(&store);
        assert_eq!(resolver.find_anchor(2).expect("anchor").id, 2);
        assert_eq!(ids(&resolver.find_chain_members(2).expect("members")), [2]);
        assert!(resolver.joint_entries(2).expect("joint entries").is_empty());
    }

    #[test]
    fn multi_hop_chain_reaches_anchor_and_all_descendants() {
        let mut store = MemoryStore::new();
        let anchor = insert(&mut store, BuildRecord::anchor(100, 10, 1));
        let middle = insert(&mut store, BuildRecord::joint(101, 10, anchor, 1));
        let leaf = insert(&mut store, BuildRecord::joint(102, 10, middle, 1));

        let resolver = ChainResolver::new(&store);
        assert_eq!(resolver.find_anchor(leaf).expect("anchor").id, anchor);
        assert_eq!(
            ids(&resolver.find_chain_members(middle).expect("members")),
            [anchor, middle, leaf]
        );
    }

    #[test]
    fn every_member_agrees_on_anchor_and_member_set() {
        let store = flat_chain();
        let resolver = ChainResolver::new(&store);
        let members = resolver.find_chain_members(1).expect("members");

        for member in &members {
            assert_eq!(resolver.find_anchor(member.id).expect("anchor").id, 1);
            assert_eq!(
                resolver.find_chain_members(member.id).expect("members"),
                members
            );
        }
    }

    #[test]
    fn anchor_is_a_fixed_point() {
        let mut store = flat_chain();
        insert(&mut store, BuildRecord::joint(103, 10, 3, 1));
        let resolver = ChainResolver::new(&store);

        for id in 1..=4 {
            let anchor = resolver.find_anchor(id).expect("anchor");
            assert_eq!(resolver.find_anchor(anchor.id).expect("anchor"), anchor);
        }
    }

    #[test]
    fn unknown_entry_is_not_found() {
        let store = MemoryStore::new();
        let err = ChainResolver::new(&store)
            .find_anchor(42)
            .expect_err("missing entry must fail");
        assert!(matches!(err, ChainError::NotFound(42)));
    }

    #[test]
    fn two_entry_cycle_is_an_integrity_error() {
        let mut store = MemoryStore::new();
        let a = insert(&mut store, BuildRecord::anchor(100, 10, 1));
        let b = insert(&mut store, BuildRecord::joint(101, 10, a, 1));
        relink(&mut store, a, ChainLink::Joint { parent: b });

        let resolver = ChainResolver::new(&store);
        for id in [a, b] {
            let err = resolver.find_anchor(id).expect_err("cycle must fail");
            assert!(matches!(
                err,
                ChainError::ChainIntegrity {
                    reason: IntegrityFault::Cycle { .. },
                    ..
                }
            ));
        }
    }

    #[test]
    fn self_link_is_a_cycle() {
        let mut store = MemoryStore::new();
        let a = insert(&mut store, BuildRecord::anchor(100, 10, 1));
        relink(&mut store, a, ChainLink::Joint { parent: a });

        let err = ChainResolver::new(&store)
            .find_chain_members(a)
            .expect_err("self link must fail");
        assert!(matches!(
            err,
            ChainError::ChainIntegrity {
                entry,
                reason: IntegrityFault::Cycle { revisited },
            } if entry == a && revisited == a
        ));
    }

    #[test]
    fn deleted_anchor_leaves_missing_link() {
        let mut store = flat_chain();
        assert!(EntityStore::<BuildRecord>::delete(&mut store, &1).expect("delete"));

        let err = ChainResolver::new(&store)
            .find_anchor(2)
            .expect_err("dangling link must fail");
        assert!(matches!(
            err,
            ChainError::ChainIntegrity {
                entry: 2,
                reason: IntegrityFault::MissingLink { target: 1 },
            }
        ));
    }

    #[test]
    fn link_into_another_record_is_rejected_on_read() {
        let mut store = MemoryStore::new();
        let foreign = insert(&mut store, BuildRecord::anchor(100, 11, 1));
        let local = insert(&mut store, BuildRecord::anchor(101, 10, 1));
        relink(&mut store, local, ChainLink::Joint { parent: foreign });

        let err = ChainResolver::new(&store)
            .find_anchor(local)
            .expect_err("cross-record link must fail");
        assert!(matches!(
            err,
            ChainError::ChainIntegrity {
                reason: IntegrityFault::CrossRecord {
                    expected_record: 10,
                    found_record: 11,
                    ..
                },
                ..
            }
        ));
    }

    #[test]
    fn depth_bound_stops_long_walks() {
        let mut store = MemoryStore::new();
        let mut parent = insert(&mut store, BuildRecord::anchor(100, 10, 1));
        for build in 101..105 {
            parent = insert(&mut store, BuildRecord::joint(build, 10, parent, 1));
        }

        let tight = ChainResolver::with_limits(&store, ResolverLimits { max_depth: 2 });
        let err = tight.find_anchor(parent).expect_err("depth bound must trip");
        assert!(matches!(
            err,
            ChainError::ChainIntegrity {
                reason: IntegrityFault::DepthExceeded { limit: 2 },
                ..
            }
        ));
        let err = tight
            .find_chain_members(1)
            .expect_err("member walk is bounded too");
        assert!(matches!(err, ChainError::ChainIntegrity { .. }));

        let roomy = ChainResolver::new(&store);
        assert_eq!(roomy.find_chain_members(parent).expect("members").len(), 5);
    }

    #[test]
    fn first_joint_orders_by_creation_time() {
        let mut store = MemoryStore::new();
        let mut anchor = BuildRecord::anchor(100, 10, 1);
        anchor.created_at = at(20);
        let anchor = insert(&mut store, anchor);
        let mut early = BuildRecord::joint(101, 10, anchor, 1);
        early.created_at = at(5);
        let early = insert(&mut store, early);

        let resolver = ChainResolver::new(&store);
        assert_eq!(resolver.first_joint(anchor).expect("first").id, early);
        assert_eq!(
            ids(&resolver.joint_entries(anchor).expect("joint entries")),
            [early]
        );
    }

    #[test]
    fn chronological_breaks_ties_by_id() {
        let mut a = BuildRecord::anchor(100, 10, 1);
        a.id = 9;
        a.created_at = at(1);
        let mut b = a.clone();
        b.id = 3;
        let mut c = a.clone();
        c.id = 5;
        c.created_at = at(0);

        assert_eq!(ids(&chronological(vec![a, b, c])), [5, 3, 9]);
    }

    #[test]
    fn holders_of_groups_every_anchor_of_a_record() {
        let mut store = flat_chain();
        let second = insert(&mut store, BuildRecord::anchor(200, 10, 1));
        insert(&mut store, BuildRecord::anchor(300, 11, 1));

        let chains = ChainResolver::new(&store)
            .holders_of(10)
            .expect("holders should resolve");
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].anchor.id, 1);
        assert_eq!(ids(&chains[0].members), [1, 2, 3]);
        assert_eq!(chains[0].joint_entries().count(), 2);
        assert_eq!(chains[1].anchor.id, second);
        assert_eq!(ids(&chains[1].members), [second]);
    }

    #[test]
    fn failed_parent_fetch_aborts_anchor_lookup() {
        let store = FlakyStore {
            inner: stacked_chain(),
            fail_get: Some(2),
            fail_children_of: None,
        };
        let resolver = ChainResolver::new(&store);

        let err = resolver.find_anchor(3).expect_err("parent fetch must fail");
        assert!(matches!(err, ChainError::Store { op: "find_anchor", .. }));
        let err = resolver
            .find_chain_members(3)
            .expect_err("members need the anchor first");
        assert!(matches!(err, ChainError::Store { op: "find_anchor", .. }));
        assert_eq!(resolver.find_anchor(1).expect("anchor is readable").id, 1);
    }

    #[test]
    fn failed_tie_query_aborts_member_discovery() {
        let store = FlakyStore {
            inner: stacked_chain(),
            fail_get: None,
            fail_children_of: Some(2),
        };
        let resolver = ChainResolver::new(&store);

        assert_eq!(resolver.find_anchor(3).expect("anchor").id, 1);
        let err = resolver
            .find_chain_members(3)
            .expect_err("a failed tie query must not yield a partial chain");
        assert!(matches!(
            err,
            ChainError::Store {
                op: "find_chain_members",
                ..
            }
        ));
    }
}
