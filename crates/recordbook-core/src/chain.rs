//! Joint-record chain model: link validation, traversal limits, chain errors.
//!
//! A chain is the set of build records tying for one record. Exactly one
//! member is an anchor; every joint member links to an earlier member of the
//! same record, directly or through other joint members.

use recordbook_store::{BuildRecord, EntityStore, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default bound on links followed by a single traversal.
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 10_000;

/// Bounds applied to chain traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverLimits {
    pub max_depth: usize,
}

impl Default for ResolverLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }
}

/// Why a chain could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityFault {
    /// Following links returned to an entry already visited.
    Cycle { revisited: u64 },
    /// A link targets an entry that no longer exists.
    MissingLink { target: u64 },
    /// A link crosses into a different record.
    CrossRecord {
        target: u64,
        expected_record: u64,
        found_record: u64,
    },
    DepthExceeded { limit: usize },
}

impl fmt::Display for IntegrityFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityFault::Cycle { revisited } => {
                write!(f, "cycle through build record {revisited}")
            }
            IntegrityFault::MissingLink { target } => {
                write!(f, "link target {target} does not exist")
            }
            IntegrityFault::CrossRecord {
                target,
                expected_record,
                found_record,
            } => write!(
                f,
                "link to {target} crosses from record {expected_record} into record {found_record}"
            ),
            IntegrityFault::DepthExceeded { limit } => {
                write!(f, "traversal exceeded {limit} links")
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("build record not found: {0}")]
    NotFound(u64),

    #[error(
        "joint build record for record {record_id} references entry {target}, \
         which does not exist or belongs to another record"
    )]
    DanglingChainReference { record_id: u64, target: u64 },

    #[error("build {build_id} already holds record {record_id} (entry {existing})")]
    AlreadyHeld {
        build_id: u64,
        record_id: u64,
        existing: u64,
    },

    #[error("chain integrity violated at build record {entry}: {reason}")]
    ChainIntegrity { entry: u64, reason: IntegrityFault },

    #[error("{op}: {source}")]
    Store {
        op: &'static str,
        #[source]
        source: StoreError,
    },
}

impl ChainError {
    pub(crate) fn store(op: &'static str) -> impl FnOnce(StoreError) -> ChainError {
        move |source| ChainError::Store { op, source }
    }

    /// Integrity failures are logged where they are raised so moderators can
    /// follow up on the offending entry.
    pub(crate) fn integrity(entry: u64, reason: IntegrityFault) -> ChainError {
        tracing::error!(entry, %reason, "chain integrity violation");
        ChainError::ChainIntegrity { entry, reason }
    }
}

/// Check a not-yet-persisted entry's link.
///
/// Anchors are always accepted. A joint entry must link to an existing entry
/// of the same record.
pub fn validate_chain_link<S>(store: &S, candidate: &BuildRecord) -> Result<(), ChainError>
where
    S: EntityStore<BuildRecord> + ?Sized,
{
    let Some(target) = candidate.parent() else {
        return Ok(());
    };

    let existing = store
        .get(&target)
        .map_err(ChainError::store("validate_chain_link"))?;
    match existing {
        Some(parent) if parent.record_id == candidate.record_id => Ok(()),
        _ => {
            tracing::warn!(
                record_id = candidate.record_id,
                target,
                "rejected dangling chain reference"
            );
            Err(ChainError::DanglingChainReference {
                record_id: candidate.record_id,
                target,
            })
        }
    }
}
