//! Build records: a build's claim on a record, possibly tied with earlier claims.

use crate::entity::{Entity, EntityKind, KeyAssignment};
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};

/// Where an entry sits in its record's tie chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainLink {
    /// Independent claim; the root of its chain.
    Anchor,
    /// Ties with an earlier entry of the same record.
    Joint { parent: u64 },
}

/// A moderator or user action recorded against an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attestation {
    pub by: u64,
    pub at: Timestamp,
}

/// Foreign-key columns of [`BuildRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildRecordFk {
    Build,
    Record,
    /// The entry a joint record ties with. Unused for anchors.
    JointParent,
}

/// A build holding (or tying for) a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BuildRecordRow", into = "BuildRecordRow")]
pub struct BuildRecord {
    /// Zero until the store assigns an id on insert.
    pub id: u64,
    pub build_id: u64,
    pub record_id: u64,
    pub link: ChainLink,
    pub verification: Option<Attestation>,
    pub dispute: Option<Attestation>,
    pub submitter_id: u64,
    pub created_at: Timestamp,
    pub edited_at: Timestamp,
}

impl BuildRecord {
    /// New independent claim on `record_id`.
    pub fn anchor(build_id: u64, record_id: u64, submitter_id: u64) -> Self {
        Self::with_link(build_id, record_id, ChainLink::Anchor, submitter_id)
    }

    /// New claim tying with the entry `parent`.
    pub fn joint(build_id: u64, record_id: u64, parent: u64, submitter_id: u64) -> Self {
        Self::with_link(build_id, record_id, ChainLink::Joint { parent }, submitter_id)
    }

    fn with_link(build_id: u64, record_id: u64, link: ChainLink, submitter_id: u64) -> Self {
        let now = Timestamp::now();
        Self {
            id: 0,
            build_id,
            record_id,
            link,
            verification: None,
            dispute: None,
            submitter_id,
            created_at: now,
            edited_at: now,
        }
    }

    pub fn is_joint(&self) -> bool {
        matches!(self.link, ChainLink::Joint { .. })
    }

    pub fn parent(&self) -> Option<u64> {
        match self.link {
            ChainLink::Anchor => None,
            ChainLink::Joint { parent } => Some(parent),
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verification.is_some()
    }

    pub fn is_disputed(&self) -> bool {
        self.dispute.is_some()
    }

    pub fn set_verification(&mut self, verification: Option<Attestation>) {
        self.verification = verification;
        self.touch_edited_at();
    }

    pub fn set_dispute(&mut self, dispute: Option<Attestation>) {
        self.dispute = dispute;
        self.touch_edited_at();
    }

    pub fn touch_edited_at(&mut self) {
        self.edited_at = Timestamp::now();
    }
}

impl Entity for BuildRecord {
    const KIND: EntityKind = EntityKind::BuildRecord;
    const KEY_ASSIGNMENT: KeyAssignment = KeyAssignment::Surrogate;

    type Key = u64;
    type ForeignKey = BuildRecordFk;

    fn key(&self) -> u64 {
        self.id
    }

    fn foreign_key(&self, fk: BuildRecordFk) -> Option<u64> {
        match fk {
            BuildRecordFk::Build => Some(self.build_id),
            BuildRecordFk::Record => Some(self.record_id),
            BuildRecordFk::JointParent => self.parent(),
        }
    }

    fn assign_surrogate_id(&mut self, id: u64) {
        self.id = id;
    }
}

/// Column layout of a persisted build record. Flags are stored as 0/1 and
/// unset attestations as actor 0 with an empty timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildRecordRow {
    id: u64,
    build_id: u64,
    record_id: u64,
    #[serde(with = "flag")]
    verified: bool,
    #[serde(default)]
    verifier_id: u64,
    #[serde(default)]
    verified_timestamp: String,
    #[serde(with = "flag")]
    reported: bool,
    #[serde(default)]
    reporter_id: u64,
    #[serde(default)]
    reported_timestamp: String,
    #[serde(with = "flag")]
    joint_build_record: bool,
    #[serde(default)]
    joint_build_record_id: u64,
    #[serde(default)]
    submitter_id: u64,
    timestamp: Timestamp,
    edited_timestamp: Timestamp,
}

impl From<BuildRecord> for BuildRecordRow {
    fn from(record: BuildRecord) -> Self {
        let (verified, verifier_id, verified_timestamp) = attestation_columns(record.verification);
        let (reported, reporter_id, reported_timestamp) = attestation_columns(record.dispute);
        Self {
            id: record.id,
            build_id: record.build_id,
            record_id: record.record_id,
            verified,
            verifier_id,
            verified_timestamp,
            reported,
            reporter_id,
            reported_timestamp,
            joint_build_record: record.is_joint(),
            joint_build_record_id: record.parent().unwrap_or(0),
            submitter_id: record.submitter_id,
            timestamp: record.created_at,
            edited_timestamp: record.edited_at,
        }
    }
}

impl TryFrom<BuildRecordRow> for BuildRecord {
    type Error = String;

    fn try_from(row: BuildRecordRow) -> Result<Self, Self::Error> {
        let link = if row.joint_build_record {
            if row.joint_build_record_id == 0 {
                return Err(format!(
                    "build record {} is joint but has no jointBuildRecordId",
                    row.id
                ));
            }
            ChainLink::Joint {
                parent: row.joint_build_record_id,
            }
        } else {
            ChainLink::Anchor
        };

        let verification =
            attestation_from_columns(row.verified, row.verifier_id, &row.verified_timestamp)
                .map_err(|e| format!("build record {} verifiedTimestamp: {e}", row.id))?;
        let dispute =
            attestation_from_columns(row.reported, row.reporter_id, &row.reported_timestamp)
                .map_err(|e| format!("build record {} reportedTimestamp: {e}", row.id))?;

        Ok(Self {
            id: row.id,
            build_id: row.build_id,
            record_id: row.record_id,
            link,
            verification,
            dispute,
            submitter_id: row.submitter_id,
            created_at: row.timestamp,
            edited_at: row.edited_timestamp,
        })
    }
}

fn attestation_columns(attestation: Option<Attestation>) -> (bool, u64, String) {
    match attestation {
        Some(a) => (true, a.by, a.at.encode()),
        None => (false, 0, String::new()),
    }
}

fn attestation_from_columns(
    flagged: bool,
    by: u64,
    at: &str,
) -> Result<Option<Attestation>, crate::timestamp::TimestampError> {
    if !flagged {
        return Ok(None);
    }
    Ok(Some(Attestation {
        by,
        at: Timestamp::decode(at)?,
    }))
}

/// Booleans persisted as integer 0/1 columns.
mod flag {
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(de::Error::custom(format!(
                "flag column must be 0 or 1 (got {other})"
            ))),
        }
    }
}
