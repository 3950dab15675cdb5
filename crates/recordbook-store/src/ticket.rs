//! Ticket channels, numbered per guild.

use crate::entity::{Entity, EntityKind, KeyAssignment, ScopedKey};
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a ticket channel was opened for. Persisted as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TicketType {
    /// Private conversation with guild moderators.
    General,
    SubmitBuild,
    SubmitRecord,
    SubmitBuildUpdate,
    SubmitRecordUpdate,
}

impl TicketType {
    pub const ALL: [TicketType; 5] = [
        TicketType::General,
        TicketType::SubmitBuild,
        TicketType::SubmitRecord,
        TicketType::SubmitBuildUpdate,
        TicketType::SubmitRecordUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketType::General => "general",
            TicketType::SubmitBuild => "submit-build",
            TicketType::SubmitRecord => "submit-record",
            TicketType::SubmitBuildUpdate => "submit-build-update",
            TicketType::SubmitRecordUpdate => "submit-record-update",
        }
    }
}

impl From<TicketType> for u8 {
    fn from(value: TicketType) -> Self {
        match value {
            TicketType::General => 0,
            TicketType::SubmitBuild => 1,
            TicketType::SubmitRecord => 2,
            TicketType::SubmitBuildUpdate => 3,
            TicketType::SubmitRecordUpdate => 4,
        }
    }
}

impl TryFrom<u8> for TicketType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        TicketType::ALL
            .get(usize::from(code))
            .copied()
            .ok_or_else(|| format!("unknown ticket type code {code}"))
    }
}

impl FromStr for TicketType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        TicketType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("unknown ticket type `{s}`"))
    }
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuildTicketFk {
    Guild,
    Channel,
}

/// A guild channel acting as a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildTicketChannel {
    pub guild_id: u64,
    pub ticket_id: u64,
    pub channel_id: u64,
    pub ticket_type: TicketType,
    pub creator_id: u64,
    #[serde(rename = "timestamp")]
    pub created_at: Timestamp,
}

impl GuildTicketChannel {
    pub fn new(
        guild_id: u64,
        ticket_id: u64,
        channel_id: u64,
        ticket_type: TicketType,
        creator_id: u64,
    ) -> Self {
        Self {
            guild_id,
            ticket_id,
            channel_id,
            ticket_type,
            creator_id,
            created_at: Timestamp::now(),
        }
    }
}

impl Entity for GuildTicketChannel {
    const KIND: EntityKind = EntityKind::GuildTicket;
    const KEY_ASSIGNMENT: KeyAssignment = KeyAssignment::Natural;

    type Key = ScopedKey;
    type ForeignKey = GuildTicketFk;

    fn key(&self) -> ScopedKey {
        ScopedKey::new(self.guild_id, self.ticket_id)
    }

    fn foreign_key(&self, fk: GuildTicketFk) -> Option<u64> {
        match fk {
            GuildTicketFk::Guild => Some(self.guild_id),
            GuildTicketFk::Channel => Some(self.channel_id),
        }
    }
}
