//! # recordbook-store
//!
//! Record store layer for the build/record catalog.
//!
//! This crate provides:
//! - entity types (`BuildRecord`, `UserStrike`, `GuildTicketChannel`)
//! - the `EntityStore` facade the core is written against
//! - `MemoryStore`, the canonical in-memory implementation
//! - JSONL read/write and lock-scoped atomic mutation
//!
//! Chain resolution and sequence allocation live in `recordbook-core`.
//!
//! ## Data model
//!
//! ```text
//! JSONL (on disk, one tagged row per line)
//!     <->  load / save
//! MemoryStore (per-kind tables + id watermark)
//!     <->  EntityStore<E>
//! recordbook-core
//! ```

pub mod atomic_store;
pub mod build_record;
pub mod entity;
pub mod jsonl;
pub mod memory;
pub mod strike;
pub mod ticket;
pub mod timestamp;

pub use atomic_store::{AtomicStoreMutationError, mutate_store_jsonl, store_lock_path};
pub use build_record::{Attestation, BuildRecord, BuildRecordFk, ChainLink};
pub use entity::{Entity, EntityKind, EntityStore, KeyAssignment, ScopedKey, StoreError};
pub use jsonl::{JsonlError, StoreRow, Watermark};
pub use memory::{FIRST_SURROGATE_ID, MemoryStore, Stored};
pub use strike::{UserStrike, UserStrikeCount, UserStrikeFk};
pub use ticket::{GuildTicketChannel, GuildTicketFk, TicketType};
pub use timestamp::{TIMESTAMP_LAYOUT, Timestamp, TimestampError};
