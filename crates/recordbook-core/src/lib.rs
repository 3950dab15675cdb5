//! # recordbook-core
//!
//! Domain logic over the `recordbook-store` facade:
//!
//! - **Sequences**: per-scope identifiers (strikes per user, tickets per
//!   guild), `max + 1` or `0` for an empty scope
//! - **Chains**: build records tying for one record form an in-tree rooted at
//!   an anchor; [`ChainResolver`] finds the anchor and the members,
//!   [`ChainWriter`] is the validated write path
//! - **Strikes / tickets**: issuance and bookkeeping on top of the sequences
//!
//! Nothing here holds a global store. Callers construct a store once and
//! lend it to the allocator, resolver and writer.

pub mod chain;
pub mod resolver;
pub mod sequence;
pub mod strikes;
pub mod tickets;
pub mod writer;

pub use chain::{
    ChainError, DEFAULT_MAX_CHAIN_DEPTH, IntegrityFault, ResolverLimits, validate_chain_link,
};
pub use resolver::{ChainResolver, RecordChain, chronological};
pub use sequence::{
    ScopeKind, SequenceAllocator, SequenceError, SequenceScope, Sequenced, insert_sequenced,
    next_seq,
};
pub use strikes::{
    edit_strike, issue_strike, revoke_strike, strike_count, strike_counts, strikes_of,
};
pub use tickets::{close_ticket, open_ticket, ticket_for_channel};
pub use writer::{ChainWriter, Placement};
