use clap::{Parser, Subcommand};
use recordbook_store::TicketType;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "recordbook",
    about = "Recordbook: build records, tie chains, strikes and tickets over a JSONL store",
    version
)]
pub struct Cli {
    /// Config file (defaults to ./recordbook.toml when present)
    #[arg(long, global = true, env = "RECORDBOOK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the store JSONL (overrides the config file)
    #[arg(long, global = true, env = "RECORDBOOK_STORE")]
    pub store: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build records and their tie chains
    Record {
        #[command(subcommand)]
        command: RecordCommands,
    },

    /// Moderation strikes, numbered per user
    Strike {
        #[command(subcommand)]
        command: StrikeCommands,
    },

    /// Ticket channels, numbered per guild
    Ticket {
        #[command(subcommand)]
        command: TicketCommands,
    },
}

#[derive(Subcommand)]
pub enum RecordCommands {
    /// Record a build as holding a record, alone or tied with an existing entry
    Submit {
        /// Build id
        #[arg(long)]
        build: u64,

        /// Record id
        #[arg(long)]
        record: u64,

        /// Existing entry (any member of its chain) this build ties with
        #[arg(long)]
        ties_with: Option<u64>,

        /// Submitting user id
        #[arg(long)]
        submitter: u64,
    },

    /// Show the anchor of an entry's chain
    Anchor {
        /// Build record entry id
        id: u64,
    },

    /// List every member of an entry's chain
    Chain {
        /// Build record entry id
        id: u64,
    },

    /// List every chain holding a record
    Holders {
        /// Record id
        record: u64,
    },

    /// Mark an entry verified
    Verify {
        /// Build record entry id
        id: u64,

        /// Verifying user id
        #[arg(long, required_unless_present = "clear")]
        by: Option<u64>,

        /// Remove an existing verification instead
        #[arg(long, conflicts_with = "by")]
        clear: bool,
    },

    /// Mark an entry disputed
    Dispute {
        /// Build record entry id
        id: u64,

        /// Reporting user id
        #[arg(long, required_unless_present = "clear")]
        by: Option<u64>,

        /// Remove an existing dispute instead
        #[arg(long, conflicts_with = "by")]
        clear: bool,
    },

    /// Delete an entry
    Remove {
        /// Build record entry id
        id: u64,
    },
}

#[derive(Subcommand)]
pub enum StrikeCommands {
    /// Show the id the user's next strike will get
    Next {
        /// User id
        user: String,
    },

    /// Issue a strike
    Add {
        /// User id
        user: u64,

        /// Moderator issuing the strike
        #[arg(long)]
        author: u64,

        /// Reason shown to the user
        #[arg(long)]
        reason: String,
    },

    /// Change a strike's reason
    Edit {
        /// User id
        user: u64,

        /// Strike id
        strike: u64,

        /// New reason
        #[arg(long)]
        reason: String,
    },

    /// Delete a strike
    Revoke {
        /// User id
        user: u64,

        /// Strike id
        strike: u64,
    },

    /// List a user's strikes
    List {
        /// User id
        user: u64,
    },

    /// Strike totals for every user holding strikes
    Counts,
}

#[derive(Subcommand)]
pub enum TicketCommands {
    /// Show the id the guild's next ticket will get
    Next {
        /// Guild id
        guild: String,
    },

    /// Record a channel as a new ticket
    Open {
        /// Guild id
        guild: u64,

        /// Channel id
        #[arg(long)]
        channel: u64,

        /// Ticket type: general, submit-build, submit-record,
        /// submit-build-update, submit-record-update
        #[arg(long = "type")]
        ticket_type: TicketType,

        /// User who opened the ticket
        #[arg(long)]
        creator: u64,
    },

    /// Forget a ticket
    Close {
        /// Guild id
        guild: u64,

        /// Ticket id
        ticket: u64,
    },

    /// Find the ticket bound to a channel
    Channel {
        /// Channel id
        channel: u64,
    },
}
