use crate::cli::TicketCommands;
use crate::support::{Context, fail, print_json};
use recordbook_core::{
    SequenceAllocator, SequenceError, close_ticket, open_ticket, ticket_for_channel,
};
use recordbook_store::{GuildTicketChannel, MemoryStore, TicketType};
use serde_json::json;

pub fn run(ctx: &Context, command: TicketCommands) {
    match command {
        TicketCommands::Next { guild } => run_next(ctx, &guild),
        TicketCommands::Open {
            guild,
            channel,
            ticket_type,
            creator,
        } => run_open(ctx, guild, channel, ticket_type, creator),
        TicketCommands::Close { guild, ticket } => run_close(ctx, guild, ticket),
        TicketCommands::Channel { channel } => run_channel(ctx, channel),
    }
}

fn run_next(ctx: &Context, guild: &str) {
    let store = ctx.load_store_or_exit();
    let next = SequenceAllocator::new(&store)
        .next_id("guild", guild)
        .unwrap_or_else(|e| fail(e));

    if ctx.json {
        print_json(&json!({
            "action": "ticket.next",
            "guildId": guild.trim(),
            "nextId": next
        }));
    } else {
        println!("recordbook ticket next\n  Guild: {}\n  Next: {next}", guild.trim());
    }
}

fn run_open(ctx: &Context, guild: u64, channel: u64, ticket_type: TicketType, creator: u64) {
    let ticket = ctx.mutate_or_exit(|store: &mut MemoryStore| -> Result<_, OpenError> {
        if let Some(existing) = ticket_for_channel(&*store, channel)? {
            return Err(OpenError::ChannelTaken {
                channel,
                guild: existing.guild_id,
                ticket: existing.ticket_id,
            });
        }
        let ticket = open_ticket(store, guild, channel, ticket_type, creator)?;
        Ok((ticket, true))
    });

    if ctx.json {
        print_json(&json!({
            "action": "ticket.open",
            "storePath": ctx.store_display(),
            "ticket": ticket
        }));
    } else {
        println!(
            "recordbook ticket open\n  Opened: {}\n  Path: {}",
            ticket_line(&ticket),
            ctx.store_display()
        );
    }
}

#[derive(Debug, thiserror::Error)]
enum OpenError {
    #[error("channel {channel} is already ticket {guild}/{ticket}")]
    ChannelTaken { channel: u64, guild: u64, ticket: u64 },

    #[error(transparent)]
    Sequence(#[from] SequenceError),
}

fn run_close(ctx: &Context, guild: u64, ticket_id: u64) {
    let closed = ctx.mutate_or_exit(|store| {
        close_ticket(store, guild, ticket_id).map(|closed| {
            let changed = closed.is_some();
            (closed, changed)
        })
    });
    let ticket = closed.unwrap_or_else(|| fail(format!("ticket not found: {guild}/{ticket_id}")));

    if ctx.json {
        print_json(&json!({
            "action": "ticket.close",
            "storePath": ctx.store_display(),
            "ticket": ticket
        }));
    } else {
        println!("recordbook ticket close\n  Closed: {}", ticket_line(&ticket));
    }
}

fn run_channel(ctx: &Context, channel: u64) {
    let store = ctx.load_store_or_exit();
    let ticket = ticket_for_channel(&store, channel)
        .unwrap_or_else(|e| fail(e))
        .unwrap_or_else(|| fail(format!("channel {channel} is not a ticket")));

    if ctx.json {
        print_json(&json!({
            "action": "ticket.channel",
            "channelId": channel,
            "ticket": ticket
        }));
    } else {
        println!("recordbook ticket channel\n  {}", ticket_line(&ticket));
    }
}

fn ticket_line(ticket: &GuildTicketChannel) -> String {
    format!(
        "ticket {}/{} [{}] channel {} by {}",
        ticket.guild_id, ticket.ticket_id, ticket.ticket_type, ticket.channel_id, ticket.creator_id
    )
}
