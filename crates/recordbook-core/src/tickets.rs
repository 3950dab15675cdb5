//! Ticket channels numbered per guild.

use crate::sequence::{SequenceError, insert_sequenced, next_seq};
use recordbook_store::{
    EntityStore, GuildTicketChannel, GuildTicketFk, ScopedKey, StoreError, TicketType,
};

/// Allocate the guild's next ticket id and record `channel_id` under it.
pub fn open_ticket<S>(
    store: &mut S,
    guild_id: u64,
    channel_id: u64,
    ticket_type: TicketType,
    creator_id: u64,
) -> Result<GuildTicketChannel, SequenceError>
where
    S: EntityStore<GuildTicketChannel> + ?Sized,
{
    let ticket_id = next_seq::<GuildTicketChannel, S>(store, guild_id)?;
    let ticket = insert_sequenced(
        store,
        GuildTicketChannel::new(guild_id, ticket_id, channel_id, ticket_type, creator_id),
    )?;
    tracing::info!(guild_id, ticket_id, channel_id, %ticket_type, "ticket opened");
    Ok(ticket)
}

/// Forget a ticket channel, returning it. `None` when absent.
pub fn close_ticket<S>(
    store: &mut S,
    guild_id: u64,
    ticket_id: u64,
) -> Result<Option<GuildTicketChannel>, SequenceError>
where
    S: EntityStore<GuildTicketChannel> + ?Sized,
{
    let key = ScopedKey::new(guild_id, ticket_id);
    let Some(ticket) = store.get(&key).map_err(store_err("close_ticket"))? else {
        return Ok(None);
    };
    store.delete(&key).map_err(store_err("close_ticket"))?;
    tracing::info!(guild_id, ticket_id, "ticket closed");
    Ok(Some(ticket))
}

/// The ticket bound to `channel_id`, if the channel is a ticket.
pub fn ticket_for_channel<S>(
    store: &S,
    channel_id: u64,
) -> Result<Option<GuildTicketChannel>, SequenceError>
where
    S: EntityStore<GuildTicketChannel> + ?Sized,
{
    let mut found = store
        .query_by_foreign_key(GuildTicketFk::Channel, channel_id)
        .map_err(store_err("ticket_for_channel"))?;
    if found.len() > 1 {
        tracing::warn!(channel_id, tickets = found.len(), "channel bound to several tickets");
    }
    found.sort_by_key(|t| (t.guild_id, t.ticket_id));
    Ok(found.into_iter().next())
}

fn store_err(op: &'static str) -> impl FnOnce(StoreError) -> SequenceError {
    move |source| SequenceError::Store { op, source }
}
