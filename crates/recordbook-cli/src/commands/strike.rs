use crate::cli::StrikeCommands;
use crate::support::{Context, fail, print_json};
use recordbook_core::{
    SequenceAllocator, edit_strike, issue_strike, revoke_strike, strike_counts, strikes_of,
};
use recordbook_store::UserStrike;
use serde_json::json;

pub fn run(ctx: &Context, command: StrikeCommands) {
    match command {
        StrikeCommands::Next { user } => run_next(ctx, &user),
        StrikeCommands::Add {
            user,
            author,
            reason,
        } => run_add(ctx, user, author, reason),
        StrikeCommands::Edit {
            user,
            strike,
            reason,
        } => run_edit(ctx, user, strike, reason),
        StrikeCommands::Revoke { user, strike } => run_revoke(ctx, user, strike),
        StrikeCommands::List { user } => run_list(ctx, user),
        StrikeCommands::Counts => run_counts(ctx),
    }
}

fn run_next(ctx: &Context, user: &str) {
    let store = ctx.load_store_or_exit();
    let next = SequenceAllocator::new(&store)
        .next_id("user", user)
        .unwrap_or_else(|e| fail(e));

    if ctx.json {
        print_json(&json!({
            "action": "strike.next",
            "userId": user.trim(),
            "nextId": next
        }));
    } else {
        println!("recordbook strike next\n  User: {}\n  Next: {next}", user.trim());
    }
}

fn run_add(ctx: &Context, user: u64, author: u64, reason: String) {
    let reason = required_reason(&reason);

    let strike = ctx.mutate_or_exit(|store| {
        issue_strike(store, user, author, reason).map(|strike| (strike, true))
    });

    if ctx.json {
        print_json(&json!({
            "action": "strike.add",
            "storePath": ctx.store_display(),
            "strike": strike
        }));
    } else {
        println!(
            "recordbook strike add\n  Issued: strike {} to user {}\n  Path: {}",
            strike.strike_id,
            strike.user_id,
            ctx.store_display()
        );
    }
}

fn run_edit(ctx: &Context, user: u64, strike_id: u64, reason: String) {
    let reason = required_reason(&reason);
    let edited = ctx.mutate_or_exit(|store| {
        edit_strike(store, user, strike_id, reason).map(|edited| {
            let changed = edited.is_some();
            (edited, changed)
        })
    });
    let strike = edited.unwrap_or_else(|| fail(format!("strike not found: {user}/{strike_id}")));

    if ctx.json {
        print_json(&json!({
            "action": "strike.edit",
            "storePath": ctx.store_display(),
            "strike": strike
        }));
    } else {
        println!("recordbook strike edit\n  {}", strike_line(&strike));
    }
}

fn required_reason(reason: &str) -> String {
    let reason = reason.trim();
    if reason.is_empty() {
        fail("reason is required");
    }
    reason.to_string()
}

fn run_revoke(ctx: &Context, user: u64, strike_id: u64) {
    let revoked = ctx.mutate_or_exit(|store| {
        revoke_strike(store, user, strike_id).map(|revoked| {
            let changed = revoked.is_some();
            (revoked, changed)
        })
    });
    let strike = revoked.unwrap_or_else(|| fail(format!("strike not found: {user}/{strike_id}")));

    if ctx.json {
        print_json(&json!({
            "action": "strike.revoke",
            "storePath": ctx.store_display(),
            "strike": strike
        }));
    } else {
        println!(
            "recordbook strike revoke\n  Revoked: strike {} of user {}",
            strike.strike_id, strike.user_id
        );
    }
}

fn run_list(ctx: &Context, user: u64) {
    let store = ctx.load_store_or_exit();
    let strikes = strikes_of(&store, user).unwrap_or_else(|e| fail(e));

    if ctx.json {
        print_json(&json!({
            "action": "strike.list",
            "userId": user,
            "count": strikes.len(),
            "items": strikes
        }));
    } else {
        println!(
            "recordbook strike list\n  User: {user}\n  Count: {}",
            strikes.len()
        );
        for strike in &strikes {
            println!("  - {}", strike_line(strike));
        }
    }
}

fn run_counts(ctx: &Context) {
    let store = ctx.load_store_or_exit();
    let counts = strike_counts(store.user_strikes());

    if ctx.json {
        print_json(&json!({
            "action": "strike.counts",
            "count": counts.len(),
            "items": counts
        }));
    } else {
        println!("recordbook strike counts\n  Users: {}", counts.len());
        for row in &counts {
            println!("  - user {}: {}", row.user_id, row.count);
        }
    }
}

fn strike_line(strike: &UserStrike) -> String {
    format!(
        "strike {} by {} at {}: {}",
        strike.strike_id,
        strike.author_id,
        strike.created_at.as_datetime().format("%Y-%m-%d %H:%M:%S"),
        strike.reason
    )
}
