use crate::cli::RecordCommands;
use crate::support::{Context, fail, print_json};
use recordbook_core::{ChainResolver, ChainWriter, Placement};
use recordbook_store::{BuildRecord, ChainLink};
use serde_json::json;

pub fn run(ctx: &Context, command: RecordCommands) {
    match command {
        RecordCommands::Submit {
            build,
            record,
            ties_with,
            submitter,
        } => run_submit(ctx, build, record, ties_with, submitter),

        RecordCommands::Anchor { id } => run_anchor(ctx, id),

        RecordCommands::Chain { id } => run_chain(ctx, id),

        RecordCommands::Holders { record } => run_holders(ctx, record),

        RecordCommands::Verify { id, by, clear } => {
            run_attest(ctx, id, Attest::Verify, if clear { None } else { by })
        }

        RecordCommands::Dispute { id, by, clear } => {
            run_attest(ctx, id, Attest::Dispute, if clear { None } else { by })
        }

        RecordCommands::Remove { id } => run_remove(ctx, id),
    }
}

fn run_submit(ctx: &Context, build: u64, record: u64, ties_with: Option<u64>, submitter: u64) {
    let placement = ties_with.map_or(Placement::Anchor, Placement::TiesWith);
    let entry = ctx.mutate_or_exit(|store| {
        ChainWriter::with_limits(store, ctx.limits)
            .submit(build, record, placement, submitter)
            .map(|entry| (entry, true))
    });

    if ctx.json {
        print_json(&json!({
            "action": "record.submit",
            "storePath": ctx.store_display(),
            "entry": entry
        }));
    } else {
        println!(
            "recordbook record submit\n  Stored: entry {} (build {} holds record {})\n  Link: {}\n  Path: {}",
            entry.id,
            entry.build_id,
            entry.record_id,
            link_label(&entry),
            ctx.store_display()
        );
    }
}

fn run_anchor(ctx: &Context, id: u64) {
    let store = ctx.load_store_or_exit();
    let anchor = ChainResolver::with_limits(&store, ctx.limits)
        .find_anchor(id)
        .unwrap_or_else(|e| fail(e));

    if ctx.json {
        print_json(&json!({
            "action": "record.anchor",
            "entryId": id,
            "anchor": anchor
        }));
    } else {
        println!(
            "recordbook record anchor\n  Entry: {id}\n  Anchor: {} (build {}, record {})",
            anchor.id, anchor.build_id, anchor.record_id
        );
    }
}

fn run_chain(ctx: &Context, id: u64) {
    let store = ctx.load_store_or_exit();
    let resolver = ChainResolver::with_limits(&store, ctx.limits);
    let anchor = resolver.find_anchor(id).unwrap_or_else(|e| fail(e));
    let members = resolver
        .find_chain_members(anchor.id)
        .unwrap_or_else(|e| fail(e));

    if ctx.json {
        print_json(&json!({
            "action": "record.chain",
            "storeSnapshot": ctx.snapshot_ref_or_exit(&store),
            "entryId": id,
            "anchorId": anchor.id,
            "recordId": anchor.record_id,
            "count": members.len(),
            "members": members
        }));
    } else {
        println!(
            "recordbook record chain\n  Record: {}\n  Anchor: {}\n  Count: {}",
            anchor.record_id,
            anchor.id,
            members.len()
        );
        for member in &members {
            println!("  - {}", member_line(member));
        }
    }
}

fn run_holders(ctx: &Context, record: u64) {
    let store = ctx.load_store_or_exit();
    let chains = ChainResolver::with_limits(&store, ctx.limits)
        .holders_of(record)
        .unwrap_or_else(|e| fail(e));

    if ctx.json {
        print_json(&json!({
            "action": "record.holders",
            "storeSnapshot": ctx.snapshot_ref_or_exit(&store),
            "recordId": record,
            "count": chains.len(),
            "chains": chains
        }));
    } else {
        println!(
            "recordbook record holders\n  Record: {record}\n  Chains: {}",
            chains.len()
        );
        for chain in &chains {
            println!(
                "  - anchor {} ({} tied)",
                chain.anchor.id,
                chain.joint_entries().count()
            );
        }
    }
}

#[derive(Clone, Copy)]
enum Attest {
    Verify,
    Dispute,
}

fn run_attest(ctx: &Context, id: u64, kind: Attest, by: Option<u64>) {
    let entry = ctx.mutate_or_exit(|store| {
        let mut writer = ChainWriter::with_limits(store, ctx.limits);
        let edited = match kind {
            Attest::Verify => writer.set_verification(id, by),
            Attest::Dispute => writer.set_dispute(id, by),
        };
        edited.map(|entry| (entry, true))
    });
    let action = match kind {
        Attest::Verify => "record.verify",
        Attest::Dispute => "record.dispute",
    };

    if ctx.json {
        print_json(&json!({
            "action": action,
            "storePath": ctx.store_display(),
            "entry": entry
        }));
    } else {
        println!("recordbook {}\n  {}", action.replace('.', " "), member_line(&entry));
    }
}

fn run_remove(ctx: &Context, id: u64) {
    let removed = ctx.mutate_or_exit(|store| {
        ChainWriter::with_limits(store, ctx.limits)
            .remove(id)
            .map(|entry| (entry, true))
    });

    if ctx.json {
        print_json(&json!({
            "action": "record.remove",
            "storePath": ctx.store_display(),
            "entry": removed
        }));
    } else {
        println!(
            "recordbook record remove\n  Removed: entry {} (build {}, record {})",
            removed.id, removed.build_id, removed.record_id
        );
    }
}

fn link_label(entry: &BuildRecord) -> String {
    match entry.link {
        ChainLink::Anchor => "anchor".to_string(),
        ChainLink::Joint { parent } => format!("ties with {parent}"),
    }
}

fn member_line(entry: &BuildRecord) -> String {
    let mut flags = Vec::new();
    if entry.is_verified() {
        flags.push("verified");
    }
    if entry.is_disputed() {
        flags.push("disputed");
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    };
    format!(
        "entry {} build {} ({}){flags}",
        entry.id,
        entry.build_id,
        link_label(entry)
    )
}
