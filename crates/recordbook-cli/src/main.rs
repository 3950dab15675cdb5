//! Recordbook CLI: the `recordbook` command.

mod cli;
mod commands;
mod config;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use support::{Context, fail};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let config = Config::load(cli.config.as_deref()).unwrap_or_else(|e| fail(e));
    let ctx = Context::new(&cli, config);
    tracing::debug!(store = %ctx.store_path.display(), max_depth = ctx.limits.max_depth, "resolved settings");

    match cli.command {
        Commands::Record { command } => commands::record::run(&ctx, command),
        Commands::Strike { command } => commands::strike::run(&ctx, command),
        Commands::Ticket { command } => commands::ticket::run(&ctx, command),
    }
}

/// Logs go to stderr so `--json` output stays parseable.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("recordbook=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
