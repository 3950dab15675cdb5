use crate::cli::Cli;
use crate::config::Config;
use recordbook_core::ResolverLimits;
use recordbook_store::{MemoryStore, mutate_store_jsonl};
use serde_json::Value;
use std::fmt::Display;
use std::path::PathBuf;

/// Settings shared by every command after flags and config are merged.
pub struct Context {
    pub store_path: PathBuf,
    pub limits: ResolverLimits,
    pub json: bool,
}

impl Context {
    pub fn new(cli: &Cli, config: Config) -> Self {
        let limits = config.limits();
        Self {
            store_path: cli.store.clone().unwrap_or(config.store_path),
            limits,
            json: cli.json,
        }
    }

    pub fn store_display(&self) -> String {
        self.store_path.display().to_string()
    }

    /// Load the store for reading; a missing file reads as empty.
    pub fn load_store_or_exit(&self) -> MemoryStore {
        MemoryStore::load_jsonl_or_empty(&self.store_path).unwrap_or_else(|e| {
            fail(format!("failed to load {}: {e}", self.store_path.display()))
        })
    }

    pub fn snapshot_ref_or_exit(&self, store: &MemoryStore) -> String {
        store.snapshot_ref().unwrap_or_else(|e| {
            fail(format!("failed to digest {}: {e}", self.store_path.display()))
        })
    }

    /// Run one lock-scoped mutation against the store file.
    pub fn mutate_or_exit<T, E, F>(&self, mutator: F) -> T
    where
        E: Display,
        F: FnOnce(&mut MemoryStore) -> Result<(T, bool), E>,
    {
        mutate_store_jsonl(&self.store_path, mutator).unwrap_or_else(|e| fail(e))
    }
}

pub fn fail(message: impl Display) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}

pub fn print_json(payload: &Value) {
    match serde_json::to_string_pretty(payload) {
        Ok(text) => println!("{text}"),
        Err(e) => fail(format!("json serialization: {e}")),
    }
}
