//! `recordbook.toml` loading.
//!
//! Every field is optional; missing fields take their defaults. Command-line
//! flags and `RECORDBOOK_*` environment variables override the file.

use recordbook_core::{DEFAULT_MAX_CHAIN_DEPTH, ResolverLimits};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "recordbook.toml";
pub const DEFAULT_STORE_PATH: &str = ".recordbook/store.jsonl";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Store JSONL, relative to the working directory.
    pub store_path: PathBuf,
    /// Most links a single chain traversal may follow.
    pub max_chain_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("config {path}: max_chain_depth must be at least 1")]
    ZeroDepth { path: String },
}

impl Config {
    /// Load `explicit` when given, else `./recordbook.toml` if it exists,
    /// else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::parse(&raw, path)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn parse(raw: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: origin.display().to_string(),
            source,
        })?;
        if config.max_chain_depth == 0 {
            return Err(ConfigError::ZeroDepth {
                path: origin.display().to_string(),
            });
        }
        Ok(config)
    }

    pub fn limits(&self) -> ResolverLimits {
        ResolverLimits {
            max_depth: self.max_chain_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> &'static Path {
        Path::new("recordbook.toml")
    }

    #[test]
    fn empty_file_yields_defaults() {
        assert_eq!(Config::parse("", origin()).expect("parse"), Config::default());
    }

    #[test]
    fn fields_override_defaults() {
        let config = Config::parse(
            "store_path = \"data/records.jsonl\"\nmax_chain_depth = 64\n",
            origin(),
        )
        .expect("parse");
        assert_eq!(config.store_path, PathBuf::from("data/records.jsonl"));
        assert_eq!(config.limits().max_depth, 64);
    }

    #[test]
    fn unknown_fields_and_zero_depth_are_rejected() {
        assert!(matches!(
            Config::parse("store = \"x\"\n", origin()),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            Config::parse("max_chain_depth = 0\n", origin()),
            Err(ConfigError::ZeroDepth { .. })
        ));
    }
}
