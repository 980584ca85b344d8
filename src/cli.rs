//! Shared helpers for the command-line binaries

use crate::blockchain::Blockchain;
use crate::config::{load_config, Config};
use crate::error::Result;
use crate::persistence;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Snapshot file used when neither the command line nor the config names one
pub const DEFAULT_LEDGER_FILE: &str = "ledger.json";

/// Install the fmt subscriber on stderr. `RUST_LOG` overrides
/// `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // a second install (tests, embedding) is not an error worth surfacing
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Pick the snapshot file: explicit path, then `[storage] snapshot_path`,
/// then [`DEFAULT_LEDGER_FILE`].
pub fn resolve_ledger_path(explicit: Option<&Path>, config: &Config) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| config.storage.snapshot_path.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER_FILE))
}

/// Load the config and the ledger it points at, creating a fresh chain when
/// the snapshot file does not exist yet.
pub fn load_blockchain_from_config(
    explicit: Option<&Path>,
) -> Result<(Config, PathBuf, Blockchain)> {
    let config = load_config()?;
    let path = resolve_ledger_path(explicit, &config);
    let chain = persistence::load_or_create(&path, &config)?;
    Ok((config, path, chain))
}

pub fn save_blockchain(path: &Path, chain: &Blockchain) -> Result<()> {
    persistence::save_snapshot(path, &chain.export())
}
