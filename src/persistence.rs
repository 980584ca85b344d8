//! Snapshot files for hashledger
//!
//! The ledger lives in memory; this module only writes and reads the bulk
//! interchange form so an instance can be stopped and restored.

use crate::blockchain::{Blockchain, LedgerSnapshot};
use crate::config::Config;
use crate::error::Result;
use std::fs;
use std::path::Path;
use tracing::info;

/// Write `snapshot` as pretty JSON. The file is written next to `path` and
/// renamed into place, so readers never see a half-written snapshot.
pub fn save_snapshot(path: impl AsRef<Path>, snapshot: &LedgerSnapshot) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, snapshot.to_json()?)?;
    fs::rename(&tmp_path, path)?;

    info!(path = %path.display(), blocks = snapshot.chain.len(), "Snapshot saved");
    Ok(())
}

pub fn load_snapshot(path: impl AsRef<Path>) -> Result<LedgerSnapshot> {
    let data = fs::read_to_string(path.as_ref())?;
    LedgerSnapshot::from_json(&data)
}

/// Restore the ledger from `path` if the file exists, otherwise start a new
/// chain. Ledger settings not carried by the snapshot (index, cancel check
/// interval) come from `config`.
pub fn load_or_create(path: impl AsRef<Path>, config: &Config) -> Result<Blockchain> {
    let path = path.as_ref();
    let mut chain = Blockchain::from_config(config)?;
    if path.exists() {
        let snapshot = load_snapshot(path)?;
        chain.import(snapshot)?;
        info!(path = %path.display(), blocks = chain.len(), "Ledger restored from snapshot");
    }
    Ok(chain)
}
