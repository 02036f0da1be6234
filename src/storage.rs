//! Save-data serialization.
//!
//! A save is the persistable slice of the rollback history, newest last;
//! loading it restores the newest snapshot and keeps the older ones
//! available for rollback. Encoding is versioned JSON.

use crate::state::Snapshot;
use serde::{Deserialize, Serialize};

const SAVE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveData {
    version: u32,
    snapshots: Vec<Snapshot>,
}

impl SaveData {
    pub fn new(snapshots: Vec<Snapshot>) -> Self {
        Self {
            version: SAVE_VERSION,
            snapshots,
        }
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn into_snapshots(self) -> Vec<Snapshot> {
        self.snapshots
    }
}

/// Encode save data to bytes using JSON serialization.
pub fn save(data: &SaveData) -> anyhow::Result<Vec<u8>> {
    let json = serde_json::to_string_pretty(data)?;
    Ok(json.into_bytes())
}

/// Decode save data from bytes, rejecting unknown versions.
pub fn load(bytes: &[u8]) -> anyhow::Result<SaveData> {
    let data: SaveData = serde_json::from_slice(bytes)?;
    if data.version != SAVE_VERSION {
        anyhow::bail!(
            "unsupported save version {} (expected {SAVE_VERSION})",
            data.version
        );
    }
    Ok(data)
}

pub async fn save_to_file(path: impl AsRef<std::path::Path>, data: &SaveData) -> anyhow::Result<()> {
    let bytes = save(data)?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

pub async fn load_from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<SaveData> {
    let bytes = tokio::fs::read(path).await?;
    load(&bytes)
}
