//! JSON snapshots of the in-memory store, used to survive restarts.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use forexalert_common::{Alert, AlertTriggerRecord, RateHistoryPoint, RatePoint};

use crate::error::{StoreError, StoreResult};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable copy of the committed store state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    pub current: Vec<RatePoint>,
    pub history: Vec<RateHistoryPoint>,
    pub alerts: Vec<Alert>,
    pub triggers: Vec<AlertTriggerRecord>,
}

impl StoreSnapshot {
    pub fn new(
        current: Vec<RatePoint>,
        history: Vec<RateHistoryPoint>,
        alerts: Vec<Alert>,
        triggers: Vec<AlertTriggerRecord>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            current,
            history,
            alerts,
            triggers,
        }
    }

    /// Write the snapshot to `path`.
    ///
    /// The file is written next to its destination and renamed into place,
    /// so a crash mid-write leaves the previous snapshot intact.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let path = path.as_ref();
        let tmp = path.with_extension("json.tmp");

        let bytes = serde_json::to_vec_pretty(self)?;
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;

        debug!(path = %path.display(), rates = self.current.len(), "Snapshot saved");
        Ok(())
    }

    /// Read a snapshot from `path`.
    pub fn load_from_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let bytes = fs::read(path.as_ref())?;
        let snapshot: StoreSnapshot = serde_json::from_slice(&bytes)?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::Unavailable(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        Ok(snapshot)
    }
}
