use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Phase of the sync engine's state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Syncing,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatusInfo {
    pub state: SyncState,
    pub last_sync: Option<DateTime<Utc>>,
    pub pending: u64,
    pub error: Option<String>,
}

impl Default for SyncStatusInfo {
    fn default() -> Self {
        Self {
            state: SyncState::Idle,
            last_sync: None,
            pending: 0,
            error: None,
        }
    }
}

/// Publisher for engine status; the UI layer holds the watch receiver
pub struct StatusHandle {
    tx: watch::Sender<SyncStatusInfo>,
}

impl StatusHandle {
    pub fn new() -> (Self, watch::Receiver<SyncStatusInfo>) {
        let (tx, rx) = watch::channel(SyncStatusInfo::default());
        (Self { tx }, rx)
    }

    pub fn update(&self, apply: impl FnOnce(&mut SyncStatusInfo)) {
        self.tx.send_modify(apply);
    }
}
