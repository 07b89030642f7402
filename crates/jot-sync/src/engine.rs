use crate::connectivity::SyncTrigger;
use crate::feed::NoteFeed;
use crate::notice::{Notice, NoticeSender};
use crate::remote::{RemoteError, RemoteStore};
use crate::status::{StatusHandle, SyncState};
use anyhow::Result;
use chrono::Utc;
use jot_core::config::SyncSettings;
use jot_core::{Db, Mutation, NoteStore, QueueEntry, StoreError, SyncMeta, SyncQueue};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Tuning for drain retries and remote call timeouts
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub request_timeout: Duration,
    pub max_attempts: u32,
    pub retry_base: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_attempts: 5,
            retry_base: Duration::from_millis(500),
        }
    }
}

impl EngineConfig {
    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self {
            request_timeout: Duration::from_secs(settings.request_timeout_seconds),
            max_attempts: settings.max_attempts,
            retry_base: Duration::from_millis(settings.retry_base_ms),
        }
    }
}

/// Drains the durable mutation queue against the remote store and then
/// reconciles the local store with the remote snapshot.
///
/// State machine: Idle -> Syncing -> {Idle, Failed}. Exactly one pass runs
/// at a time; a trigger landing mid-pass is recorded and re-evaluated once
/// the pass settles, never aborting it. Mutual exclusion comes from the
/// state field, not a lock: the whole subsystem is single-tasked.
pub struct SyncEngine<R: RemoteStore> {
    store: NoteStore,
    queue: SyncQueue,
    meta: SyncMeta,
    remote: R,
    config: EngineConfig,
    feed: Arc<NoteFeed>,
    notices: NoticeSender,
    status: StatusHandle,
    state: SyncState,
    pending_trigger: Option<SyncTrigger>,
}

impl<R: RemoteStore> SyncEngine<R> {
    pub fn new(
        db: &Db,
        remote: R,
        config: EngineConfig,
        feed: Arc<NoteFeed>,
        notices: NoticeSender,
        status: StatusHandle,
    ) -> Self {
        Self {
            store: NoteStore::new(db.clone()),
            queue: SyncQueue::new(db.clone()),
            meta: SyncMeta::new(db.clone()),
            remote,
            config,
            feed,
            notices,
            status,
            state: SyncState::Idle,
            pending_trigger: None,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Run a sync pass for the given trigger. Re-entrant triggers while a
    /// pass is in flight are deferred to the next idle transition.
    pub async fn sync(&mut self, trigger: SyncTrigger) {
        if self.state == SyncState::Syncing {
            self.pending_trigger = Some(trigger);
            return;
        }
        let mut current = trigger;
        loop {
            self.transition(SyncState::Syncing, None);
            tracing::info!(trigger = ?current, "sync pass started");
            match self.run_pass().await {
                Ok(()) => {
                    tracing::info!("sync pass completed");
                    self.transition(SyncState::Idle, None);
                }
                Err(err) => {
                    tracing::warn!(%err, "sync pass failed");
                    let notice = match err.downcast_ref::<StoreError>() {
                        Some(_) => Notice::StorageFailure {
                            reason: err.to_string(),
                        },
                        None => Notice::SyncFailed {
                            reason: err.to_string(),
                        },
                    };
                    self.notices.send(notice);
                    self.transition(SyncState::Failed, Some(err.to_string()));
                }
            }
            match self.pending_trigger.take() {
                Some(next) => current = next,
                None => break,
            }
        }
    }

    /// One full pass, in two explicit phases: the drain must complete and
    /// leave the queue empty before the remote snapshot may overwrite the
    /// local store. That ordering is what keeps a queued retry from being
    /// clobbered by a stale remote copy.
    async fn run_pass(&mut self) -> Result<()> {
        self.drain_queue().await?;
        if !self.queue.is_empty()? {
            // A mutation was enqueued mid-pass; the snapshot is only
            // authoritative over an empty queue, so reconcile next time.
            tracing::debug!("queue refilled during drain, deferring reconcile");
            return Ok(());
        }
        self.reconcile().await?;
        self.meta.set_last_sync_at(Utc::now())?;
        Ok(())
    }

    /// Push queued mutations to the remote strictly in sequence order. A
    /// transient failure aborts the drain with the failing entry and
    /// everything after it still queued; later entries are never attempted
    /// before an earlier one succeeds.
    async fn drain_queue(&mut self) -> Result<()> {
        let entries = self.queue.drain()?;
        if entries.is_empty() {
            return Ok(());
        }
        tracing::debug!(pending = entries.len(), "draining sync queue");
        for entry in entries {
            self.push_entry(&entry).await?;
        }
        Ok(())
    }

    /// Resolve one entry: confirmed by the remote, or permanently
    /// rejected and dropped. Transient failures retry with exponential
    /// backoff up to `max_attempts`, then abort the pass.
    async fn push_entry(&mut self, entry: &QueueEntry) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.attempt(entry).await {
                Ok(()) => {
                    self.queue.remove(entry.seq)?;
                    tracing::debug!(seq = entry.seq, "mutation confirmed");
                    return Ok(());
                }
                Err(err) if err.is_transient() => {
                    if attempt >= self.config.max_attempts {
                        anyhow::bail!(
                            "entry {} still failing after {} attempts: {}",
                            entry.seq,
                            attempt,
                            err
                        );
                    }
                    let delay = self.config.retry_base * 2u32.saturating_pow(attempt - 1);
                    tracing::warn!(seq = entry.seq, attempt, ?delay, %err, "transient failure, backing off");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    tracing::warn!(seq = entry.seq, %err, "mutation permanently rejected");
                    self.queue.remove(entry.seq)?;
                    self.notices.send(Notice::MutationRejected {
                        note_id: entry.mutation.note_id(),
                        kind: entry.mutation.kind(),
                        reason: err.to_string(),
                    });
                    return Ok(());
                }
            }
        }
    }

    async fn attempt(&self, entry: &QueueEntry) -> Result<(), RemoteError> {
        let outcome = match &entry.mutation {
            Mutation::Save(note) => timeout(self.config.request_timeout, self.remote.upsert(note))
                .await
                .map(|result| result.map(|_| ())),
            Mutation::Delete(id) => {
                timeout(self.config.request_timeout, self.remote.delete(*id)).await
            }
        };
        match outcome {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Transient(format!(
                "remote call timed out after {:?}",
                self.config.request_timeout
            ))),
        }
    }

    /// Fetch the remote snapshot and make it the local store's content
    async fn reconcile(&mut self) -> Result<()> {
        let snapshot = match timeout(self.config.request_timeout, self.remote.list()).await {
            Ok(result) => result?,
            Err(_) => anyhow::bail!(
                "remote list timed out after {:?}",
                self.config.request_timeout
            ),
        };
        tracing::debug!(count = snapshot.len(), "applying remote snapshot");
        self.store.replace_all(&snapshot)?;
        self.feed.refresh(&self.store)?;
        Ok(())
    }

    fn transition(&mut self, state: SyncState, error: Option<String>) {
        self.state = state;
        let pending = self.queue.len().unwrap_or(0);
        let last_sync = self.meta.last_sync_at().unwrap_or(None);
        self.status.update(|info| {
            info.state = state;
            info.pending = pending;
            info.last_sync = last_sync;
            info.error = error;
        });
    }
}
