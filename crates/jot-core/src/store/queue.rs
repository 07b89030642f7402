use crate::db::Db;
use crate::error::StoreError;
use crate::models::Note;
use crate::store::notes::parse_uuid;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const KIND_SAVE: &str = "save";
const KIND_DELETE: &str = "delete";

/// A mutation awaiting confirmation by the remote store: a full-note save
/// or a delete by bare id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    Save(Note),
    Delete(Uuid),
}

impl Mutation {
    pub fn note_id(&self) -> Uuid {
        match self {
            Mutation::Save(note) => note.id,
            Mutation::Delete(id) => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::Save(_) => KIND_SAVE,
            Mutation::Delete(_) => KIND_DELETE,
        }
    }
}

/// One durable queue record. Entries are immutable once written and only
/// ever removed, either on remote confirmation or on permanent rejection.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    /// Monotonic sequence number, the sole ordering key
    pub seq: i64,
    pub mutation: Mutation,
    pub queued_at: DateTime<Utc>,
}

/// Durable FIFO list of pending mutations.
///
/// Sequence numbers come from an explicit counter persisted in `sync_meta`
/// and assigned inside the enqueue transaction, so ordering is a property
/// of the data itself rather than of SQLite's rowid allocation.
#[derive(Clone)]
pub struct SyncQueue {
    db: Db,
}

impl SyncQueue {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Append a mutation with a fresh sequence number. Returns only once
    /// the entry is persisted; callers apply the visible local change
    /// after this succeeds, never before.
    pub fn enqueue(&self, mutation: Mutation) -> Result<QueueEntry, StoreError> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;
        let seq = next_sequence(&tx)?;
        let queued_at = Utc::now();
        let payload = match &mutation {
            Mutation::Save(note) => Some(serde_json::to_string(note)?),
            Mutation::Delete(_) => None,
        };
        tx.execute(
            "INSERT INTO sync_queue (seq, kind, note_id, payload, queued_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                seq,
                mutation.kind(),
                mutation.note_id().to_string(),
                payload,
                queued_at.timestamp_millis(),
            ],
        )?;
        tx.commit()?;
        tracing::debug!(seq, kind = mutation.kind(), "enqueued mutation");
        Ok(QueueEntry {
            seq,
            mutation,
            queued_at,
        })
    }

    /// All pending entries in ascending sequence order
    pub fn drain(&self) -> Result<Vec<QueueEntry>, StoreError> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare(
            "SELECT seq, kind, note_id, payload, queued_at FROM sync_queue ORDER BY seq ASC",
        )?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(entry_from_row(row)?);
        }
        Ok(entries)
    }

    /// Remove one confirmed entry
    pub fn remove(&self, seq: i64) -> Result<(), StoreError> {
        let conn = self.db.lock();
        conn.execute("DELETE FROM sync_queue WHERE seq = ?1", params![seq])?;
        Ok(())
    }

    /// Remove any still-queued DELETE entries for the given note, returning
    /// how many were superseded. Used by undo-delete so a late drain can't
    /// remove a note the user just restored.
    pub fn remove_deletes_for(&self, note_id: Uuid) -> Result<usize, StoreError> {
        let conn = self.db.lock();
        let removed = conn.execute(
            "DELETE FROM sync_queue WHERE kind = ?1 AND note_id = ?2",
            params![KIND_DELETE, note_id.to_string()],
        )?;
        Ok(removed)
    }

    /// Empty the queue (after a destructive full resync that supersedes
    /// pending local deltas)
    pub fn clear(&self) -> Result<(), StoreError> {
        let conn = self.db.lock();
        conn.execute("DELETE FROM sync_queue", [])?;
        Ok(())
    }

    pub fn len(&self) -> Result<u64, StoreError> {
        let conn = self.db.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

/// Read and advance the persisted sequence counter within the caller's
/// transaction
fn next_sequence(conn: &Connection) -> Result<i64, StoreError> {
    let current: Option<String> = conn
        .query_row(
            "SELECT value FROM sync_meta WHERE key = 'next_seq'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    let seq = match current {
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|e| StoreError::Corrupt(format!("bad next_seq {raw}: {e}")))?,
        None => 1,
    };
    conn.execute(
        "INSERT INTO sync_meta (key, value) VALUES ('next_seq', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![(seq + 1).to_string()],
    )?;
    Ok(seq)
}

fn entry_from_row(row: &Row<'_>) -> Result<QueueEntry, StoreError> {
    let seq: i64 = row.get(0)?;
    let kind: String = row.get(1)?;
    let note_id: String = row.get(2)?;
    let payload: Option<String> = row.get(3)?;
    let queued_ms: i64 = row.get(4)?;

    let mutation = match kind.as_str() {
        KIND_SAVE => {
            let payload = payload.ok_or_else(|| {
                StoreError::Corrupt(format!("queue entry {seq} is a save without a payload"))
            })?;
            Mutation::Save(serde_json::from_str(&payload)?)
        }
        KIND_DELETE => Mutation::Delete(parse_uuid(&note_id)?),
        other => {
            return Err(StoreError::Corrupt(format!(
                "queue entry {seq} has unknown kind {other}"
            )))
        }
    };

    Ok(QueueEntry {
        seq,
        mutation,
        queued_at: DateTime::from_timestamp_millis(queued_ms).ok_or_else(|| {
            StoreError::Corrupt(format!("queue entry {seq}: bad queued_at {queued_ms}"))
        })?,
    })
}
