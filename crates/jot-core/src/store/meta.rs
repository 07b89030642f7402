use crate::db::Db;
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

const LAST_SYNC_KEY: &str = "last_sync_at";

/// Accessor for the scalar sync metadata: the last-successful-full-sync
/// marker. The queue's sequence counter lives in the same table but is
/// managed by [`crate::store::SyncQueue`] inside its enqueue transaction.
#[derive(Clone)]
pub struct SyncMeta {
    db: Db,
}

impl SyncMeta {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn last_sync_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let conn = self.db.lock();
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM sync_meta WHERE key = ?1",
                params![LAST_SYNC_KEY],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => {
                let parsed = DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| StoreError::Corrupt(format!("bad last_sync_at {raw}: {e}")))?;
                Ok(Some(parsed.with_timezone(&Utc)))
            }
            None => Ok(None),
        }
    }

    pub fn set_last_sync_at(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO sync_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![LAST_SYNC_KEY, at.to_rfc3339()],
        )?;
        Ok(())
    }
}
