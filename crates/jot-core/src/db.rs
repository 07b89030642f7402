use crate::error::StoreError;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Schema for the on-device database: the notes table with its
/// creation-time index, the durable mutation queue, and a small
/// key/value table for sync metadata (sequence counter, last sync).
///
/// Timestamps are stored as Unix milliseconds so the created_at index
/// orders chronologically. The queue's `seq` is supplied by an explicit
/// counter in `sync_meta`, not by SQLite autoincrement.
const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS notes (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        category_id TEXT,
        location_name TEXT,
        latitude REAL,
        longitude REAL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        is_archived INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS notes_created_at ON notes(created_at DESC, id DESC);
    CREATE TABLE IF NOT EXISTS sync_queue (
        seq INTEGER PRIMARY KEY,
        kind TEXT NOT NULL,
        note_id TEXT NOT NULL,
        payload TEXT,
        queued_at INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS sync_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
";

/// Handle to the local SQLite database, shared by the note store and the
/// sync queue. Opened once at process start and passed around explicitly;
/// there is no ambient global connection.
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    /// Open the database at the given path, creating parent directories and
    /// initializing tables if needed
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database with the same schema, for tests
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    /// Close the underlying connection if this is the last handle.
    /// Remaining handles keep the connection alive until they drop.
    pub fn close(self) -> Result<(), StoreError> {
        match Arc::try_unwrap(self.conn) {
            Ok(mutex) => {
                let conn = mutex.into_inner().unwrap();
                conn.close().map_err(|(_, e)| StoreError::Database(e))
            }
            Err(_) => Ok(()),
        }
    }
}
