use crate::db::Db;
use crate::error::StoreError;
use crate::models::{Location, Note};
use chrono::DateTime;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const NOTE_COLUMNS: &str = "id, title, content, category_id, location_name, \
     latitude, longitude, created_at, updated_at, is_archived";

/// Persistent table of the authenticated user's notes, keyed by id with a
/// secondary ordering index on creation time.
#[derive(Clone)]
pub struct NoteStore {
    db: Db,
}

impl NoteStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Fetch one page of notes ordered by creation time descending.
    ///
    /// Skips `(page - 1) * limit` rows and returns up to `limit`; the
    /// traversal walks the created_at index, so cost scales with
    /// skip + limit rather than table size. Page 0 is treated as page 1.
    pub fn get(&self, page: u32, limit: u32) -> Result<Vec<Note>, StoreError> {
        let page = page.max(1);
        let offset = (page as i64 - 1) * limit as i64;
        let conn = self.db.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes \
             ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2"
        ))?;
        let mut rows = stmt.query(params![limit as i64, offset])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(note_from_row(row)?);
        }
        Ok(notes)
    }

    /// Fetch a single note by id
    pub fn get_by_id(&self, id: Uuid) -> Result<Option<Note>, StoreError> {
        let conn = self.db.lock();
        let mut stmt =
            conn.prepare(&format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"))?;
        let mut rows = stmt.query(params![id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(note_from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Insert or update a note by id
    pub fn put(&self, note: &Note) -> Result<(), StoreError> {
        let conn = self.db.lock();
        upsert_note(&conn, note)
    }

    /// Replace the entire table with the given notes in one transaction
    /// (used when a full remote snapshot becomes authoritative)
    pub fn replace_all(&self, notes: &[Note]) -> Result<(), StoreError> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM notes", [])?;
        for note in notes {
            upsert_note(&tx, note)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Merge the given notes into the table additively, in one transaction
    /// (used for incremental paging)
    pub fn add_all(&self, notes: &[Note]) -> Result<(), StoreError> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;
        for note in notes {
            upsert_note(&tx, note)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Remove a note; deleting an id that isn't present is a no-op
    pub fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let conn = self.db.lock();
        conn.execute("DELETE FROM notes WHERE id = ?1", params![id.to_string()])?;
        Ok(())
    }

    /// Empty the table
    pub fn clear(&self) -> Result<(), StoreError> {
        let conn = self.db.lock();
        conn.execute("DELETE FROM notes", [])?;
        Ok(())
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        let conn = self.db.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Upsert a single row. On conflict every column is replaced except
/// `created_at`: creation time is immutable once a row exists.
fn upsert_note(conn: &Connection, note: &Note) -> Result<(), StoreError> {
    let (location_name, latitude, longitude) = match &note.location {
        Some(loc) => (Some(loc.name.as_str()), Some(loc.latitude), Some(loc.longitude)),
        None => (None, None, None),
    };
    conn.execute(
        "INSERT INTO notes (id, title, content, category_id, location_name, \
                            latitude, longitude, created_at, updated_at, is_archived)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            content = excluded.content,
            category_id = excluded.category_id,
            location_name = excluded.location_name,
            latitude = excluded.latitude,
            longitude = excluded.longitude,
            updated_at = excluded.updated_at,
            is_archived = excluded.is_archived",
        params![
            note.id.to_string(),
            note.title,
            note.content,
            note.category_id.map(|c| c.to_string()),
            location_name,
            latitude,
            longitude,
            note.created_at.timestamp_millis(),
            note.updated_at.timestamp_millis(),
            note.is_archived,
        ],
    )?;
    Ok(())
}

fn note_from_row(row: &Row<'_>) -> Result<Note, StoreError> {
    let id: String = row.get(0)?;
    let category_id: Option<String> = row.get(3)?;
    let location_name: Option<String> = row.get(4)?;
    let created_ms: i64 = row.get(7)?;
    let updated_ms: i64 = row.get(8)?;

    let location = match location_name {
        Some(name) => {
            let latitude: Option<f64> = row.get(5)?;
            let longitude: Option<f64> = row.get(6)?;
            match (latitude, longitude) {
                (Some(latitude), Some(longitude)) => Some(Location {
                    name,
                    latitude,
                    longitude,
                }),
                _ => {
                    return Err(StoreError::Corrupt(format!(
                        "note {id} has a location name but no coordinates"
                    )))
                }
            }
        }
        None => None,
    };

    Ok(Note {
        id: parse_uuid(&id)?,
        title: row.get(1)?,
        content: row.get(2)?,
        category_id: category_id.as_deref().map(parse_uuid).transpose()?,
        location,
        created_at: DateTime::from_timestamp_millis(created_ms)
            .ok_or_else(|| StoreError::Corrupt(format!("note {id}: bad created_at {created_ms}")))?,
        updated_at: DateTime::from_timestamp_millis(updated_ms)
            .ok_or_else(|| StoreError::Corrupt(format!("note {id}: bad updated_at {updated_ms}")))?,
        is_archived: row.get(9)?,
    })
}

pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|e| StoreError::Corrupt(format!("bad uuid {raw}: {e}")))
}
