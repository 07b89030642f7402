use crate::connectivity::LifecycleHandle;
use crate::feed::NoteFeed;
use crate::notice::{Notice, NoticeSender};
use jot_core::{Db, Mutation, Note, NoteDraft, NoteStore, StoreError, SyncQueue};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use uuid::Uuid;

struct PendingUndo {
    note: Note,
    expires_at: Instant,
}

/// Applies user intents optimistically: each mutation is enqueued durably
/// FIRST, then applied to the local store for immediate visibility. The
/// reverse order could leave a visible-but-unqueued edit that a crash
/// would lose.
///
/// Deletions keep a copy of the note for an undo window; undoing
/// supersedes the still-queued DELETE before re-enqueueing the note, so
/// a late drain cannot remove a restored note.
pub struct Coordinator {
    store: NoteStore,
    queue: SyncQueue,
    feed: Arc<NoteFeed>,
    notices: NoticeSender,
    lifecycle: LifecycleHandle,
    online: watch::Receiver<bool>,
    undo_window: Duration,
    pending_undos: HashMap<Uuid, PendingUndo>,
}

impl Coordinator {
    pub fn new(
        db: &Db,
        feed: Arc<NoteFeed>,
        notices: NoticeSender,
        lifecycle: LifecycleHandle,
        online: watch::Receiver<bool>,
        undo_window: Duration,
    ) -> Self {
        Self {
            store: NoteStore::new(db.clone()),
            queue: SyncQueue::new(db.clone()),
            feed,
            notices,
            lifecycle,
            online,
            undo_window,
            pending_undos: HashMap::new(),
        }
    }

    /// Create a note with a client-generated id so creation works offline
    pub fn create_note(&mut self, draft: NoteDraft) -> Result<Note, StoreError> {
        let result = self.create_note_inner(draft);
        self.surface(result)
    }

    /// Persist an edited note. The stored creation time is preserved and
    /// `updated_at` never moves backwards.
    pub fn update_note(&mut self, note: Note) -> Result<Note, StoreError> {
        let result = self.update_note_inner(note);
        self.surface(result)
    }

    /// Remove a note locally and queue the remote delete. The note is
    /// retained for `undo_window` so the user can change their mind.
    pub fn delete_note(&mut self, id: Uuid) -> Result<(), StoreError> {
        let result = self.delete_note_inner(id);
        self.surface(result)
    }

    /// Restore a recently deleted note. Returns the restored note, or
    /// `None` when the undo window has passed (the delete stands).
    pub fn undo_delete(&mut self, id: Uuid) -> Result<Option<Note>, StoreError> {
        let result = self.undo_delete_inner(id);
        self.surface(result)
    }

    pub fn archive_note(&mut self, id: Uuid) -> Result<Option<Note>, StoreError> {
        let result = self.set_archived(id, true);
        self.surface(result)
    }

    pub fn unarchive_note(&mut self, id: Uuid) -> Result<Option<Note>, StoreError> {
        let result = self.set_archived(id, false);
        self.surface(result)
    }

    /// Explicit user-requested sync
    pub fn request_sync(&self) {
        self.lifecycle.request_sync();
    }

    fn create_note_inner(&mut self, draft: NoteDraft) -> Result<Note, StoreError> {
        let note = Note::new(draft);
        self.queue.enqueue(Mutation::Save(note.clone()))?;
        self.store.put(&note)?;
        self.after_mutation();
        Ok(note)
    }

    fn update_note_inner(&mut self, mut note: Note) -> Result<Note, StoreError> {
        if let Some(existing) = self.store.get_by_id(note.id)? {
            note.created_at = existing.created_at;
            if note.updated_at < existing.updated_at {
                note.updated_at = existing.updated_at;
            }
        }
        note.touch();
        self.queue.enqueue(Mutation::Save(note.clone()))?;
        self.store.put(&note)?;
        self.after_mutation();
        Ok(note)
    }

    fn delete_note_inner(&mut self, id: Uuid) -> Result<(), StoreError> {
        self.purge_expired_undos();
        let Some(note) = self.store.get_by_id(id)? else {
            return Ok(());
        };
        self.queue.enqueue(Mutation::Delete(id))?;
        self.store.delete(id)?;
        self.pending_undos.insert(
            id,
            PendingUndo {
                note,
                expires_at: Instant::now() + self.undo_window,
            },
        );
        self.after_mutation();
        Ok(())
    }

    fn undo_delete_inner(&mut self, id: Uuid) -> Result<Option<Note>, StoreError> {
        self.purge_expired_undos();
        let Some(pending) = self.pending_undos.remove(&id) else {
            tracing::debug!(%id, "undo requested outside the window, ignoring");
            return Ok(None);
        };
        // Supersede the queued DELETE; otherwise a drain after this undo
        // could remove the note remotely despite a successful-looking
        // restore.
        let superseded = self.queue.remove_deletes_for(id)?;
        tracing::debug!(%id, superseded, "restoring deleted note");
        self.queue.enqueue(Mutation::Save(pending.note.clone()))?;
        self.store.put(&pending.note)?;
        self.after_mutation();
        Ok(Some(pending.note))
    }

    fn set_archived(&mut self, id: Uuid, archived: bool) -> Result<Option<Note>, StoreError> {
        let Some(mut note) = self.store.get_by_id(id)? else {
            return Ok(None);
        };
        if note.is_archived == archived {
            return Ok(Some(note));
        }
        note.is_archived = archived;
        note.touch();
        self.queue.enqueue(Mutation::Save(note.clone()))?;
        self.store.put(&note)?;
        self.after_mutation();
        Ok(Some(note))
    }

    fn purge_expired_undos(&mut self) {
        let now = Instant::now();
        self.pending_undos.retain(|_, pending| pending.expires_at > now);
    }

    /// Publish the new list state and, when online, nudge the engine.
    /// Offline mutations stay queued; no network call is attempted.
    fn after_mutation(&self) {
        if let Err(err) = self.feed.refresh(&self.store) {
            self.notices.send(Notice::StorageFailure {
                reason: err.to_string(),
            });
        }
        if *self.online.borrow() {
            self.lifecycle.request_sync();
        }
    }

    /// Storage failures reach the UI as a digest notice, never as a raw
    /// error object
    fn surface<T>(&self, result: Result<T, StoreError>) -> Result<T, StoreError> {
        if let Err(err) = &result {
            self.notices.send(Notice::StorageFailure {
                reason: err.to_string(),
            });
        }
        result
    }
}
