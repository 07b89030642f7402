use jot_core::{Note, NoteStore, StoreError};
use tokio::sync::watch;

/// Materialized, reactive view of the newest notes. The UI re-renders on
/// every change to the watch channel; the coordinator and the sync engine
/// refresh it after each local store write.
pub struct NoteFeed {
    tx: watch::Sender<Vec<Note>>,
    page_size: u32,
}

impl NoteFeed {
    pub fn new(page_size: u32) -> Self {
        let (tx, _) = watch::channel(Vec::new());
        Self { tx, page_size }
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Note>> {
        self.tx.subscribe()
    }

    /// Re-materialize the first page from the store and publish it. The
    /// value is stored even when nobody is subscribed yet, so `current`
    /// and late subscribers see the latest page.
    pub fn refresh(&self, store: &NoteStore) -> Result<(), StoreError> {
        let notes = store.get(1, self.page_size)?;
        self.tx.send_replace(notes);
        Ok(())
    }

    pub fn current(&self) -> Vec<Note> {
        self.tx.borrow().clone()
    }
}
