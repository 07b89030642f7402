use async_trait::async_trait;
use jot_core::{Db, Mutation, Note, NoteDraft, NoteStore, SyncQueue};
use jot_sync::{
    notice_channel, ConnectivityMonitor, Coordinator, EngineConfig, NoteFeed, Notice, RemoteError,
    RemoteStore, StatusHandle, SyncEngine, SyncState, SyncStatusInfo, SyncTrigger,
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use uuid::Uuid;

/// In-memory remote with per-note failure scripts, standing in for the
/// server's CRUD API
#[derive(Clone, Default)]
struct MockRemote {
    inner: Arc<RemoteInner>,
}

#[derive(Default)]
struct RemoteInner {
    notes: Mutex<BTreeMap<Uuid, Note>>,
    upsert_failures: Mutex<HashMap<Uuid, VecDeque<RemoteError>>>,
    delete_failures: Mutex<HashMap<Uuid, VecDeque<RemoteError>>>,
    upsert_log: Mutex<Vec<Uuid>>,
    delete_log: Mutex<Vec<Uuid>>,
}

impl MockRemote {
    fn seed(&self, note: Note) {
        self.inner.notes.lock().unwrap().insert(note.id, note);
    }

    fn notes(&self) -> Vec<Note> {
        let mut notes: Vec<Note> = self.inner.notes.lock().unwrap().values().cloned().collect();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notes
    }

    fn fail_upserts_for(&self, id: Uuid, errors: Vec<RemoteError>) {
        self.inner
            .upsert_failures
            .lock()
            .unwrap()
            .insert(id, errors.into());
    }

    fn fail_deletes_for(&self, id: Uuid, errors: Vec<RemoteError>) {
        self.inner
            .delete_failures
            .lock()
            .unwrap()
            .insert(id, errors.into());
    }

    fn upsert_log(&self) -> Vec<Uuid> {
        self.inner.upsert_log.lock().unwrap().clone()
    }

    fn delete_log(&self) -> Vec<Uuid> {
        self.inner.delete_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteStore for MockRemote {
    async fn list(&self) -> Result<Vec<Note>, RemoteError> {
        Ok(self.notes())
    }

    async fn upsert(&self, note: &Note) -> Result<Note, RemoteError> {
        self.inner.upsert_log.lock().unwrap().push(note.id);
        if let Some(scripted) = self.inner.upsert_failures.lock().unwrap().get_mut(&note.id) {
            if let Some(err) = scripted.pop_front() {
                return Err(err);
            }
        }
        self.inner.notes.lock().unwrap().insert(note.id, note.clone());
        Ok(note.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RemoteError> {
        self.inner.delete_log.lock().unwrap().push(id);
        if let Some(scripted) = self.inner.delete_failures.lock().unwrap().get_mut(&id) {
            if let Some(err) = scripted.pop_front() {
                return Err(err);
            }
        }
        self.inner.notes.lock().unwrap().remove(&id);
        Ok(())
    }
}

fn transient() -> RemoteError {
    RemoteError::Transient("connection reset".to_string())
}

fn rejected(reason: &str) -> RemoteError {
    RemoteError::Rejected(reason.to_string())
}

fn note(title: &str) -> Note {
    Note::new(NoteDraft::titled(title))
}

fn quick_config() -> EngineConfig {
    EngineConfig {
        request_timeout: Duration::from_secs(1),
        max_attempts: 3,
        retry_base: Duration::from_millis(1),
    }
}

struct Fixture {
    store: NoteStore,
    queue: SyncQueue,
    feed: Arc<NoteFeed>,
    remote: MockRemote,
    engine: SyncEngine<MockRemote>,
    notices: UnboundedReceiver<Notice>,
    status: watch::Receiver<SyncStatusInfo>,
}

fn fixture() -> Fixture {
    let db = Db::open_in_memory().expect("open db");
    let store = NoteStore::new(db.clone());
    let queue = SyncQueue::new(db.clone());
    let feed = Arc::new(NoteFeed::new(20));
    let remote = MockRemote::default();
    let (notice_tx, notices) = notice_channel();
    let (status_tx, status) = StatusHandle::new();
    let engine = SyncEngine::new(
        &db,
        remote.clone(),
        quick_config(),
        feed.clone(),
        notice_tx,
        status_tx,
    );
    Fixture {
        store,
        queue,
        feed,
        remote,
        engine,
        notices,
        status,
    }
}

#[tokio::test]
async fn test_offline_edits_converge_after_sync() {
    let mut fx = fixture();
    let groceries = note("Buy milk");
    let scratch = note("scratch");
    fx.queue.enqueue(Mutation::Save(groceries.clone())).unwrap();
    fx.queue.enqueue(Mutation::Save(scratch.clone())).unwrap();
    fx.queue.enqueue(Mutation::Delete(scratch.id)).unwrap();

    fx.engine.sync(SyncTrigger::Manual).await;

    assert_eq!(fx.engine.state(), SyncState::Idle);
    assert!(fx.queue.is_empty().unwrap());

    let remote_notes = fx.remote.notes();
    assert_eq!(remote_notes.len(), 1);
    assert_eq!(remote_notes[0].id, groceries.id);

    // Local and remote note sets are identical after the pass.
    let local = fx.store.get(1, 10).unwrap();
    let local_ids: Vec<Uuid> = local.iter().map(|n| n.id).collect();
    let remote_ids: Vec<Uuid> = remote_notes.iter().map(|n| n.id).collect();
    assert_eq!(local_ids, remote_ids);

    let status = fx.status.borrow().clone();
    assert_eq!(status.state, SyncState::Idle);
    assert_eq!(status.pending, 0);
    assert!(status.last_sync.is_some());
}

#[tokio::test]
async fn test_transient_failure_stops_the_drain_in_order() {
    let mut fx = fixture();
    let first = note("first");
    let second = note("second");
    let third = note("third");
    fx.queue.enqueue(Mutation::Save(first.clone())).unwrap();
    fx.queue.enqueue(Mutation::Save(second.clone())).unwrap();
    fx.queue.enqueue(Mutation::Save(third.clone())).unwrap();
    fx.store.put(&second).unwrap();

    // s2 fails through every attempt of this pass; s3 must not run.
    fx.remote
        .fail_upserts_for(second.id, vec![transient(), transient(), transient()]);
    // A remote-only note that a clobbering reconcile would pull in.
    fx.remote.seed(note("remote-only"));

    fx.engine.sync(SyncTrigger::ConnectivityRegained).await;

    assert_eq!(fx.engine.state(), SyncState::Failed);
    let seqs: Vec<i64> = fx.queue.drain().unwrap().iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![2, 3]);
    assert_eq!(
        fx.remote.upsert_log(),
        vec![first.id, second.id, second.id, second.id]
    );

    // Reconcile never ran: the queued edit is still the local truth and
    // the remote-only note was not pulled in.
    assert_eq!(fx.store.count().unwrap(), 1);
    assert!(fx.store.get_by_id(second.id).unwrap().is_some());

    match fx.notices.try_recv().unwrap() {
        Notice::SyncFailed { .. } => {}
        other => panic!("expected SyncFailed, got {other:?}"),
    }
    assert_eq!(fx.status.borrow().state, SyncState::Failed);
    assert_eq!(fx.status.borrow().pending, 2);
}

#[tokio::test]
async fn test_permanent_rejection_drops_the_entry_for_good() {
    let mut fx = fixture();
    let ghost = Uuid::new_v4();
    fx.queue.enqueue(Mutation::Delete(ghost)).unwrap();
    fx.remote.fail_deletes_for(ghost, vec![rejected("not found")]);

    fx.engine.sync(SyncTrigger::Manual).await;

    // The pass still succeeds; the doomed entry is simply gone.
    assert_eq!(fx.engine.state(), SyncState::Idle);
    assert!(fx.queue.is_empty().unwrap());
    match fx.notices.try_recv().unwrap() {
        Notice::MutationRejected { note_id, kind, .. } => {
            assert_eq!(note_id, ghost);
            assert_eq!(kind, "delete");
        }
        other => panic!("expected MutationRejected, got {other:?}"),
    }

    // The next pass does not re-attempt it.
    fx.engine.sync(SyncTrigger::Periodic).await;
    assert_eq!(fx.remote.delete_log().len(), 1);
}

#[tokio::test]
async fn test_reconcile_makes_the_remote_snapshot_authoritative() {
    let mut fx = fixture();
    fx.store.put(&note("stale local")).unwrap();
    let kept = note("remote one");
    let also_kept = note("remote two");
    fx.remote.seed(kept.clone());
    fx.remote.seed(also_kept.clone());

    fx.engine.sync(SyncTrigger::Foregrounded).await;

    assert_eq!(fx.engine.state(), SyncState::Idle);
    assert_eq!(fx.store.count().unwrap(), 2);
    assert!(fx.store.get_by_id(kept.id).unwrap().is_some());
    assert!(fx.store.get_by_id(also_kept.id).unwrap().is_some());

    // The feed re-materialized from the reconciled store.
    let feed_ids: Vec<Uuid> = fx.feed.current().iter().map(|n| n.id).collect();
    assert_eq!(feed_ids.len(), 2);
    assert!(feed_ids.contains(&kept.id));
}

#[tokio::test]
async fn test_offline_create_reaches_the_remote_without_duplicates() {
    let db = Db::open_in_memory().expect("open db");
    let feed = Arc::new(NoteFeed::new(20));
    let (notice_tx, _notices) = notice_channel();
    let (status_tx, _status) = StatusHandle::new();
    let remote = MockRemote::default();

    let (mut monitor, online) = ConnectivityMonitor::manual(false);
    let mut coordinator = Coordinator::new(
        &db,
        feed.clone(),
        notice_tx.clone(),
        monitor.handle(),
        monitor.online(),
        Duration::from_secs(5),
    );
    let mut engine = SyncEngine::new(
        &db,
        remote.clone(),
        quick_config(),
        feed.clone(),
        notice_tx,
        status_tx,
    );

    // Created offline: visible immediately, remote untouched.
    let created = coordinator
        .create_note(NoteDraft::titled("Buy milk"))
        .unwrap();
    assert_eq!(feed.current()[0].title, "Buy milk");
    assert!(remote.notes().is_empty());

    // Connectivity returns and fires a trigger.
    online.send(true).unwrap();
    let trigger = monitor.recv().await.expect("connectivity trigger");
    assert_eq!(trigger, SyncTrigger::ConnectivityRegained);
    engine.sync(trigger).await;

    let remote_notes = remote.notes();
    assert_eq!(remote_notes.len(), 1);
    assert_eq!(remote_notes[0].title, "Buy milk");
    assert_eq!(remote_notes[0].id, created.id);

    let store = NoteStore::new(db.clone());
    assert_eq!(store.count().unwrap(), 1);
    assert!(store.get_by_id(created.id).unwrap().is_some());
}

#[tokio::test]
async fn test_undone_delete_never_reaches_the_remote() {
    let db = Db::open_in_memory().expect("open db");
    let feed = Arc::new(NoteFeed::new(20));
    let (notice_tx, _notices) = notice_channel();
    let (status_tx, _status) = StatusHandle::new();
    let remote = MockRemote::default();
    let (monitor, _online) = ConnectivityMonitor::manual(false);
    let mut coordinator = Coordinator::new(
        &db,
        feed.clone(),
        notice_tx.clone(),
        monitor.handle(),
        monitor.online(),
        Duration::from_secs(5),
    );
    let mut engine = SyncEngine::new(
        &db,
        remote.clone(),
        quick_config(),
        feed.clone(),
        notice_tx,
        status_tx,
    );

    let created = coordinator
        .create_note(NoteDraft::titled("Buy milk"))
        .unwrap();
    engine.sync(SyncTrigger::Manual).await;
    assert_eq!(remote.notes().len(), 1);

    coordinator.delete_note(created.id).unwrap();
    let restored = coordinator
        .undo_delete(created.id)
        .unwrap()
        .expect("within the window");
    assert_eq!(restored.id, created.id);

    engine.sync(SyncTrigger::Manual).await;

    // The restored note is back on the remote with its identity intact
    // and the superseded delete was never attempted.
    let remote_notes = remote.notes();
    assert_eq!(remote_notes.len(), 1);
    assert_eq!(remote_notes[0].id, created.id);
    assert_eq!(remote_notes[0].title, "Buy milk");
    assert_eq!(
        remote_notes[0].created_at.timestamp_millis(),
        created.created_at.timestamp_millis()
    );
    assert!(remote.delete_log().is_empty());

    let store = NoteStore::new(db.clone());
    assert!(store.get_by_id(created.id).unwrap().is_some());
}
