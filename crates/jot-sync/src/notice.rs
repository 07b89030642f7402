use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

/// Non-blocking digest notices surfaced to the UI layer. The UI never
/// sees a raw error object, only these.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// A sync pass gave up for now; queued mutations are preserved and
    /// retried on the next trigger
    SyncFailed { reason: String },

    /// The remote permanently rejected a queued mutation; its entry was
    /// dropped and will not be re-attempted
    MutationRejected {
        note_id: Uuid,
        kind: &'static str,
        reason: String,
    },

    /// A local storage operation failed
    StorageFailure { reason: String },
}

#[derive(Clone)]
pub struct NoticeSender {
    tx: UnboundedSender<Notice>,
}

impl NoticeSender {
    pub fn send(&self, notice: Notice) {
        tracing::warn!(?notice, "surfacing notice");
        // A closed receiver just means no UI is listening.
        let _ = self.tx.send(notice);
    }
}

pub fn notice_channel() -> (NoticeSender, UnboundedReceiver<Notice>) {
    let (tx, rx) = unbounded_channel();
    (NoticeSender { tx }, rx)
}
