pub mod meta;
pub mod notes;
pub mod queue;

pub use meta::SyncMeta;
pub use notes::NoteStore;
pub use queue::{Mutation, QueueEntry, SyncQueue};
