pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use db::Db;
pub use error::StoreError;
pub use models::{Location, Note, NoteDraft};
pub use store::{Mutation, NoteStore, QueueEntry, SyncMeta, SyncQueue};
