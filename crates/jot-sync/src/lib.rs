pub mod connectivity;
pub mod coordinator;
pub mod engine;
pub mod feed;
pub mod notice;
pub mod remote;
pub mod status;

// Re-export commonly used types
pub use connectivity::{ConnectivityMonitor, LifecycleHandle, SyncTrigger};
pub use coordinator::Coordinator;
pub use engine::{EngineConfig, SyncEngine};
pub use feed::NoteFeed;
pub use notice::{notice_channel, Notice, NoticeSender};
pub use remote::{HttpRemote, RemoteError, RemoteStore};
pub use status::{StatusHandle, SyncState, SyncStatusInfo};
