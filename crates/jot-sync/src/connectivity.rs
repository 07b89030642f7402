use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;

/// The events that nudge the sync engine into a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    ConnectivityRegained,
    Foregrounded,
    Periodic,
    Manual,
}

/// Cloneable handle the platform shell and UI use to report lifecycle
/// transitions and request explicit syncs
#[derive(Clone)]
pub struct LifecycleHandle {
    tx: UnboundedSender<SyncTrigger>,
}

impl LifecycleHandle {
    /// The app came to the foreground
    pub fn foregrounded(&self) {
        let _ = self.tx.send(SyncTrigger::Foregrounded);
    }

    /// Explicit user-requested sync
    pub fn request_sync(&self) {
        let _ = self.tx.send(SyncTrigger::Manual);
    }
}

/// Observes connectivity and app lifecycle and produces sync triggers.
///
/// Online state comes either from a spawned probe task polling the server
/// health endpoint ([`ConnectivityMonitor::spawn`]) or from the platform
/// pushing transitions through the watch sender ([`ConnectivityMonitor::manual`]).
/// An offline-to-online transition fires `SyncTrigger::ConnectivityRegained`.
pub struct ConnectivityMonitor {
    rx: UnboundedReceiver<SyncTrigger>,
    online: watch::Receiver<bool>,
    handle: LifecycleHandle,
}

impl ConnectivityMonitor {
    /// Spawn a probe task against the configured server. Starts offline;
    /// the first successful probe flips online and fires a trigger.
    pub fn spawn(server_url: String, probe_interval: Duration, probe_timeout: Duration) -> Self {
        let (tx, rx) = unbounded_channel();
        let (online_tx, online) = watch::channel(false);
        let handle = LifecycleHandle { tx: tx.clone() };
        tokio::spawn(run_probe(
            server_url,
            probe_interval,
            probe_timeout,
            tx,
            online_tx,
        ));
        Self { rx, online, handle }
    }

    /// Monitor driven by the caller instead of a probe task: the returned
    /// watch sender reports online transitions (platform network-status
    /// callbacks, tests)
    pub fn manual(initially_online: bool) -> (Self, watch::Sender<bool>) {
        let (tx, rx) = unbounded_channel();
        let (online_tx, online) = watch::channel(initially_online);
        let handle = LifecycleHandle { tx: tx.clone() };
        tokio::spawn(forward_transitions(initially_online, online.clone(), tx));
        (Self { rx, online, handle }, online_tx)
    }

    pub fn handle(&self) -> LifecycleHandle {
        self.handle.clone()
    }

    /// Subscription to the current online boolean
    pub fn online(&self) -> watch::Receiver<bool> {
        self.online.clone()
    }

    /// Next trigger; `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<SyncTrigger> {
        self.rx.recv().await
    }
}

async fn run_probe(
    server_url: String,
    interval: Duration,
    timeout: Duration,
    tx: UnboundedSender<SyncTrigger>,
    online_tx: watch::Sender<bool>,
) {
    let client = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(%e, "could not build probe client; connectivity monitoring disabled");
            return;
        }
    };
    let url = format!("{}/api/health", server_url.trim_end_matches('/'));
    let mut was_online = false;

    loop {
        let online = match client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        };
        if online != was_online {
            tracing::info!(online, "connectivity changed");
            let _ = online_tx.send(online);
            if online && tx.send(SyncTrigger::ConnectivityRegained).is_err() {
                // Engine is gone; no point probing further.
                return;
            }
            was_online = online;
        }
        tokio::time::sleep(interval).await;
    }
}

/// Translate offline-to-online flips on the watch channel into triggers.
/// The baseline is the state at spawn time; reading the channel at first
/// poll instead would miss a flip that lands before the task runs.
async fn forward_transitions(
    initially_online: bool,
    mut online: watch::Receiver<bool>,
    tx: UnboundedSender<SyncTrigger>,
) {
    let mut was_online = initially_online;
    while online.changed().await.is_ok() {
        let now_online = *online.borrow();
        if now_online && !was_online && tx.send(SyncTrigger::ConnectivityRegained).is_err() {
            return;
        }
        was_online = now_online;
    }
}
