//! Change signal
//!
//! Payload-less "reload notification state now" events. Producers call
//! [`ChangeSignal::notify`] after every journal write or durable mutation;
//! feed watchers subscribe and recompute.

use crate::config::CHANGE_SIGNAL_CAPACITY;
use crate::storage::FileJournal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Delivery mechanism behind a [`ChangeSignal`]
pub trait SignalTransport: Send + Sync {
    fn publish(&self);
    fn subscribe(&self) -> broadcast::Receiver<()>;
}

/// Broadcast channel shared by everything in this process
pub struct InProcessBus {
    tx: broadcast::Sender<()>,
}

impl InProcessBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }
}

impl SignalTransport for InProcessBus {
    fn publish(&self) {
        // No subscribers is fine.
        let _ = self.tx.send(());
    }

    fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}

/// Observer handle passed explicitly to every producer and consumer
#[derive(Clone)]
pub struct ChangeSignal {
    transport: Arc<dyn SignalTransport>,
}

impl ChangeSignal {
    pub fn new(transport: Arc<dyn SignalTransport>) -> Self {
        Self { transport }
    }

    pub fn in_process() -> Self {
        Self::new(Arc::new(InProcessBus::new(CHANGE_SIGNAL_CAPACITY)))
    }

    pub fn notify(&self) {
        self.transport.publish();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.transport.subscribe()
    }
}

impl Default for ChangeSignal {
    fn default() -> Self {
        Self::in_process()
    }
}

/// Turns writes to a shared journal file by other processes into change signals
pub struct JournalWatcher {
    journal: FileJournal,
    signal: ChangeSignal,
    poll_interval: Duration,
}

impl JournalWatcher {
    pub fn new(journal: FileJournal, signal: ChangeSignal, poll_interval: Duration) -> Self {
        Self {
            journal,
            signal,
            poll_interval,
        }
    }

    /// Poll the journal file's modification time until the task is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Watching reminder journal at {:?}", self.journal.path());

            let mut interval = tokio::time::interval(self.poll_interval);
            let mut last_seen = self.journal.modified().await;

            loop {
                interval.tick().await;

                let modified = self.journal.modified().await;
                if modified != last_seen {
                    tracing::debug!("Reminder journal changed on disk");
                    last_seen = modified;
                    self.signal.notify();
                }
            }
        })
    }
}
