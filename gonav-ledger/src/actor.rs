//! Actor-based concurrency for the ledger
//!
//! Every ledger operation is a job that runs to completion on a single
//! writer task, so the read-modify-write steps of two compound operations
//! never interleave.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends jobs to actor mailbox                   │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │    job(&Store) -> Transaction::commit()               │
//! │          (atomic write to RocksDB)                    │
//! └───────────────────────────────────────────────────────┘
//! ```

use crate::{Error, Result, Store};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

type Job = Box<dyn FnOnce(&Store) + Send + 'static>;

/// Message sent to the ledger actor
pub enum LedgerMessage {
    /// Run a job against the store
    Execute(Job),

    /// Shutdown actor
    Shutdown,
}

impl std::fmt::Debug for LedgerMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerMessage::Execute(_) => f.write_str("Execute(..)"),
            LedgerMessage::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Actor that owns all writes to the store
#[derive(Debug)]
pub struct LedgerActor {
    store: Arc<Store>,
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(store: Arc<Store>, mailbox: mpsc::Receiver<LedgerMessage>) -> Self {
        Self { store, mailbox }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let mut processed: u64 = 0;

        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Execute(job) => {
                    job(self.store.as_ref());
                    processed += 1;
                }
                LedgerMessage::Shutdown => break,
            }
        }

        tracing::info!(jobs = processed, "Ledger actor stopped");
    }
}

/// Handle for sending jobs to the actor
#[derive(Clone, Debug)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    /// Run `f` on the writer task and wait for its result
    pub async fn execute<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Store) -> Result<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move |store: &Store| {
            let _ = tx.send(f(store));
        });

        self.sender
            .send(LedgerMessage::Execute(job))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(store: Arc<Store>, mailbox_capacity: usize) -> LedgerHandle {
    // Bounded channel for backpressure
    let (tx, rx) = mpsc::channel(mailbox_capacity.max(1));
    let actor = LedgerActor::new(store, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}
