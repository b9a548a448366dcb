//! Pending-sync queue and status signal
//!
//! Every committed record write appends one entry to the `syncQueue`
//! column family, keyed by a big-endian sequence number so key order is
//! timestamp order. Appends are best-effort: a failure is logged, counted
//! and dropped, and never rolls back the write that caused it.
//!
//! The [`StatusSignal`] broadcasts `{last_sync_at, pending_changes,
//! is_online}` over a `tokio::sync::watch` channel. It is created when the
//! store opens (pending count and last sync time restored from disk) and
//! changed only by appends, [`SyncQueue::clear`] and the connectivity hook
//! [`StatusSignal::set_online`].

use crate::{
    error::{Error, Result},
    metrics::Metrics,
    schema::Table,
    storage::{column_family, CF_META},
};
use chrono::{DateTime, Utc};
use rocksdb::{IteratorMode, WriteBatch, DB};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

const META_LAST_SYNC_AT: &[u8] = b"last_sync_at";

/// Kind of mutation recorded in the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    /// Record inserted
    Add,
    /// Record replaced
    Update,
    /// Record removed
    Delete,
}

/// One queued mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueEntry {
    /// Position in the queue
    pub seq: u64,
    /// Kind of mutation
    pub action: SyncAction,
    /// Table written
    pub entity_type: Table,
    /// Record as written (`{"id": ..}` for deletes)
    pub payload: serde_json::Value,
    /// When the entry was queued
    pub timestamp: DateTime<Utc>,
}

/// Current sync state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Last time the queue was cleared
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Entries waiting in the queue
    pub pending_changes: u64,
    /// Platform connectivity
    pub is_online: bool,
}

/// Observable sync state
#[derive(Debug, Clone)]
pub struct StatusSignal {
    tx: Arc<watch::Sender<SyncStatus>>,
}

impl StatusSignal {
    /// Create a signal with an initial state
    pub fn new(initial: SyncStatus) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Snapshot of the current state
    pub fn current(&self) -> SyncStatus {
        *self.tx.borrow()
    }

    /// Receiver that observes every change
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.tx.subscribe()
    }

    /// Stream yielding the current state, then each change
    pub fn stream(&self) -> WatchStream<SyncStatus> {
        WatchStream::new(self.subscribe())
    }

    /// Connectivity listener hook
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|status| {
            if status.is_online == online {
                return false;
            }
            status.is_online = online;
            true
        });

        if changed {
            tracing::info!(is_online = online, "Connectivity changed");
        }
    }

    fn record_enqueued(&self) {
        self.tx.send_modify(|status| status.pending_changes += 1);
    }

    fn record_cleared(&self, at: DateTime<Utc>) {
        self.tx.send_modify(|status| {
            status.pending_changes = 0;
            status.last_sync_at = Some(at);
        });
    }
}

/// Append-only log of mutations awaiting reconciliation
pub struct SyncQueue {
    db: Arc<DB>,
    next_seq: AtomicU64,
    signal: StatusSignal,
    metrics: Metrics,
    #[cfg(test)]
    fail_appends: std::sync::atomic::AtomicBool,
}

impl std::fmt::Debug for SyncQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncQueue")
            .field("next_seq", &self.next_seq)
            .field("status", &self.signal.current())
            .finish()
    }
}

impl SyncQueue {
    /// Restore queue position and status from disk
    pub(crate) fn open(db: Arc<DB>, is_online: bool, metrics: Metrics) -> Result<Self> {
        let cf = column_family(&db, Table::SyncQueue.name())?;

        let mut pending = 0u64;
        let mut last_seq = None;
        for item in db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item?;
            pending += 1;
            last_seq = Some(decode_seq(&key)?);
        }

        let meta = column_family(&db, CF_META)?;
        let last_sync_at = match db.get_cf(meta, META_LAST_SYNC_AT)? {
            Some(raw) => Some(decode_timestamp(&raw)?),
            None => None,
        };

        let signal = StatusSignal::new(SyncStatus {
            last_sync_at,
            pending_changes: pending,
            is_online,
        });
        metrics.set_pending_changes(pending);

        tracing::info!(pending, ?last_sync_at, "Sync queue restored");

        Ok(Self {
            next_seq: AtomicU64::new(last_seq.map_or(0, |seq| seq + 1)),
            db,
            signal,
            metrics,
            #[cfg(test)]
            fail_appends: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// Status signal fed by this queue
    pub fn signal(&self) -> &StatusSignal {
        &self.signal
    }

    /// Append one entry; failures are logged and swallowed
    pub fn enqueue(&self, action: SyncAction, entity_type: Table, payload: serde_json::Value) {
        match self.try_enqueue(action, entity_type, payload) {
            Ok(seq) => {
                self.signal.record_enqueued();
                self.metrics
                    .set_pending_changes(self.signal.current().pending_changes);
                tracing::debug!(seq, ?action, table = %entity_type, "Sync entry queued");
            }
            Err(e) => {
                self.metrics.record_enqueue_failure();
                tracing::warn!(
                    ?action,
                    table = %entity_type,
                    error = %e,
                    "Failed to queue sync entry, dropping it"
                );
            }
        }
    }

    fn try_enqueue(
        &self,
        action: SyncAction,
        entity_type: Table,
        payload: serde_json::Value,
    ) -> Result<u64> {
        self.check_injected_failure()?;

        let cf = column_family(&self.db, Table::SyncQueue.name())?;
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let entry = SyncQueueEntry {
            seq,
            action,
            entity_type,
            payload,
            timestamp: Utc::now(),
        };

        self.db
            .put_cf(cf, seq.to_be_bytes(), serde_json::to_vec(&entry)?)?;
        Ok(seq)
    }

    /// Queued entries, oldest first
    pub fn pending_entries(&self) -> Result<Vec<SyncQueueEntry>> {
        let cf = column_family(&self.db, Table::SyncQueue.name())?;

        let mut entries = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            entries.push(serde_json::from_slice(&value)?);
        }
        Ok(entries)
    }

    /// Drop every queued entry and mark the queue as synced now
    pub fn clear(&self) -> Result<SyncStatus> {
        let cf = column_family(&self.db, Table::SyncQueue.name())?;
        let meta = column_family(&self.db, CF_META)?;

        let mut batch = WriteBatch::default();
        let mut cleared = 0u64;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item?;
            batch.delete_cf(cf, key);
            cleared += 1;
        }

        let now = Utc::now();
        batch.put_cf(meta, META_LAST_SYNC_AT, now.to_rfc3339().as_bytes());
        self.db.write(batch)?;

        self.signal.record_cleared(now);
        self.metrics.set_pending_changes(0);
        tracing::info!(cleared, "Sync queue cleared");

        Ok(self.signal.current())
    }

    #[cfg(test)]
    pub(crate) fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    #[cfg(test)]
    fn check_injected_failure(&self) -> Result<()> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(Error::Storage("injected sync queue failure".to_string()));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_injected_failure(&self) -> Result<()> {
        Ok(())
    }
}

fn decode_seq(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| Error::Serialization(format!("bad sync queue key length {}", key.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

fn decode_timestamp(raw: &[u8]) -> Result<DateTime<Utc>> {
    let text = std::str::from_utf8(raw).map_err(|e| Error::Serialization(e.to_string()))?;
    DateTime::parse_from_rfc3339(text)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| Error::Serialization(format!("bad last_sync_at {:?}: {}", text, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Store;
    use crate::Config;
    use serde_json::json;
    use tempfile::TempDir;
    use tokio_stream::StreamExt;

    fn test_config() -> (Config, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (config, temp_dir)
    }

    #[test]
    fn test_enqueue_and_clear() {
        let (config, _temp) = test_config();
        let store = Store::open(&config, Metrics::new().unwrap()).unwrap();
        let queue = store.sync();

        assert_eq!(queue.signal().current().pending_changes, 0);
        assert!(queue.signal().current().last_sync_at.is_none());

        queue.enqueue(SyncAction::Add, Table::Groups, json!({"id": "g1"}));
        queue.enqueue(SyncAction::Delete, Table::Members, json!({"id": "m1"}));

        let entries = queue.pending_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].seq + 1, entries[1].seq);
        assert_eq!(entries[0].entity_type, Table::Groups);
        assert_eq!(entries[1].action, SyncAction::Delete);
        assert_eq!(queue.signal().current().pending_changes, 2);

        let status = queue.clear().unwrap();
        assert_eq!(status.pending_changes, 0);
        assert!(status.last_sync_at.is_some());
        assert!(queue.pending_entries().unwrap().is_empty());
    }

    #[test]
    fn test_state_survives_reopen() {
        let (config, _temp) = test_config();

        {
            let store = Store::open(&config, Metrics::new().unwrap()).unwrap();
            store
                .sync()
                .enqueue(SyncAction::Add, Table::Groups, json!({"id": "g1"}));
            store.sync().clear().unwrap();
            store
                .sync()
                .enqueue(SyncAction::Update, Table::Groups, json!({"id": "g1"}));
        }

        let store = Store::open(&config, Metrics::new().unwrap()).unwrap();
        let status = store.sync().signal().current();
        assert_eq!(status.pending_changes, 1);
        assert!(status.last_sync_at.is_some());

        store
            .sync()
            .enqueue(SyncAction::Delete, Table::Groups, json!({"id": "g1"}));
        let entries = store.sync().pending_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].seq < entries[1].seq);
    }

    #[test]
    fn test_failed_append_is_swallowed() {
        let (config, _temp) = test_config();
        let metrics = Metrics::new().unwrap();
        let store = Store::open(&config, metrics.clone()).unwrap();

        store.sync().fail_appends(true);
        store
            .sync()
            .enqueue(SyncAction::Add, Table::Groups, json!({"id": "g1"}));

        assert_eq!(store.sync().signal().current().pending_changes, 0);
        assert_eq!(metrics.enqueue_failures.get(), 1);
        assert!(store.sync().pending_entries().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_signal_broadcasts_changes() {
        let signal = StatusSignal::new(SyncStatus {
            last_sync_at: None,
            pending_changes: 0,
            is_online: false,
        });

        let mut rx = signal.subscribe();
        signal.set_online(true);
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_online);

        // No-op transitions are not broadcast
        signal.set_online(true);
        assert!(!rx.has_changed().unwrap());

        let mut stream = signal.stream();
        let first = stream.next().await.unwrap();
        assert!(first.is_online);

        signal.record_enqueued();
        let second = stream.next().await.unwrap();
        assert_eq!(second.pending_changes, 1);
    }
}
