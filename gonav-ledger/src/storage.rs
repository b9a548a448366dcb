//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - one per [`Table`] - Records (key: id, value: bincode)
//! - `indices` - Secondary indices (key: table \0 index \0 value \0 id)
//! - `unique` - Unique-index claims (key: table \0 index \0 value, value: id)
//! - `meta` - Sync metadata
//!
//! Single-record calls ([`Store::insert`], [`Store::put`], [`Store::delete`])
//! are one-write transactions. Compound ledger operations stage several
//! writes on a [`Transaction`] and commit them as one `WriteBatch`, so either
//! every write lands or none does.

use crate::{
    error::{Error, Result},
    metrics::Metrics,
    schema::{self, Record, Table},
    sync::{SyncAction, SyncQueue},
    Config,
};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
pub(crate) const CF_INDICES: &str = "indices";
pub(crate) const CF_UNIQUE: &str = "unique";
pub(crate) const CF_META: &str = "meta";

const SEP: u8 = 0;

/// Generate a collision-resistant, time-ordered record id
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

pub(crate) fn column_family<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily> {
    db.cf_handle(name)
        .ok_or_else(|| Error::SchemaError(format!("column family {} not found", name)))
}

/// Storage wrapper for RocksDB
pub struct Store {
    db: Arc<DB>,
    sync: SyncQueue,
    metrics: Metrics,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("sync", &self.sync).finish()
    }
}

impl Store {
    /// Open or create database
    pub fn open(config: &Config, metrics: Metrics) -> Result<Self> {
        schema::validate()?;

        let path = &config.data_dir;
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let mut cf_descriptors: Vec<ColumnFamilyDescriptor> = Table::ALL
            .iter()
            .map(|table| ColumnFamilyDescriptor::new(table.name(), Self::cf_options_table()))
            .collect();
        cf_descriptors.push(ColumnFamilyDescriptor::new(
            CF_INDICES,
            Self::cf_options_indices(),
        ));
        cf_descriptors.push(ColumnFamilyDescriptor::new(
            CF_UNIQUE,
            Self::cf_options_indices(),
        ));
        cf_descriptors.push(ColumnFamilyDescriptor::new(CF_META, Options::default()));

        let db = Arc::new(DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?);
        let sync = SyncQueue::open(db.clone(), config.sync.assume_online, metrics.clone())?;

        tracing::info!(
            "Opened RocksDB at {:?} with {} tables",
            path,
            Table::ALL.len()
        );

        Ok(Self { db, sync, metrics })
    }

    fn cf_options_table() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Index lookups are point-prefix scans
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        column_family(&self.db, name)
    }

    /// Sync queue fed by every commit
    pub fn sync(&self) -> &SyncQueue {
        &self.sync
    }

    // Reads

    /// Get record by id
    pub fn get<R: Record>(&self, id: &str) -> Result<Option<R>> {
        let cf = self.cf(R::TABLE.name())?;
        match self.db.get_cf(cf, id.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Get record by id, failing with `NotFound` when absent
    pub fn require<R: Record>(&self, id: &str) -> Result<R> {
        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("{} {}", R::TABLE.name(), id)))
    }

    /// All records of a table, in id order
    pub fn list_all<R: Record>(&self) -> Result<Vec<R>> {
        let cf = self.cf(R::TABLE.name())?;

        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            records.push(bincode::deserialize(&value)?);
        }
        Ok(records)
    }

    /// Whether a table holds no records
    pub fn is_empty<R: Record>(&self) -> Result<bool> {
        let cf = self.cf(R::TABLE.name())?;
        let first = self.db.iterator_cf(cf, IteratorMode::Start).next().transpose()?;
        Ok(first.is_none())
    }

    /// Records whose declared index `index` equals `value`
    pub fn list_by_key<R: Record>(&self, index: &str, value: &str) -> Result<Vec<R>> {
        R::TABLE.index(index)?;

        let cf_indices = self.cf(CF_INDICES)?;
        let prefix = index_prefix(R::TABLE, index, value);

        let mut records = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf_indices, IteratorMode::From(prefix.as_slice(), Direction::Forward));
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }

            let id = std::str::from_utf8(&key[prefix.len()..])
                .map_err(|e| Error::Storage(format!("corrupt index key: {}", e)))?;
            let record = self.get::<R>(id)?.ok_or_else(|| {
                Error::Storage(format!(
                    "index {}.{} points at missing record {}",
                    R::TABLE.name(),
                    index,
                    id
                ))
            })?;
            records.push(record);
        }
        Ok(records)
    }

    // Writes

    /// Start a multi-record transaction
    pub fn transaction(&self) -> Transaction<'_> {
        Transaction {
            store: self,
            batch: WriteBatch::default(),
            writes: Vec::new(),
            touched: HashSet::new(),
            claims: HashMap::new(),
            released: HashSet::new(),
        }
    }

    /// Insert a new record (id generated when empty)
    pub fn insert<R: Record>(&self, record: R) -> Result<R> {
        let mut txn = self.transaction();
        let record = txn.insert(record)?;
        txn.commit()?;
        Ok(record)
    }

    /// Insert or replace a record by id
    pub fn put<R: Record>(&self, record: R) -> Result<R> {
        let mut txn = self.transaction();
        let record = txn.put(record)?;
        txn.commit()?;
        Ok(record)
    }

    /// Delete a record by id
    pub fn delete<R: Record>(&self, id: &str) -> Result<()> {
        let mut txn = self.transaction();
        txn.delete::<R>(id)?;
        txn.commit()?;
        Ok(())
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("writes", &self.writes.len())
            .finish()
    }
}

struct PendingWrite {
    action: SyncAction,
    table: Table,
    payload: serde_json::Value,
}

/// Writes staged for one atomic commit
///
/// Each record may be written at most once per transaction. Dropping a
/// transaction without committing discards every staged write.
pub struct Transaction<'a> {
    store: &'a Store,
    batch: WriteBatch,
    writes: Vec<PendingWrite>,
    touched: HashSet<(Table, String)>,
    claims: HashMap<Vec<u8>, String>,
    released: HashSet<Vec<u8>>,
}

impl<'a> Transaction<'a> {
    /// Stage an insert; fails with `DuplicateKey` if the id exists
    pub fn insert<R: Record>(&mut self, mut record: R) -> Result<R> {
        if record.id().is_empty() {
            record.set_id(new_id());
        }
        let id = record.id().to_string();
        self.touch(R::TABLE, &id)?;

        let cf = self.store.cf(R::TABLE.name())?;
        if self.store.db.get_cf(cf, id.as_bytes())?.is_some() {
            return Err(Error::DuplicateKey(format!("{} {}", R::TABLE.name(), id)));
        }

        let indexes = checked_index_values(&record)?;
        self.claim_unique(R::TABLE, &id, &indexes)?;
        self.stage_record(&record, &indexes)?;

        self.writes.push(PendingWrite {
            action: SyncAction::Add,
            table: R::TABLE,
            payload: serde_json::to_value(&record)?,
        });
        Ok(record)
    }

    /// Stage an upsert; the record must carry an id
    pub fn put<R: Record>(&mut self, record: R) -> Result<R> {
        if record.id().is_empty() {
            return Err(Error::InvalidState(format!(
                "put into {} requires an id",
                R::TABLE.name()
            )));
        }
        let id = record.id().to_string();
        self.touch(R::TABLE, &id)?;

        let indexes = checked_index_values(&record)?;
        if let Some(previous) = self.store.get::<R>(&id)? {
            let stale = checked_index_values(&previous)?;
            self.unstage_indexes(R::TABLE, &id, &stale)?;
        }
        self.claim_unique(R::TABLE, &id, &indexes)?;
        self.stage_record(&record, &indexes)?;

        self.writes.push(PendingWrite {
            action: SyncAction::Update,
            table: R::TABLE,
            payload: serde_json::to_value(&record)?,
        });
        Ok(record)
    }

    /// Stage a delete; fails with `NotFound` if the id is absent
    pub fn delete<R: Record>(&mut self, id: &str) -> Result<()> {
        self.touch(R::TABLE, id)?;

        let previous = self.store.require::<R>(id)?;
        let stale = checked_index_values(&previous)?;
        self.unstage_indexes(R::TABLE, id, &stale)?;

        let cf = self.store.cf(R::TABLE.name())?;
        self.batch.delete_cf(cf, id.as_bytes());

        self.writes.push(PendingWrite {
            action: SyncAction::Delete,
            table: R::TABLE,
            payload: serde_json::json!({ "id": id }),
        });
        Ok(())
    }

    /// Number of staged writes
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Whether nothing is staged
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Write everything atomically, then queue one sync entry per write
    pub fn commit(self) -> Result<usize> {
        let Transaction {
            store,
            batch,
            writes,
            ..
        } = self;

        if writes.is_empty() {
            return Ok(0);
        }

        // Atomic commit
        store.db.write(batch)?;

        let count = writes.len();
        store.metrics.record_writes(count);
        tracing::debug!(writes = count, "Transaction committed");

        for write in writes {
            store.sync.enqueue(write.action, write.table, write.payload);
        }

        Ok(count)
    }

    fn touch(&mut self, table: Table, id: &str) -> Result<()> {
        if !self.touched.insert((table, id.to_string())) {
            return Err(Error::InvalidState(format!(
                "{} {} written twice in one transaction",
                table.name(),
                id
            )));
        }
        Ok(())
    }

    fn stage_record<R: Record>(&mut self, record: &R, indexes: &[IndexValue]) -> Result<()> {
        let cf = self.store.cf(R::TABLE.name())?;
        let cf_indices = self.store.cf(CF_INDICES)?;

        self.batch
            .put_cf(cf, record.id().as_bytes(), bincode::serialize(record)?);
        for entry in indexes {
            let key = index_key(R::TABLE, entry.name, &entry.value, record.id());
            self.batch.put_cf(cf_indices, key, b"");
        }
        Ok(())
    }

    fn unstage_indexes(&mut self, table: Table, id: &str, indexes: &[IndexValue]) -> Result<()> {
        let cf_indices = self.store.cf(CF_INDICES)?;
        let cf_unique = self.store.cf(CF_UNIQUE)?;

        for entry in indexes {
            self.batch
                .delete_cf(cf_indices, index_key(table, entry.name, &entry.value, id));

            if entry.unique {
                let key = unique_key(table, entry.name, &entry.value);
                self.batch.delete_cf(cf_unique, &key);
                self.claims.remove(&key);
                self.released.insert(key);
            }
        }
        Ok(())
    }

    fn claim_unique(&mut self, table: Table, id: &str, indexes: &[IndexValue]) -> Result<()> {
        let cf_unique = self.store.cf(CF_UNIQUE)?;

        for entry in indexes.iter().filter(|entry| entry.unique) {
            let key = unique_key(table, entry.name, &entry.value);

            let owner = match self.claims.get(&key) {
                Some(owner) => Some(owner.clone()),
                None if self.released.contains(&key) => None,
                None => self
                    .store
                    .db
                    .get_cf(cf_unique, &key)?
                    .map(|raw| String::from_utf8_lossy(&raw).into_owned()),
            };

            if let Some(owner) = owner {
                if owner != id {
                    return Err(Error::ConstraintViolation(format!(
                        "{}.{} = {} already used by {}",
                        table.name(),
                        entry.name,
                        entry.value,
                        owner
                    )));
                }
            }

            self.batch.put_cf(cf_unique, &key, id.as_bytes());
            self.claims.insert(key, id.to_string());
        }
        Ok(())
    }
}

struct IndexValue {
    name: &'static str,
    value: String,
    unique: bool,
}

fn checked_index_values<R: Record>(record: &R) -> Result<Vec<IndexValue>> {
    record
        .index_values()
        .into_iter()
        .map(|(name, value)| {
            let spec = R::TABLE.index(name)?;
            if value.as_bytes().contains(&SEP) {
                return Err(Error::ConstraintViolation(format!(
                    "{}.{} value contains a NUL byte",
                    R::TABLE.name(),
                    name
                )));
            }
            Ok(IndexValue {
                name,
                value,
                unique: spec.unique,
            })
        })
        .collect()
}

// Index key helpers

fn index_prefix(table: Table, index: &str, value: &str) -> Vec<u8> {
    let mut key = unique_key(table, index, value);
    key.push(SEP);
    key
}

fn index_key(table: Table, index: &str, value: &str, id: &str) -> Vec<u8> {
    let mut key = index_prefix(table, index, value);
    key.extend_from_slice(id.as_bytes());
    key
}

fn unique_key(table: Table, index: &str, value: &str) -> Vec<u8> {
    let mut key = table.name().as_bytes().to_vec();
    key.push(SEP);
    key.extend_from_slice(index.as_bytes());
    key.push(SEP);
    key.extend_from_slice(value.as_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Group, GroupType, MeetingFrequency, User, UserRole};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn test_store() -> (Store, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        let store = Store::open(&config, Metrics::new().unwrap()).unwrap();
        (store, temp_dir)
    }

    fn test_user(phone: &str) -> User {
        User {
            id: String::new(),
            name: "Marie Jean".to_string(),
            phone: phone.to_string(),
            pin_hash: "00".to_string(),
            role: UserRole::Leader,
            group_ids: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn test_group(section: &str) -> Group {
        Group {
            id: String::new(),
            name: "Mutuelle Fanm Vanyan".to_string(),
            group_type: GroupType::Mutuelle,
            description: String::new(),
            section: section.to_string(),
            leader_id: String::new(),
            member_count: 0,
            total_savings: Decimal::ZERO,
            active_loans: 0,
            meeting_day: "Samdi".to_string(),
            meeting_frequency: MeetingFrequency::Weekly,
            whatsapp_link: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_storage_open() {
        let (store, _temp) = test_store();
        for table in Table::ALL {
            assert!(store.db.cf_handle(table.name()).is_some());
        }
        assert!(store.db.cf_handle(CF_INDICES).is_some());
    }

    #[test]
    fn test_insert_and_get() {
        let (store, _temp) = test_store();

        let group = store.insert(test_group("Gran Sous")).unwrap();
        assert!(!group.id.is_empty());

        let retrieved: Group = store.get(&group.id).unwrap().unwrap();
        assert_eq!(retrieved, group);
        assert!(store.get::<Group>("missing").unwrap().is_none());
        assert!(matches!(
            store.require::<Group>("missing"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let (store, _temp) = test_store();

        let group = store.insert(test_group("Palma")).unwrap();
        let err = store.insert(group.clone()).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(_)));
    }

    #[test]
    fn test_unique_phone() {
        let (store, _temp) = test_store();

        let first = store.insert(test_user("50937000001")).unwrap();
        let err = store.insert(test_user("50937000001")).unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)));

        // Re-saving the owner with the same phone is fine
        store.put(first.clone()).unwrap();

        // Moving the owner to a new phone frees the old one
        let mut moved = first;
        moved.phone = "50937000002".to_string();
        store.put(moved).unwrap();
        store.insert(test_user("50937000001")).unwrap();

        let err = store.insert(test_user("50937000002")).unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)));
    }

    #[test]
    fn test_list_by_key_follows_updates() {
        let (store, _temp) = test_store();

        let mut group = store.insert(test_group("Palma")).unwrap();
        store.insert(test_group("Palma")).unwrap();
        store.insert(test_group("Mapou")).unwrap();

        assert_eq!(store.list_by_key::<Group>("section", "Palma").unwrap().len(), 2);

        group.section = "Mapou".to_string();
        store.put(group).unwrap();

        assert_eq!(store.list_by_key::<Group>("section", "Palma").unwrap().len(), 1);
        assert_eq!(store.list_by_key::<Group>("section", "Mapou").unwrap().len(), 2);
        assert_eq!(store.list_by_key::<Group>("type", "mutuelle").unwrap().len(), 3);
        assert_eq!(store.list_all::<Group>().unwrap().len(), 3);
    }

    #[test]
    fn test_undeclared_index_is_schema_error() {
        let (store, _temp) = test_store();
        let err = store.list_by_key::<Group>("leaderId", "u1").unwrap_err();
        assert!(matches!(err, Error::SchemaError(_)));
    }

    #[test]
    fn test_delete_removes_index_entries() {
        let (store, _temp) = test_store();

        let user = store.insert(test_user("50937000003")).unwrap();
        store.delete::<User>(&user.id).unwrap();

        assert!(store.get::<User>(&user.id).unwrap().is_none());
        assert!(store.list_by_key::<User>("phone", "50937000003").unwrap().is_empty());
        store.insert(test_user("50937000003")).unwrap();

        assert!(matches!(
            store.delete::<User>("missing"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_failed_transaction_writes_nothing() {
        let (store, _temp) = test_store();
        store.insert(test_user("50937000004")).unwrap();
        let pending_before = store.sync().signal().current().pending_changes;

        let mut txn = store.transaction();
        txn.insert(test_group("Palma")).unwrap();
        let err = txn.insert(test_user("50937000004")).unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)));
        drop(txn);

        assert!(store.is_empty::<Group>().unwrap());
        assert_eq!(
            store.sync().signal().current().pending_changes,
            pending_before
        );
    }

    #[test]
    fn test_transaction_commits_atomically() {
        let (store, _temp) = test_store();

        let mut txn = store.transaction();
        let group = txn.insert(test_group("Palma")).unwrap();
        let user = txn.insert(test_user("50937000005")).unwrap();
        assert_eq!(txn.len(), 2);
        assert_eq!(txn.commit().unwrap(), 2);

        assert!(store.get::<Group>(&group.id).unwrap().is_some());
        assert!(store.get::<User>(&user.id).unwrap().is_some());

        let entries = store.sync().pending_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, SyncAction::Add);
        assert_eq!(entries[1].entity_type, Table::Users);
    }

    #[test]
    fn test_record_written_twice_rejected() {
        let (store, _temp) = test_store();
        let group = store.insert(test_group("Palma")).unwrap();

        let mut txn = store.transaction();
        txn.put(group.clone()).unwrap();
        let err = txn.put(group).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn test_put_requires_id() {
        let (store, _temp) = test_store();
        let err = store.put(test_group("Palma")).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn test_sync_entry_per_write() {
        let (store, _temp) = test_store();

        let group = store.insert(test_group("Palma")).unwrap();
        store.put(group.clone()).unwrap();
        store.delete::<Group>(&group.id).unwrap();

        let entries = store.sync().pending_entries().unwrap();
        let actions: Vec<_> = entries.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![SyncAction::Add, SyncAction::Update, SyncAction::Delete]
        );
        assert_eq!(entries[2].payload, serde_json::json!({ "id": group.id }));
        assert_eq!(entries[0].payload["section"], "Palma");
        assert_eq!(store.sync().signal().current().pending_changes, 3);
    }
}
