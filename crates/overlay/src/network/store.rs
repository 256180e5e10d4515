//! Routing record store persisted with redb.
//!
//! Records live in a [`MemoryStore`] for lookups; every put the memory store
//! accepts and every removal is written through to disk so the node
//! republishes the same values after a restart. Expiry deadlines are kept as
//! wall-clock seconds and records already past theirs are dropped on open.
//! Provider records are soft state and stay in memory.

use std::{
    borrow::Cow,
    path::Path,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use libp2p::{
    kad::{
        store::{self, MemoryStore, RecordStore},
        ProviderRecord, Record, RecordKey,
    },
    PeerId,
};
use redb::{Database, ReadableTable, TableDefinition};
use tracing::{debug, warn};

use crate::error::StoreError;

/// Key: raw record key bytes. Value: record value.
const RECORDS_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("records");

/// Key: raw record key bytes. Value: expiry as seconds since the unix epoch.
const EXPIRY_TABLE: TableDefinition<&[u8], u64> = TableDefinition::new("record_expiry");

/// Key: raw record key bytes. Value: publisher peer id bytes.
const PUBLISHER_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("record_publisher");

/// File name of the database inside the node data directory.
pub const STORE_FILE: &str = "records.redb";

pub struct PersistentStore {
    memory: MemoryStore,
    db: Database,
}

fn instant_to_unix(deadline: Instant) -> u64 {
    let remaining = deadline.saturating_duration_since(Instant::now());
    (SystemTime::now() + remaining)
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// `None` once the deadline has passed.
fn unix_to_instant(secs: u64) -> Option<Instant> {
    let deadline = UNIX_EPOCH + Duration::from_secs(secs);
    match deadline.duration_since(SystemTime::now()) {
        Ok(left) if !left.is_zero() => Some(Instant::now() + left),
        _ => None,
    }
}

impl PersistentStore {
    /// Open or create the store at `path` and load the persisted records.
    pub fn open<P: AsRef<Path>>(path: P, local_peer_id: PeerId) -> Result<Self, StoreError> {
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(RECORDS_TABLE)?;
            let _ = write_txn.open_table(EXPIRY_TABLE)?;
            let _ = write_txn.open_table(PUBLISHER_TABLE)?;
        }
        write_txn.commit()?;

        let mut memory = MemoryStore::new(local_peer_id);
        let mut loaded = 0usize;
        let mut stale = Vec::new();
        {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(RECORDS_TABLE)?;
            let expiry = read_txn.open_table(EXPIRY_TABLE)?;
            let publishers = read_txn.open_table(PUBLISHER_TABLE)?;
            for entry in table.iter()? {
                let (key, value) = entry?;
                let raw_key = key.value();

                let expires = match expiry.get(raw_key)? {
                    Some(secs) => match unix_to_instant(secs.value()) {
                        Some(deadline) => Some(deadline),
                        None => {
                            stale.push(RecordKey::new(&raw_key));
                            continue;
                        }
                    },
                    None => None,
                };
                let publisher = match publishers.get(raw_key)? {
                    Some(bytes) => PeerId::from_bytes(bytes.value()).ok(),
                    None => None,
                };

                let record = Record {
                    key: RecordKey::new(&raw_key),
                    value: value.value().to_vec(),
                    publisher,
                    expires,
                };
                match memory.put(record) {
                    Ok(()) => loaded += 1,
                    Err(e) => {
                        warn!("Dropping persisted record: {}", e);
                        stale.push(RecordKey::new(&raw_key));
                    }
                }
            }
        }

        let store = Self { memory, db };
        for key in &stale {
            store.forget(key)?;
        }

        debug!(records = loaded, dropped = stale.len(), "Opened routing record store");
        Ok(store)
    }

    fn persist(&self, record: &Record) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let key: &[u8] = record.key.as_ref();

            let mut table = write_txn.open_table(RECORDS_TABLE)?;
            table.insert(key, record.value.as_slice())?;

            let mut expiry = write_txn.open_table(EXPIRY_TABLE)?;
            match record.expires {
                Some(deadline) => {
                    expiry.insert(key, instant_to_unix(deadline))?;
                }
                None => {
                    expiry.remove(key)?;
                }
            }

            let mut publishers = write_txn.open_table(PUBLISHER_TABLE)?;
            match record.publisher {
                Some(peer) => {
                    publishers.insert(key, peer.to_bytes().as_slice())?;
                }
                None => {
                    publishers.remove(key)?;
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn forget(&self, key: &RecordKey) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let key: &[u8] = key.as_ref();
            let mut table = write_txn.open_table(RECORDS_TABLE)?;
            table.remove(key)?;
            let mut expiry = write_txn.open_table(EXPIRY_TABLE)?;
            expiry.remove(key)?;
            let mut publishers = write_txn.open_table(PUBLISHER_TABLE)?;
            publishers.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

impl RecordStore for PersistentStore {
    type RecordsIter<'a> = <MemoryStore as RecordStore>::RecordsIter<'a>;
    type ProvidedIter<'a> = <MemoryStore as RecordStore>::ProvidedIter<'a>;

    fn get(&self, k: &RecordKey) -> Option<Cow<'_, Record>> {
        self.memory.get(k)
    }

    fn put(&mut self, r: Record) -> store::Result<()> {
        self.memory.put(r.clone())?;
        if let Err(e) = self.persist(&r) {
            // The in-memory copy still serves lookups until restart.
            warn!("Failed to persist record: {}", e);
        }
        Ok(())
    }

    fn remove(&mut self, k: &RecordKey) {
        if let Err(e) = self.forget(k) {
            warn!("Failed to remove persisted record: {}", e);
        }
        self.memory.remove(k)
    }

    fn records(&self) -> Self::RecordsIter<'_> {
        self.memory.records()
    }

    fn add_provider(&mut self, record: ProviderRecord) -> store::Result<()> {
        self.memory.add_provider(record)
    }

    fn providers(&self, key: &RecordKey) -> Vec<ProviderRecord> {
        self.memory.providers(key)
    }

    fn provided(&self) -> Self::ProvidedIter<'_> {
        self.memory.provided()
    }

    fn remove_provider(&mut self, k: &RecordKey, p: &PeerId) {
        self.memory.remove_provider(k, p)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn record(key: &str, value: &[u8]) -> Record {
        Record::new(RecordKey::new(&key), value.to_vec())
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(STORE_FILE);
        let peer_id = PeerId::random();

        {
            let mut store = PersistentStore::open(&path, peer_id).unwrap();
            store.put(record("sha256/a", b"one")).unwrap();
            store.put(record("sha256/b", b"two")).unwrap();
            store.remove(&RecordKey::new(&"sha256/b"));
        }

        let store = PersistentStore::open(&path, peer_id).unwrap();
        let found = store.get(&RecordKey::new(&"sha256/a")).unwrap();
        assert_eq!(found.value, b"one");
        assert!(store.get(&RecordKey::new(&"sha256/b")).is_none());
        assert_eq!(store.records().count(), 1);
    }

    #[test]
    fn overwrite_keeps_latest_value() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(STORE_FILE);
        let peer_id = PeerId::random();

        {
            let mut store = PersistentStore::open(&path, peer_id).unwrap();
            store.put(record("pk/x", b"old")).unwrap();
            store.put(record("pk/x", b"new")).unwrap();
        }

        let store = PersistentStore::open(&path, peer_id).unwrap();
        assert_eq!(store.get(&RecordKey::new(&"pk/x")).unwrap().value, b"new");
    }

    #[test]
    fn providers_are_not_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(STORE_FILE);
        let peer_id = PeerId::random();
        let key = RecordKey::new(&"topic");

        {
            let mut store = PersistentStore::open(&path, peer_id).unwrap();
            store
                .add_provider(ProviderRecord::new(key.clone(), PeerId::random(), Vec::new()))
                .unwrap();
            assert_eq!(store.providers(&key).len(), 1);
        }

        let store = PersistentStore::open(&path, peer_id).unwrap();
        assert!(store.providers(&key).is_empty());
    }

    #[test]
    fn rejected_record_is_not_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(STORE_FILE);
        let peer_id = PeerId::random();
        let key = RecordKey::new(&"sha256/big");

        {
            let mut store = PersistentStore::open(&path, peer_id).unwrap();
            let oversized = Record::new(key.clone(), vec![0u8; 70 * 1024]);
            assert!(matches!(store.put(oversized), Err(store::Error::ValueTooLarge)));
        }

        let store = PersistentStore::open(&path, peer_id).unwrap();
        assert!(store.get(&key).is_none());
        assert_eq!(store.records().count(), 0);
    }

    #[test]
    fn expiry_and_publisher_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(STORE_FILE);
        let peer_id = PeerId::random();
        let publisher = PeerId::random();

        {
            let mut store = PersistentStore::open(&path, peer_id).unwrap();
            let mut live = record("sha256/live", b"live");
            live.publisher = Some(publisher);
            live.expires = Some(Instant::now() + Duration::from_secs(3600));
            store.put(live).unwrap();

            let mut expired = record("sha256/expired", b"gone");
            expired.expires = Some(Instant::now());
            store.put(expired).unwrap();
        }

        let store = PersistentStore::open(&path, peer_id).unwrap();
        let live = store.get(&RecordKey::new(&"sha256/live")).unwrap();
        assert_eq!(live.publisher, Some(publisher));
        let expires = live.expires.unwrap();
        assert!(expires > Instant::now() + Duration::from_secs(3000));
        assert!(store.get(&RecordKey::new(&"sha256/expired")).is_none());
    }
}
