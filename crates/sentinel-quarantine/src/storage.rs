//! Sled-backed persistence for quarantine records, following the same
//! named-tree idiom as the policy graph's storage layer.

use std::path::Path;

use crate::error::Result;
use crate::models::QuarantineRecord;

const RECORDS_TREE: &str = "quarantine_records";
const BY_HASH_TREE: &str = "quarantine_by_hash";
const COUNTERS_TREE: &str = "counters";
const NEXT_ID_KEY: &[u8] = b"next_record_id";

pub struct Storage {
    #[allow(dead_code)]
    db: sled::Db,
    records: sled::Tree,
    by_hash: sled::Tree,
    counters: sled::Tree,
}

impl Storage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        let records = db.open_tree(RECORDS_TREE)?;
        let by_hash = db.open_tree(BY_HASH_TREE)?;
        let counters = db.open_tree(COUNTERS_TREE)?;
        Ok(Self {
            db,
            records,
            by_hash,
            counters,
        })
    }

    /// Returns the existing record id for `hash`, if a live record
    /// already holds it — used to enforce quarantine uniqueness.
    pub fn find_by_hash(&self, hash: &str) -> Result<Option<i64>> {
        Ok(self
            .by_hash
            .get(hash.as_bytes())?
            .map(|bytes| i64::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0; 8]))))
    }

    pub fn insert(&self, mut record: QuarantineRecord) -> Result<QuarantineRecord> {
        let next = self.counters.fetch_and_update(NEXT_ID_KEY, |current| {
            let value = current.map_or(0i64, |bytes| {
                i64::from_be_bytes(bytes.try_into().unwrap_or([0; 8]))
            });
            Some((value + 1).to_be_bytes().to_vec())
        })?;
        record.id = next.map_or(0i64, |bytes| i64::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0; 8])));

        let bytes = serde_json::to_vec(&record)?;
        self.records.insert(record.id.to_be_bytes(), bytes)?;
        self.by_hash
            .insert(record.sha256_hash.as_bytes(), &record.id.to_be_bytes())?;
        Ok(record)
    }

    pub fn get(&self, id: i64) -> Result<Option<QuarantineRecord>> {
        self.records
            .get(id.to_be_bytes())?
            .map(|bytes| Ok(serde_json::from_slice(&bytes)?))
            .transpose()
    }

    pub fn remove(&self, id: i64) -> Result<Option<QuarantineRecord>> {
        let Some(bytes) = self.records.remove(id.to_be_bytes())? else {
            return Ok(None);
        };
        let record: QuarantineRecord = serde_json::from_slice(&bytes)?;
        self.by_hash.remove(record.sha256_hash.as_bytes())?;
        Ok(Some(record))
    }

    pub fn list(&self) -> Result<Vec<QuarantineRecord>> {
        self.records
            .iter()
            .values()
            .map(|bytes| Ok(serde_json::from_slice(&bytes?)?))
            .collect()
    }
}
