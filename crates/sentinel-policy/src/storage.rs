//! Sled-backed persistence for policies and threat history.
//!
//! Named trees stand in for the conceptual relational tables: `policies`
//! and `threats` hold the primary records, `counters` holds monotonic id
//! allocators, and `hash_index`/`rule_index` are denormalized secondary
//! trees keyed by `file_hash`/`rule_name` so `match_policy`'s hot path
//! doesn't have to scan every policy on a cache miss.

use crate::error::{PolicyError, Result};
use crate::models::{Policy, PolicyMutation, ThreatRecord};
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree, UnabortableTransactionError};
use sled::Transactional;
use std::path::Path;

const POLICIES_TREE: &str = "policies";
const THREATS_TREE: &str = "threats";
const COUNTERS_TREE: &str = "counters";
const SCHEMA_TREE: &str = "schema_version";
const HASH_INDEX_TREE: &str = "policy_hash_index";
const RULE_INDEX_TREE: &str = "policy_rule_index";

const NEXT_POLICY_ID_KEY: &[u8] = b"next_policy_id";
const NEXT_THREAT_ID_KEY: &[u8] = b"next_threat_id";
const SCHEMA_VERSION_KEY: &[u8] = b"version";

/// Builds a secondary-index key: `field_bytes ++ 0x00 ++ id`. The
/// separator keeps a prefix scan for `"a"` from matching an entry keyed
/// under `"ab"`; the big-endian id suffix both disambiguates policies
/// sharing the same field value and gives `scan_prefix` natural
/// ascending-id order, which is exactly the tie-break `match_policy`
/// wants.
fn index_key(field: &[u8], id: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(field.len() + 1 + 8);
    key.extend_from_slice(field);
    key.push(0);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn index_query_prefix(field: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(field.len() + 1);
    key.extend_from_slice(field);
    key.push(0);
    key
}

fn insert_index_entries_txn(
    hash_index: &TransactionalTree,
    rule_index: &TransactionalTree,
    policy: &Policy,
) -> std::result::Result<(), UnabortableTransactionError> {
    if let Some(hash) = &policy.file_hash {
        hash_index.insert(index_key(hash.as_bytes(), policy.id), Vec::new())?;
    }
    if !policy.rule_name.is_empty() {
        rule_index.insert(index_key(policy.rule_name.as_bytes(), policy.id), Vec::new())?;
    }
    Ok(())
}

fn remove_index_entries_txn(
    hash_index: &TransactionalTree,
    rule_index: &TransactionalTree,
    policy: &Policy,
) -> std::result::Result<(), UnabortableTransactionError> {
    if let Some(hash) = &policy.file_hash {
        hash_index.remove(index_key(hash.as_bytes(), policy.id))?;
    }
    if !policy.rule_name.is_empty() {
        rule_index.remove(index_key(policy.rule_name.as_bytes(), policy.id))?;
    }
    Ok(())
}

/// Compiled-in schema version. Bump alongside an entry in [`MIGRATIONS`].
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

type Migration = fn(&Storage) -> Result<()>;

/// Ordered, idempotent migrations. Index 0 upgrades from version 0 to 1,
/// and so on. Currently empty past the baseline: there is nothing to
/// migrate from since version 1 is also the first shipped version.
const MIGRATIONS: &[Migration] = &[];

pub struct Storage {
    #[allow(dead_code)]
    db: sled::Db,
    policies: sled::Tree,
    threats: sled::Tree,
    counters: sled::Tree,
    schema: sled::Tree,
    hash_index: sled::Tree,
    rule_index: sled::Tree,
}

impl Storage {
    /// Opens or creates a policy store at `path`, applying any pending
    /// migrations.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::SchemaTooNew`] if the on-disk schema version
    /// is newer than [`CURRENT_SCHEMA_VERSION`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        let storage = Self::from_db(db)?;
        storage.run_migrations()?;
        Ok(storage)
    }

    /// In-memory store for tests.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        let storage = Self::from_db(db)?;
        storage.run_migrations()?;
        Ok(storage)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        let policies = db.open_tree(POLICIES_TREE)?;
        let threats = db.open_tree(THREATS_TREE)?;
        let counters = db.open_tree(COUNTERS_TREE)?;
        let schema = db.open_tree(SCHEMA_TREE)?;
        let hash_index = db.open_tree(HASH_INDEX_TREE)?;
        let rule_index = db.open_tree(RULE_INDEX_TREE)?;
        Ok(Self {
            db,
            policies,
            threats,
            counters,
            schema,
            hash_index,
            rule_index,
        })
    }

    fn run_migrations(&self) -> Result<()> {
        let on_disk = self
            .schema
            .get(SCHEMA_VERSION_KEY)?
            .map_or(0, |bytes| u32::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0; 4])));

        if on_disk > CURRENT_SCHEMA_VERSION {
            return Err(PolicyError::SchemaTooNew {
                found: on_disk,
                current: CURRENT_SCHEMA_VERSION,
            });
        }

        for migration in &MIGRATIONS[on_disk as usize..CURRENT_SCHEMA_VERSION as usize] {
            migration(self)?;
        }

        self.schema
            .insert(SCHEMA_VERSION_KEY, &CURRENT_SCHEMA_VERSION.to_be_bytes())?;
        Ok(())
    }

    fn next_id(&self, counter_key: &[u8]) -> Result<i64> {
        let next = self
            .counters
            .fetch_and_update(counter_key, |current| {
                let value = current.map_or(0i64, |bytes| {
                    i64::from_be_bytes(bytes.try_into().unwrap_or([0; 8]))
                });
                Some((value + 1).to_be_bytes().to_vec())
            })?
            .map_or(0i64, |bytes| i64::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0; 8])));
        Ok(next)
    }

    /// Inserts `policy`, assigning it a fresh id and ignoring any id
    /// already set on the argument.
    pub fn insert_policy(&self, mut policy: Policy) -> Result<Policy> {
        policy.id = self.next_id(NEXT_POLICY_ID_KEY)?;
        self.write_policy(&policy)?;
        Ok(policy)
    }

    pub fn write_policy(&self, policy: &Policy) -> Result<()> {
        if let Some(old) = self.get_policy(policy.id)? {
            self.remove_index_entries(&old)?;
        }
        let bytes = serde_json::to_vec(policy)?;
        self.policies.insert(policy.id.to_be_bytes(), bytes)?;
        self.insert_index_entries(policy)?;
        Ok(())
    }

    pub fn get_policy(&self, id: i64) -> Result<Option<Policy>> {
        self.policies
            .get(id.to_be_bytes())?
            .map(|bytes| Ok(serde_json::from_slice(&bytes)?))
            .transpose()
    }

    pub fn delete_policy(&self, id: i64) -> Result<bool> {
        if let Some(old) = self.get_policy(id)? {
            self.remove_index_entries(&old)?;
        }
        Ok(self.policies.remove(id.to_be_bytes())?.is_some())
    }

    pub fn list_policies(&self) -> Result<Vec<Policy>> {
        self.policies
            .iter()
            .values()
            .map(|bytes| Ok(serde_json::from_slice(&bytes?)?))
            .collect()
    }

    fn insert_index_entries(&self, policy: &Policy) -> Result<()> {
        if let Some(hash) = &policy.file_hash {
            self.hash_index.insert(index_key(hash.as_bytes(), policy.id), Vec::new())?;
        }
        if !policy.rule_name.is_empty() {
            self.rule_index
                .insert(index_key(policy.rule_name.as_bytes(), policy.id), Vec::new())?;
        }
        Ok(())
    }

    fn remove_index_entries(&self, policy: &Policy) -> Result<()> {
        if let Some(hash) = &policy.file_hash {
            self.hash_index.remove(index_key(hash.as_bytes(), policy.id))?;
        }
        if !policy.rule_name.is_empty() {
            self.rule_index.remove(index_key(policy.rule_name.as_bytes(), policy.id))?;
        }
        Ok(())
    }

    /// Candidate policy ids whose `file_hash` equals `hash`, ascending by
    /// id (lowest id first, matching `match_policy`'s tie-break).
    pub fn candidate_ids_by_hash(&self, hash: &str) -> Result<Vec<i64>> {
        self.scan_index_ids(&self.hash_index, hash.as_bytes())
    }

    /// Candidate policy ids whose `rule_name` equals `rule_name`,
    /// ascending by id.
    pub fn candidate_ids_by_rule_name(&self, rule_name: &str) -> Result<Vec<i64>> {
        self.scan_index_ids(&self.rule_index, rule_name.as_bytes())
    }

    fn scan_index_ids(&self, index: &sled::Tree, field: &[u8]) -> Result<Vec<i64>> {
        let mut ids = Vec::new();
        for entry in index.scan_prefix(index_query_prefix(field)) {
            let (key, _) = entry?;
            if key.len() < 8 {
                continue;
            }
            let id_bytes = &key[key.len() - 8..];
            ids.push(i64::from_be_bytes(id_bytes.try_into().unwrap_or([0; 8])));
        }
        Ok(ids)
    }

    /// Appends a threat record, assigning it a fresh id.
    pub fn insert_threat(&self, mut record: ThreatRecord) -> Result<ThreatRecord> {
        record.id = self.next_id(NEXT_THREAT_ID_KEY)?;
        let bytes = serde_json::to_vec(&record)?;
        self.threats.insert(record.id.to_be_bytes(), bytes)?;
        Ok(record)
    }

    pub fn list_threats(&self) -> Result<Vec<ThreatRecord>> {
        self.threats
            .iter()
            .values()
            .map(|bytes| Ok(serde_json::from_slice(&bytes?)?))
            .collect()
    }

    /// Deletes threat records detected before `cutoff`. Returns the count
    /// removed.
    pub fn prune_threats_before(&self, cutoff: chrono::DateTime<chrono::Utc>) -> Result<usize> {
        let mut pruned = 0;
        for record in self.list_threats()? {
            if record.detected_at < cutoff {
                self.threats.remove(record.id.to_be_bytes())?;
                pruned += 1;
            }
        }
        Ok(pruned)
    }

    pub fn flush(&self) -> Result<()> {
        self.policies.flush()?;
        self.threats.flush()?;
        Ok(())
    }

    /// Applies every mutation in `ops` as a single `sled` transaction over
    /// the `policies` and `counters` trees: either every insert, update, and
    /// delete lands, or (on any failure, including an update targeting a
    /// policy id that doesn't exist) none of them do.
    ///
    /// # Errors
    ///
    /// [`PolicyError::NotFound`] if an `Update` targets a nonexistent id.
    /// Propagates serialization and backing-store errors. On any error the
    /// whole batch is left unapplied.
    pub fn apply_transaction(&self, ops: &[PolicyMutation]) -> Result<Vec<Policy>> {
        if ops.is_empty() {
            return Ok(Vec::new());
        }

        (&self.policies, &self.counters, &self.hash_index, &self.rule_index)
            .transaction(|(policies_tree, counters_tree, hash_index_tree, rule_index_tree)| {
                let mut applied = Vec::new();
                let mut next_counter = counters_tree
                    .get(NEXT_POLICY_ID_KEY)?
                    .map_or(0i64, |bytes| i64::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0; 8])));

                for op in ops {
                    match op {
                        PolicyMutation::Insert(policy) => {
                            let mut policy = policy.clone();
                            policy.id = next_counter;
                            next_counter += 1;
                            let bytes = serde_json::to_vec(&policy)
                                .map_err(|e| ConflictableTransactionError::Abort(PolicyError::Serialization(e)))?;
                            policies_tree.insert(&policy.id.to_be_bytes(), bytes)?;
                            insert_index_entries_txn(hash_index_tree, rule_index_tree, &policy)?;
                            applied.push(policy);
                        }
                        PolicyMutation::Update(policy) => {
                            let Some(old_bytes) = policies_tree.get(policy.id.to_be_bytes())? else {
                                return Err(ConflictableTransactionError::Abort(PolicyError::NotFound(policy.id)));
                            };
                            let old: Policy = serde_json::from_slice(&old_bytes)
                                .map_err(|e| ConflictableTransactionError::Abort(PolicyError::Serialization(e)))?;
                            remove_index_entries_txn(hash_index_tree, rule_index_tree, &old)?;

                            let bytes = serde_json::to_vec(policy)
                                .map_err(|e| ConflictableTransactionError::Abort(PolicyError::Serialization(e)))?;
                            policies_tree.insert(&policy.id.to_be_bytes(), bytes)?;
                            insert_index_entries_txn(hash_index_tree, rule_index_tree, policy)?;
                            applied.push(policy.clone());
                        }
                        PolicyMutation::Delete(id) => {
                            let Some(old_bytes) = policies_tree.remove(id.to_be_bytes())? else {
                                return Err(ConflictableTransactionError::Abort(PolicyError::NotFound(*id)));
                            };
                            let old: Policy = serde_json::from_slice(&old_bytes)
                                .map_err(|e| ConflictableTransactionError::Abort(PolicyError::Serialization(e)))?;
                            remove_index_entries_txn(hash_index_tree, rule_index_tree, &old)?;
                        }
                    }
                }

                counters_tree.insert(NEXT_POLICY_ID_KEY, &next_counter.to_be_bytes())?;
                Ok(applied)
            })
            .map_err(|e: TransactionError<PolicyError>| match e {
                TransactionError::Abort(err) => err,
                TransactionError::Storage(err) => PolicyError::Database(err),
            })
    }
}
