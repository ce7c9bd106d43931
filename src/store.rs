//! # Store Module
//!
//! The record-store seam consumed by the identify pipeline, plus the
//! default in-memory implementation with value indexes and a versioned
//! JSON snapshot format.

use crate::error::StoreError;
use crate::model::{ContactId, ContactRecord, Precedence, Timestamp};
use anyhow::{bail, Context, Result};
use hashbrown::HashMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Aggregate counters over a store's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreMetrics {
    pub records: usize,
    pub primaries: usize,
    pub secondaries: usize,
}

/// One precedence/link rewrite within a merge batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRewrite {
    pub id: ContactId,
    pub precedence: Precedence,
    pub linked_id: Option<ContactId>,
}

/// Storage operations the identify pipeline depends on.
///
/// Implementations must be internally synchronized: each method is atomic
/// on its own. Serialization of whole read-modify-write observations is the
/// engine's job, via per-key locking.
pub trait RecordStore: Send + Sync {
    /// Every record whose email equals `email` OR whose phone equals
    /// `phone`. An absent argument does not constrain the match. Ordered by
    /// ascending `created_at`.
    fn find_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<ContactRecord>, StoreError>;

    /// The records with the given ids, ordered by ascending `created_at`.
    /// Ids that do not exist are silently skipped.
    fn find_by_ids(&self, ids: &BTreeSet<ContactId>) -> Result<Vec<ContactRecord>, StoreError>;

    /// The oldest record matching every supplied field exactly. An absent
    /// argument does not constrain the match.
    fn find_exact(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<ContactRecord>, StoreError>;

    /// Create a record with a fresh id and a monotonically assigned
    /// `created_at`.
    fn create(
        &self,
        email: Option<String>,
        phone: Option<String>,
        precedence: Precedence,
        linked_id: Option<ContactId>,
    ) -> Result<ContactRecord, StoreError>;

    /// Rewrite a record's precedence and link target. Email, phone, and
    /// `created_at` are immutable and stay untouched.
    fn update_link(
        &self,
        id: ContactId,
        precedence: Precedence,
        linked_id: Option<ContactId>,
    ) -> Result<(), StoreError>;

    /// Apply a batch of link rewrites as one unit: either every rewrite
    /// lands or none does. A merge that demotes a whole cluster goes
    /// through here so a failed write cannot leave the cluster half
    /// repointed.
    fn update_links(&self, rewrites: &[LinkRewrite]) -> Result<(), StoreError>;

    /// The record with id `primary_id` plus every record whose `linked_id`
    /// equals it, ordered by ascending `created_at`.
    fn find_cluster(&self, primary_id: ContactId) -> Result<Vec<ContactRecord>, StoreError>;

    /// All records, ordered by ascending `created_at`.
    fn all_records(&self) -> Vec<ContactRecord>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a durable checkpoint of the store, if the implementation
    /// supports one.
    fn checkpoint(&self, _path: &Path) -> Result<(), StoreError> {
        Err(StoreError::Unavailable(
            "checkpointing is not supported by this store".to_string(),
        ))
    }

    fn metrics(&self) -> StoreMetrics {
        let records = self.all_records();
        let primaries = records.iter().filter(|r| r.is_primary()).count();
        StoreMetrics {
            records: records.len(),
            primaries,
            secondaries: records.len() - primaries,
        }
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    records: HashMap<ContactId, ContactRecord>,
    email_index: FxHashMap<String, Vec<ContactId>>,
    phone_index: FxHashMap<String, Vec<ContactId>>,
    next_id: u32,
    last_stamp: Timestamp,
}

impl StoreInner {
    fn index_record(&mut self, record: &ContactRecord) {
        if let Some(email) = &record.email {
            self.email_index.entry(email.clone()).or_default().push(record.id);
        }
        if let Some(phone) = &record.phone {
            self.phone_index.entry(phone.clone()).or_default().push(record.id);
        }
    }

    fn sorted(&self, ids: impl IntoIterator<Item = ContactId>) -> Vec<ContactRecord> {
        let unique: BTreeSet<ContactId> = ids.into_iter().collect();
        let mut records: Vec<ContactRecord> = unique
            .into_iter()
            .filter_map(|id| self.records.get(&id).cloned())
            .collect();
        records.sort_by_key(|record| (record.created_at, record.id));
        records
    }
}

/// In-memory record store with per-value indexes.
#[derive(Debug)]
pub struct Store {
    inner: RwLock<StoreInner>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                next_id: 1,
                ..StoreInner::default()
            }),
        }
    }

    /// Rebuild a store from a snapshot, validating the format version and
    /// the linkage invariants before accepting any record.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self> {
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            bail!(
                "unsupported snapshot format {} (expected {})",
                snapshot.format_version,
                SNAPSHOT_FORMAT_VERSION
            );
        }

        let mut inner = StoreInner {
            next_id: snapshot.next_id,
            ..StoreInner::default()
        };

        for record in &snapshot.records {
            if !record.has_contact_point() {
                bail!("snapshot record {} has no contact point", record.id);
            }
            match record.precedence {
                Precedence::Primary => {
                    if record.linked_id.is_some() {
                        bail!("snapshot primary {} carries a linked_id", record.id);
                    }
                }
                Precedence::Secondary => {
                    let Some(target) = record.linked_id else {
                        bail!("snapshot secondary {} has no linked_id", record.id);
                    };
                    let valid = snapshot
                        .records
                        .iter()
                        .any(|other| other.id == target && other.is_primary());
                    if !valid {
                        bail!(
                            "snapshot secondary {} links to {}, which is not a primary",
                            record.id,
                            target
                        );
                    }
                }
            }
        }

        for record in snapshot.records {
            inner.index_record(&record);
            inner.next_id = inner.next_id.max(record.id.0 + 1);
            inner.last_stamp = inner.last_stamp.max(record.created_at);
            inner.records.insert(record.id, record);
        }

        Ok(Self {
            inner: RwLock::new(inner),
        })
    }

    /// Capture the full store contents for serialization.
    pub fn snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.read();
        let mut records: Vec<ContactRecord> = inner.records.values().cloned().collect();
        records.sort_by_key(|record| record.id);
        StoreSnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            next_id: inner.next_id,
            records,
        }
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(&self.snapshot())?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write snapshot to {}", path.display()))?;
        Ok(())
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read snapshot from {}", path.display()))?;
        let snapshot: StoreSnapshot = serde_json::from_slice(&bytes)
            .with_context(|| format!("malformed snapshot at {}", path.display()))?;
        Self::from_snapshot(snapshot)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for Store {
    fn find_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<ContactRecord>, StoreError> {
        let inner = self.inner.read();
        let mut ids: Vec<ContactId> = Vec::new();
        if let Some(email) = email {
            if let Some(hits) = inner.email_index.get(email) {
                ids.extend(hits.iter().copied());
            }
        }
        if let Some(phone) = phone {
            if let Some(hits) = inner.phone_index.get(phone) {
                ids.extend(hits.iter().copied());
            }
        }
        Ok(inner.sorted(ids))
    }

    fn find_by_ids(&self, ids: &BTreeSet<ContactId>) -> Result<Vec<ContactRecord>, StoreError> {
        let inner = self.inner.read();
        Ok(inner.sorted(ids.iter().copied()))
    }

    fn find_exact(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<ContactRecord>, StoreError> {
        let inner = self.inner.read();
        // Seed candidates from whichever index has a value; filter applies
        // only the supplied fields.
        let candidates: Vec<ContactId> = match (email, phone) {
            (Some(email), _) => inner.email_index.get(email).cloned().unwrap_or_default(),
            (None, Some(phone)) => inner.phone_index.get(phone).cloned().unwrap_or_default(),
            (None, None) => Vec::new(),
        };
        let matches = inner.sorted(candidates);
        Ok(matches
            .into_iter()
            .find(|record| {
                email.is_none_or(|value| record.email.as_deref() == Some(value))
                    && phone.is_none_or(|value| record.phone.as_deref() == Some(value))
            }))
    }

    fn create(
        &self,
        email: Option<String>,
        phone: Option<String>,
        precedence: Precedence,
        linked_id: Option<ContactId>,
    ) -> Result<ContactRecord, StoreError> {
        let email = email.filter(|v| !v.is_empty());
        let phone = phone.filter(|v| !v.is_empty());
        if email.is_none() && phone.is_none() {
            return Err(StoreError::EmptyRecord);
        }

        let mut inner = self.inner.write();
        let id = ContactId(inner.next_id);
        inner.next_id += 1;
        let created_at = now_millis().max(inner.last_stamp + 1);
        inner.last_stamp = created_at;

        let record = ContactRecord {
            id,
            email,
            phone,
            precedence,
            linked_id,
            created_at,
        };
        inner.index_record(&record);
        inner.records.insert(id, record.clone());
        Ok(record)
    }

    fn update_link(
        &self,
        id: ContactId,
        precedence: Precedence,
        linked_id: Option<ContactId>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let record = inner
            .records
            .get_mut(&id)
            .ok_or(StoreError::MissingRecord(id))?;
        record.precedence = precedence;
        record.linked_id = linked_id;
        Ok(())
    }

    fn update_links(&self, rewrites: &[LinkRewrite]) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        // Validate the whole batch before touching anything, so a bad id
        // cannot leave earlier rewrites applied.
        for rewrite in rewrites {
            if !inner.records.contains_key(&rewrite.id) {
                return Err(StoreError::MissingRecord(rewrite.id));
            }
        }
        for rewrite in rewrites {
            if let Some(record) = inner.records.get_mut(&rewrite.id) {
                record.precedence = rewrite.precedence;
                record.linked_id = rewrite.linked_id;
            }
        }
        Ok(())
    }

    fn find_cluster(&self, primary_id: ContactId) -> Result<Vec<ContactRecord>, StoreError> {
        let inner = self.inner.read();
        let ids: Vec<ContactId> = inner
            .records
            .values()
            .filter(|record| record.id == primary_id || record.linked_id == Some(primary_id))
            .map(|record| record.id)
            .collect();
        Ok(inner.sorted(ids))
    }

    fn all_records(&self) -> Vec<ContactRecord> {
        let inner = self.inner.read();
        let ids: Vec<ContactId> = inner.records.keys().copied().collect();
        inner.sorted(ids)
    }

    fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    fn checkpoint(&self, path: &Path) -> Result<(), StoreError> {
        self.save_to(path)
            .map_err(|err| StoreError::Unavailable(err.to_string()))
    }
}

/// Serializable view of a `Store`, versioned so incompatible layouts are
/// rejected on load instead of silently misread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub format_version: u32,
    pub next_id: u32,
    pub records: Vec<ContactRecord>,
}

fn now_millis() -> Timestamp {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as Timestamp
}
