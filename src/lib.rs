//! # Unify
//!
//! A contact identity resolution and consolidation engine.
//!
//! Partial identity fragments (an email, a phone number, or both) arrive as
//! observations; the engine decides whether each one belongs to a known
//! customer, a new customer, or bridges two previously-separate identity
//! clusters that must now merge. Clusters stay flat: every member links
//! directly to one canonical primary, always the oldest record involved.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod locking;
pub mod matcher;
pub mod model;
pub mod reconciler;
pub mod store;
pub mod synthesizer;

// Re-export main types for convenience
pub use aggregator::ConsolidatedContact;
pub use config::EngineTuning;
pub use error::{IdentifyError, StoreError};
pub use model::{ContactId, ContactRecord, Observation, Precedence, Timestamp};
pub use store::{LinkRewrite, RecordStore, Store, StoreMetrics, StoreSnapshot};

use locking::KeyLockManager;
use std::collections::BTreeSet;
use tracing::debug;

/// Main API for contact identity resolution.
///
/// Owns the record store as an explicitly passed collaborator and
/// serializes overlapping observations through striped per-key locks, so
/// the match/reconcile/synthesize sequence of one `identify` call is never
/// observed half-applied by another call touching the same values.
pub struct Unify {
    store: Box<dyn RecordStore>,
    key_locks: KeyLockManager,
}

impl Unify {
    /// Create an engine backed by the in-memory store.
    pub fn new() -> Self {
        Self::with_store(Store::new())
    }

    /// Create an engine with a custom store implementation.
    pub fn with_store<S>(store: S) -> Self
    where
        S: RecordStore + 'static,
    {
        Self::with_store_and_tuning(store, EngineTuning::default())
    }

    pub fn with_store_and_tuning<S>(store: S, tuning: EngineTuning) -> Self
    where
        S: RecordStore + 'static,
    {
        Self {
            store: Box::new(store),
            key_locks: KeyLockManager::new(tuning.lock_stripes),
        }
    }

    /// Resolve one observation and return the consolidated cluster view.
    ///
    /// The pipeline runs strictly forward: match collection, cluster
    /// reconciliation, conditional record synthesis, aggregation. An
    /// observation that matches nothing short-circuits into a brand-new
    /// primary without invoking the reconciler.
    pub fn identify(&self, observation: &Observation) -> Result<ConsolidatedContact, IdentifyError> {
        let store = self.store.as_ref();

        // A merge rewrites records whose values the observation never
        // mentions, so the held stripes must cover every contact value in
        // every touched cluster, not just the observation's own keys.
        // Lock, match, expand to the clusters' values, and re-acquire until
        // the stripe set is stable. Each acquisition takes the whole set in
        // ascending order after dropping the previous guard, so concurrent
        // expansions cannot deadlock. Once stable, any competing call that
        // could touch these clusters shares a value with them and therefore
        // blocks on a stripe we hold.
        let mut stripes = self.key_locks.stripes_for(observation.keys());
        let (_serialized, matches) = loop {
            let guard = self.key_locks.lock_stripes(&stripes);
            let matches = matcher::collect_matches(store, observation)?;
            let expanded = self.cluster_stripes(&matches, &stripes)?;
            if expanded == stripes {
                break (guard, matches);
            }
            drop(guard);
            stripes = expanded;
        };

        if matches.is_empty() {
            let created = store.create(
                observation.email().map(str::to_owned),
                observation.phone().map(str::to_owned),
                Precedence::Primary,
                None,
            )?;
            debug!(id = %created.id, %observation, "created primary for unseen observation");
            return Ok(aggregator::consolidate(store, &created)?);
        }

        let outcome = reconciler::reconcile(store, &matches)?;
        if !outcome.demoted.is_empty() {
            debug!(
                primary = %outcome.main_primary.id,
                merged = outcome.demoted.len(),
                %observation,
                "observation bridged clusters"
            );
        }

        synthesizer::ensure_contact_point(store, observation, &outcome.main_primary)?;

        Ok(aggregator::consolidate(store, &outcome.main_primary)?)
    }

    /// The held stripes plus the stripe of every contact value carried by
    /// the clusters the matched records belong to. Missing roots are left
    /// for the reconciler to report.
    fn cluster_stripes(
        &self,
        matches: &[ContactRecord],
        held: &BTreeSet<usize>,
    ) -> Result<BTreeSet<usize>, StoreError> {
        let store = self.store.as_ref();
        let roots: BTreeSet<ContactId> = matches.iter().map(ContactRecord::root_id).collect();

        let mut stripes = held.clone();
        for root in store.find_by_ids(&roots)? {
            for member in store.find_cluster(root.id)? {
                let values = member
                    .email
                    .as_deref()
                    .into_iter()
                    .chain(member.phone.as_deref());
                stripes.extend(self.key_locks.stripes_for(values));
            }
        }
        Ok(stripes)
    }

    /// Validate raw optional fields into an observation and resolve it.
    pub fn identify_parts(
        &self,
        email: Option<String>,
        phone: Option<String>,
    ) -> Result<ConsolidatedContact, IdentifyError> {
        let observation = Observation::new(email, phone)?;
        self.identify(&observation)
    }

    /// All known records, ordered by ascending `created_at`.
    pub fn contacts(&self) -> Vec<ContactRecord> {
        self.store.all_records()
    }

    pub fn record_count(&self) -> usize {
        self.store.len()
    }

    pub fn store_metrics(&self) -> StoreMetrics {
        self.store.metrics()
    }

    /// Direct access to the underlying store.
    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// Create a durable checkpoint of the underlying store, if supported.
    pub fn checkpoint(&self, path: &std::path::Path) -> Result<(), StoreError> {
        self.store.checkpoint(path)
    }
}

impl Default for Unify {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identify_on_empty_store_creates_a_singleton_primary() {
        let unify = Unify::new();
        let view = unify
            .identify(&Observation::from_email("a@x.com"))
            .unwrap();

        assert_eq!(view.emails, vec!["a@x.com"]);
        assert!(view.phone_numbers.is_empty());
        assert!(view.secondary_contact_ids.is_empty());
        assert_eq!(unify.record_count(), 1);
        assert!(unify.contacts()[0].is_primary());
    }

    #[test]
    fn contacts_lists_records_in_creation_order() {
        let unify = Unify::new();
        unify.identify(&Observation::from_email("a@x.com")).unwrap();
        unify.identify(&Observation::from_phone("555")).unwrap();

        let contacts = unify.contacts();
        assert_eq!(contacts.len(), 2);
        assert!(contacts[0].created_at < contacts[1].created_at);
    }

    #[test]
    fn metrics_reflect_cluster_growth() {
        let unify = Unify::new();
        unify.identify(&Observation::from_email("a@x.com")).unwrap();
        unify
            .identify(&Observation::from_pair("a@x.com", "555"))
            .unwrap();

        let metrics = unify.store_metrics();
        assert_eq!(metrics.records, 2);
        assert_eq!(metrics.primaries, 1);
        assert_eq!(metrics.secondaries, 1);
    }
}
