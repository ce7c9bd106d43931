//! # Cluster Reconciliation
//!
//! Second pipeline stage: from the match set, discover every root identity
//! touched, select the canonical primary, and merge the rest into it.
//!
//! Canonical selection is a pure function of creation order. The root
//! records are fetched and sorted in a second pass rather than folded into
//! the initial match, because the match set alone cannot rank two
//! previously-disjoint clusters bridged by one observation.

use crate::error::StoreError;
use crate::model::{ContactId, ContactRecord, Precedence};
use crate::store::{LinkRewrite, RecordStore};
use std::collections::BTreeSet;
use tracing::debug;

/// Result of reconciling one non-empty match set.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// The canonical primary for every record touched by the observation.
    pub main_primary: ContactRecord,
    /// Former primaries demoted by this call. Empty when the match set
    /// already shared a single root.
    pub demoted: Vec<ContactId>,
}

/// Reconcile the clusters touched by `matches` (must be non-empty).
///
/// Every root other than the oldest is demoted to a secondary of the main
/// primary, and each of its own secondaries is repointed as well, so no
/// link chain deeper than one hop survives the merge.
pub fn reconcile(
    store: &dyn RecordStore,
    matches: &[ContactRecord],
) -> Result<ReconcileOutcome, StoreError> {
    debug_assert!(!matches.is_empty(), "reconcile requires a non-empty match set");

    let roots: BTreeSet<ContactId> = matches.iter().map(ContactRecord::root_id).collect();
    let root_records = store.find_by_ids(&roots)?;

    // Every discovered root must resolve, otherwise some secondary carries
    // a dangling link and the cluster cannot be ranked.
    for id in &roots {
        if !root_records.iter().any(|record| record.id == *id) {
            return Err(StoreError::MissingRecord(*id));
        }
    }

    let mut iter = root_records.into_iter();
    let main_primary = iter
        .next()
        .ok_or_else(|| StoreError::Unavailable("root lookup returned no records".to_string()))?;

    // Stage every rewrite first, then apply them as one batch. Repointing
    // each stale root's entire cluster, not just the root, keeps links one
    // hop deep; batching keeps a failed write from leaving the merge half
    // applied.
    let mut demoted = Vec::new();
    let mut rewrites = Vec::new();
    for stale_root in iter {
        let members = store.find_cluster(stale_root.id)?;
        for member in members {
            if member.id == main_primary.id {
                continue;
            }
            rewrites.push(LinkRewrite {
                id: member.id,
                precedence: Precedence::Secondary,
                linked_id: Some(main_primary.id),
            });
        }
        demoted.push(stale_root.id);
    }

    if !rewrites.is_empty() {
        store.update_links(&rewrites)?;
        debug!(
            demoted = demoted.len(),
            relinked = rewrites.len(),
            into = %main_primary.id,
            "demoted stale primaries"
        );
    }

    Ok(ReconcileOutcome {
        main_primary,
        demoted,
    })
}
