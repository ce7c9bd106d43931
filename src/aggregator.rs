//! # Response Aggregation
//!
//! Final pipeline stage: project the reconciled, flat cluster into the
//! deduplicated consolidated view. Read-only.

use crate::error::StoreError;
use crate::model::{ContactId, ContactRecord};
use crate::store::RecordStore;
use serde::Serialize;

/// Deduplicated summary of one person's cluster.
///
/// Serializes camelCase to match the consolidated wire shape
/// (`primaryContactId`, `phoneNumbers`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedContact {
    pub primary_contact_id: ContactId,
    /// Distinct non-empty emails, the primary's first, the rest in
    /// ascending `created_at` order of their owning record.
    pub emails: Vec<String>,
    /// Same rule as `emails`, for phone numbers.
    pub phone_numbers: Vec<String>,
    /// Ids of all secondary members, ascending `created_at`.
    pub secondary_contact_ids: Vec<ContactId>,
}

/// Project the cluster rooted at `main_primary` into its consolidated view.
pub fn consolidate(
    store: &dyn RecordStore,
    main_primary: &ContactRecord,
) -> Result<ConsolidatedContact, StoreError> {
    let members = store.find_cluster(main_primary.id)?;

    let mut emails: Vec<String> = Vec::new();
    let mut phone_numbers: Vec<String> = Vec::new();
    let mut secondary_contact_ids: Vec<ContactId> = Vec::new();

    // The primary is seeded first even though the flatness invariant makes
    // it the oldest member anyway; the projection must not depend on store
    // ordering for the canonical slot.
    push_distinct(&mut emails, main_primary.email.as_deref());
    push_distinct(&mut phone_numbers, main_primary.phone.as_deref());

    for member in &members {
        push_distinct(&mut emails, member.email.as_deref());
        push_distinct(&mut phone_numbers, member.phone.as_deref());
        if !member.is_primary() {
            secondary_contact_ids.push(member.id);
        }
    }

    Ok(ConsolidatedContact {
        primary_contact_id: main_primary.id,
        emails,
        phone_numbers,
        secondary_contact_ids,
    })
}

fn push_distinct(values: &mut Vec<String>, value: Option<&str>) {
    if let Some(value) = value {
        if !value.is_empty() && !values.iter().any(|existing| existing == value) {
            values.push(value.to_string());
        }
    }
}
