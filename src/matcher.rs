//! # Match Collection
//!
//! First pipeline stage: find every existing record sharing the
//! observation's email or phone. Read-only; an empty result means the
//! observation has never been seen.

use crate::error::StoreError;
use crate::model::{ContactRecord, Observation};
use crate::store::RecordStore;

/// Collect all records matching the observation's contact points, ordered
/// by ascending `created_at`.
pub fn collect_matches(
    store: &dyn RecordStore,
    observation: &Observation,
) -> Result<Vec<ContactRecord>, StoreError> {
    store.find_by_email_or_phone(observation.email(), observation.phone())
}
