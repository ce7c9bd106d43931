//! # Record Synthesis
//!
//! Third pipeline stage: decide whether the observation introduces a new
//! contact-point combination and, if so, attach it to the main primary as a
//! fresh secondary. Repeated identical observations create nothing.
//!
//! The exact-combination probe leaves absent observation fields
//! unconstrained, matching the original partial semantics: a single-field
//! observation that already matched something carries no new contact point,
//! so no record is minted for it.

use crate::error::StoreError;
use crate::model::{ContactRecord, Observation, Precedence};
use crate::store::RecordStore;
use tracing::debug;

/// Create a secondary for the observation's combination unless an exact
/// match already exists. Returns the created record, if any.
pub fn ensure_contact_point(
    store: &dyn RecordStore,
    observation: &Observation,
    main_primary: &ContactRecord,
) -> Result<Option<ContactRecord>, StoreError> {
    if store
        .find_exact(observation.email(), observation.phone())?
        .is_some()
    {
        return Ok(None);
    }

    let created = store.create(
        observation.email().map(str::to_owned),
        observation.phone().map(str::to_owned),
        Precedence::Secondary,
        Some(main_primary.id),
    )?;
    debug!(id = %created.id, primary = %main_primary.id, "synthesized secondary");
    Ok(Some(created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn new_combination_becomes_a_linked_secondary() {
        let store = Store::new();
        let primary = store
            .create(Some("a@x.com".to_string()), None, Precedence::Primary, None)
            .unwrap();

        let observation = Observation::from_pair("a@x.com", "555");
        let created = ensure_contact_point(&store, &observation, &primary)
            .unwrap()
            .expect("a secondary should be created");

        assert_eq!(created.precedence, Precedence::Secondary);
        assert_eq!(created.linked_id, Some(primary.id));
        assert_eq!(created.phone.as_deref(), Some("555"));
    }

    #[test]
    fn repeated_combination_is_idempotent() {
        let store = Store::new();
        let primary = store
            .create(
                Some("a@x.com".to_string()),
                Some("555".to_string()),
                Precedence::Primary,
                None,
            )
            .unwrap();

        let observation = Observation::from_pair("a@x.com", "555");
        assert!(ensure_contact_point(&store, &observation, &primary)
            .unwrap()
            .is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn single_field_repeat_creates_nothing() {
        let store = Store::new();
        let primary = store
            .create(
                Some("a@x.com".to_string()),
                Some("555".to_string()),
                Precedence::Primary,
                None,
            )
            .unwrap();

        // Email alone already exists on a record; the probe's absent phone
        // does not constrain the match.
        let observation = Observation::from_email("a@x.com");
        assert!(ensure_contact_point(&store, &observation, &primary)
            .unwrap()
            .is_none());
        assert_eq!(store.len(), 1);
    }
}
