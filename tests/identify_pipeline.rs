use unify_rs::{IdentifyError, Observation, Unify};

#[test]
fn new_identity_creates_one_primary() -> anyhow::Result<()> {
    let unify = Unify::new();

    let view = unify.identify(&Observation::from_email("a@x.com"))?;

    assert_eq!(view.emails, vec!["a@x.com"]);
    assert!(view.phone_numbers.is_empty());
    assert!(view.secondary_contact_ids.is_empty());
    assert_eq!(unify.record_count(), 1);

    let contacts = unify.contacts();
    assert!(contacts[0].is_primary());
    assert_eq!(view.primary_contact_id, contacts[0].id);
    Ok(())
}

#[test]
fn exact_repeat_is_idempotent() -> anyhow::Result<()> {
    let unify = Unify::new();
    let observation = Observation::from_pair("a@x.com", "555");

    let first = unify.identify(&observation)?;
    let second = unify.identify(&observation)?;

    assert_eq!(unify.record_count(), 1);
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn new_fragment_attaches_to_the_known_identity() -> anyhow::Result<()> {
    let unify = Unify::new();
    let original = unify.identify(&Observation::from_email("a@x.com"))?;

    let view = unify.identify(&Observation::from_pair("a@x.com", "555"))?;

    assert_eq!(view.primary_contact_id, original.primary_contact_id);
    assert_eq!(view.emails, vec!["a@x.com"]);
    assert_eq!(view.phone_numbers, vec!["555"]);
    assert_eq!(view.secondary_contact_ids.len(), 1);
    assert_eq!(unify.record_count(), 2);

    let secondary_id = view.secondary_contact_ids[0];
    let secondary = unify
        .contacts()
        .into_iter()
        .find(|r| r.id == secondary_id)
        .expect("secondary record");
    assert_eq!(secondary.linked_id, Some(original.primary_contact_id));
    Ok(())
}

#[test]
fn phone_only_observations_resolve_too() -> anyhow::Result<()> {
    let unify = Unify::new();
    let first = unify.identify(&Observation::from_phone("555"))?;
    let second = unify.identify(&Observation::from_phone("555"))?;

    assert_eq!(first.primary_contact_id, second.primary_contact_id);
    assert_eq!(first.phone_numbers, vec!["555"]);
    assert!(first.emails.is_empty());
    assert_eq!(unify.record_count(), 1);
    Ok(())
}

#[test]
fn empty_observation_is_rejected_before_any_store_access() {
    let unify = Unify::new();

    let err = unify.identify_parts(None, None).unwrap_err();
    assert!(matches!(err, IdentifyError::InvalidInput));

    let err = unify
        .identify_parts(Some(String::new()), Some(String::new()))
        .unwrap_err();
    assert!(matches!(err, IdentifyError::InvalidInput));

    // Nothing was created while rejecting.
    assert_eq!(unify.record_count(), 0);
}

#[test]
fn single_field_repeat_of_a_full_record_creates_nothing() -> anyhow::Result<()> {
    let unify = Unify::new();
    unify.identify(&Observation::from_pair("a@x.com", "555"))?;

    // The email alone is a known contact point; the absent phone does not
    // constrain the exact-match probe.
    let view = unify.identify(&Observation::from_email("a@x.com"))?;

    assert_eq!(unify.record_count(), 1);
    assert_eq!(view.emails, vec!["a@x.com"]);
    assert_eq!(view.phone_numbers, vec!["555"]);
    Ok(())
}
