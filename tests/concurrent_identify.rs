#[path = "../src/test_support.rs"]
mod test_support;

use std::sync::Arc;
use test_support::audit_store;
use unify_rs::{Observation, Unify};

#[test]
fn concurrent_overlapping_observations_converge_to_one_primary() -> anyhow::Result<()> {
    let unify = Arc::new(Unify::new());
    let observations = [
        Observation::from_email("shared@x.com"),
        Observation::from_phone("555"),
        Observation::from_pair("shared@x.com", "555"),
        Observation::from_pair("other@x.com", "555"),
    ];

    let mut handles = Vec::new();
    for observation in observations {
        let unify = Arc::clone(&unify);
        handles.push(std::thread::spawn(move || {
            for _ in 0..50 {
                unify.identify(&observation).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // Force a final bridge across everything, then check the shape.
    let left = unify.identify(&Observation::from_pair("shared@x.com", "555"))?;
    let right = unify.identify(&Observation::from_pair("other@x.com", "555"))?;
    assert_eq!(left.primary_contact_id, right.primary_contact_id);

    audit_store(unify.store())?;

    let primaries: Vec<_> = unify
        .contacts()
        .into_iter()
        .filter(|r| r.is_primary())
        .collect();
    assert_eq!(primaries.len(), 1);
    assert_eq!(primaries[0].id, left.primary_contact_id);
    Ok(())
}

#[test]
fn concurrent_repeats_of_one_observation_create_one_record() -> anyhow::Result<()> {
    let unify = Arc::new(Unify::new());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let unify = Arc::clone(&unify);
        handles.push(std::thread::spawn(move || {
            let observation = Observation::from_pair("a@x.com", "555");
            for _ in 0..100 {
                unify.identify(&observation).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(unify.record_count(), 1);
    audit_store(unify.store())?;
    Ok(())
}

#[test]
fn disjoint_observations_do_not_interfere() -> anyhow::Result<()> {
    let unify = Arc::new(Unify::new());

    let mut handles = Vec::new();
    for worker in 0..8 {
        let unify = Arc::clone(&unify);
        handles.push(std::thread::spawn(move || {
            for i in 0..50 {
                let observation = Observation::from_pair(
                    format!("w{}_{}@x.com", worker, i),
                    format!("{}-{:04}", worker, i),
                );
                unify.identify(&observation).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(unify.record_count(), 8 * 50);
    let metrics = unify.store_metrics();
    assert_eq!(metrics.primaries, 8 * 50);
    assert_eq!(metrics.secondaries, 0);
    audit_store(unify.store())?;
    Ok(())
}
