use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use unify_rs::{Observation, Precedence, RecordStore};

/// Generate a randomized stream of observations over a bounded pool of
/// contact values, so repeated and bridging observations occur naturally.
#[allow(dead_code)]
pub fn generate_observations(count: usize, overlap_probability: f64, seed: u64) -> Vec<Observation> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut observations = Vec::with_capacity(count);

    let pool = 1 + (count as f64 * (1.0 - overlap_probability)) as usize;

    for _ in 0..count {
        let email = if rng.random_bool(0.8) {
            Some(format!("user_{:04}@example.com", rng.random_range(0..pool)))
        } else {
            None
        };
        let phone = if email.is_none() || rng.random_bool(0.6) {
            Some(format!("555-{:04}", rng.random_range(0..pool)))
        } else {
            None
        };
        observations.push(Observation::new(email, phone).expect("generated observation"));
    }

    observations
}

/// Assert the structural invariants over the whole store: every record has
/// a contact point, links are flat, link targets are primaries, and each
/// primary is the oldest member of its cluster.
#[allow(dead_code)]
pub fn audit_store(store: &dyn RecordStore) -> anyhow::Result<()> {
    let records = store.all_records();

    for record in &records {
        if !record.has_contact_point() {
            anyhow::bail!("record {} has no contact point", record.id);
        }
        match record.precedence {
            Precedence::Primary => {
                if record.linked_id.is_some() {
                    anyhow::bail!("primary {} carries a linked_id", record.id);
                }
            }
            Precedence::Secondary => {
                let Some(target_id) = record.linked_id else {
                    anyhow::bail!("secondary {} has no linked_id", record.id);
                };
                let Some(target) = records.iter().find(|r| r.id == target_id) else {
                    anyhow::bail!("secondary {} links to missing {}", record.id, target_id);
                };
                if !target.is_primary() {
                    anyhow::bail!(
                        "secondary {} links to {}, which is not primary",
                        record.id,
                        target_id
                    );
                }
                if target.created_at >= record.created_at {
                    anyhow::bail!(
                        "primary {} is not older than its secondary {}",
                        target_id,
                        record.id
                    );
                }
            }
        }
    }

    Ok(())
}
