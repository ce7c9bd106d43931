//! # Engine Configuration

/// Tuning knobs for the identify engine.
#[derive(Debug, Clone)]
pub struct EngineTuning {
    /// Number of key-lock stripes. More stripes lower the chance that
    /// unrelated observations contend on the same lock.
    pub lock_stripes: usize,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self { lock_stripes: 64 }
    }
}

impl EngineTuning {
    pub fn balanced() -> Self {
        Self::default()
    }

    /// Small footprint for embedded or test use.
    pub fn compact() -> Self {
        Self { lock_stripes: 8 }
    }

    /// Wide striping for workloads with many concurrent distinct identities.
    pub fn high_contention() -> Self {
        Self { lock_stripes: 256 }
    }
}
