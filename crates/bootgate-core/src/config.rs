//! Protocol configuration knobs.
//!
//! `GateConfig` gathers the policy knobs the enforcers consult. Defaults
//! are the strict, fail-closed settings; relaxations exist only for test
//! harnesses that exercise a stage in isolation.

use serde::{Deserialize, Serialize};

/// Configuration for both gate stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GateConfig {
    /// Reject declared archive hashes that do not have the
    /// `"{algorithm}:{hex}"` shape.
    pub require_well_formed_hashes: bool,

    /// Require a locked snapshot before any bootstrap lock is attempted.
    ///
    /// Disabling this is a testing escape hatch for exercising the
    /// bootstrap stage in isolation; production callers leave it on.
    pub enforce_snapshot_precondition: bool,

    /// Number of random bytes in generated identifier and token suffixes.
    pub suffix_entropy_bytes: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            require_well_formed_hashes: true,
            enforce_snapshot_precondition: true,
            suffix_entropy_bytes: 4,
        }
    }
}

impl GateConfig {
    /// Generates a random lowercase-hex suffix of the configured length.
    #[must_use]
    pub(crate) fn random_suffix(&self) -> String {
        use rand::RngCore;
        use std::fmt::Write;

        let mut bytes = vec![0u8; self.suffix_entropy_bytes];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes.iter().fold(
            String::with_capacity(bytes.len() * 2),
            |mut acc, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_strict() {
        let config = GateConfig::default();
        assert!(config.require_well_formed_hashes);
        assert!(config.enforce_snapshot_precondition);
        assert_eq!(config.suffix_entropy_bytes, 4);
    }

    #[test]
    fn test_random_suffix_shape() {
        let config = GateConfig::default();
        let suffix = config.random_suffix();
        assert_eq!(suffix.len(), 8);
        assert!(suffix
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
    }
}
