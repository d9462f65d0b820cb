use crate::error::{BucketError, Result};
use crate::hash::HashKind;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Table size used when nothing else is configured.
pub const DEFAULT_TABLE_SIZE: usize = 1_000_000;

/// Creation-time parameters of a bucket filter. None of them can change
/// once the filter exists.
#[derive(Clone, Debug, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(pattern = "owned")]
pub struct BucketFilterConfig {
    /// Number of one-byte slots in the table
    #[builder(default = "DEFAULT_TABLE_SIZE")]
    pub table_size: usize,

    /// Hash multiplier
    #[builder(default = "1")]
    pub hash_a: u64,

    /// Hash additive offset
    #[builder(default = "0")]
    pub hash_b: u64,

    /// Fingerprint function addressing the table
    #[builder(default)]
    pub hash_kind: HashKind,
}

impl Default for BucketFilterConfig {
    fn default() -> Self {
        Self {
            table_size: DEFAULT_TABLE_SIZE,
            hash_a: 1,
            hash_b: 0,
            hash_kind: HashKind::Positional,
        }
    }
}

impl BucketFilterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.table_size == 0 {
            return Err(BucketError::InvalidConfig(
                "Table size must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_match_default() {
        let built = BucketFilterConfigBuilder::default().build().unwrap();
        assert_eq!(built, BucketFilterConfig::default());
        assert_eq!(built.table_size, 1_000_000);
        assert_eq!(built.hash_a, 1);
        assert_eq!(built.hash_b, 0);
        assert_eq!(built.hash_kind, HashKind::Positional);
    }

    #[test]
    fn test_zero_table_size_rejected() {
        let config = BucketFilterConfigBuilder::default()
            .table_size(0)
            .build()
            .unwrap();
        assert!(matches!(
            config.validate(),
            Err(BucketError::InvalidConfig(_))
        ));
    }
}
