use crate::error::Result;

/// Core operations of a bucket filter
pub trait BucketFilterOps {
    /// Stamp the item's slot with the current bucket. Overwrites whatever
    /// the slot held before.
    fn insert(&mut self, item: &[u8]);

    /// Check whether the item's slot is occupied
    fn contains(&self, item: &[u8]) -> bool;

    /// Move the clock one step forward and return the new value
    fn advance_time(&mut self) -> u64;

    /// Set the clock. Negative values are rejected.
    fn set_time(&mut self, time: i64) -> Result<()>;

    /// Zero every slot stamped with `bucket mod 128`
    fn clear_bucket(&mut self, bucket: i64) -> Result<usize>;
}

/// Statistics for bucket filter
pub trait BucketFilterStats {
    fn table_size(&self) -> usize;
    fn clock(&self) -> u64;
    fn occupied_slots(&self) -> usize;
    fn hash_params(&self) -> (u64, u64);
}
