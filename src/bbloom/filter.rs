use crate::bbloom::config::BucketFilterConfig;
use crate::bbloom::slot::Slot;
use crate::bbloom::traits::{BucketFilterOps, BucketFilterStats};
use crate::error::{BucketError, Result};
use crate::hash::HashKind;
use bincode::{Decode, Encode};
use std::fmt;
use tracing::{debug, info, trace};

/// Persisted layout of one filter: the table bytes verbatim plus everything
/// needed to address them again.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct FilterSnapshot {
    pub table_size: u64,
    pub hash_a: u64,
    pub hash_b: u64,
    pub hash_kind: HashKind,
    pub clock: u64,
    pub table: Vec<u8>,
}

pub struct BucketFilter {
    config: BucketFilterConfig,
    table: Vec<Slot>,
    clock: u64,
}

impl BucketFilter {
    /// Allocates a zeroed table. Either the whole table is reserved or an
    /// `AllocationFailure` is returned and nothing is kept.
    pub fn new(config: BucketFilterConfig) -> Result<Self> {
        config.validate()?;

        let mut table = Vec::new();
        table
            .try_reserve_exact(config.table_size)
            .map_err(|_| BucketError::AllocationFailure {
                size: config.table_size,
            })?;
        table.resize(config.table_size, Slot::EMPTY);

        debug!(
            table_size = config.table_size,
            hash_a = config.hash_a,
            hash_b = config.hash_b,
            "created bucket filter"
        );

        Ok(Self {
            config,
            table,
            clock: 0,
        })
    }

    pub fn config(&self) -> &BucketFilterConfig {
        &self.config
    }

    /// Slot index an item is addressed to.
    pub fn slot_index(&self, item: &[u8]) -> usize {
        let idx = self.config.hash_kind.index(
            item,
            self.config.hash_a,
            self.config.hash_b,
            self.table.len(),
        );
        trace!(index = idx, "hashed item");
        idx
    }

    pub fn slot_at(&self, index: usize) -> Option<Slot> {
        self.table.get(index).copied()
    }

    /// Human readable clock, e.g. `current time: 5`.
    pub fn info(&self) -> String {
        format!("current time: {}", self.clock)
    }

    /// Releases the table. Called by the owning store when the key is
    /// deleted.
    pub fn free(self) {
        debug!(table_size = self.table.len(), "freeing bucket filter");
        drop(self);
    }

    pub fn snapshot(&self) -> FilterSnapshot {
        FilterSnapshot {
            table_size: self.table.len() as u64,
            hash_a: self.config.hash_a,
            hash_b: self.config.hash_b,
            hash_kind: self.config.hash_kind,
            clock: self.clock,
            table: self.table.iter().map(|slot| slot.to_byte()).collect(),
        }
    }

    pub fn from_snapshot(snapshot: FilterSnapshot) -> Result<Self> {
        let table_size = usize::try_from(snapshot.table_size).map_err(|_| {
            BucketError::SerializationError(format!(
                "table size {} does not fit this platform",
                snapshot.table_size
            ))
        })?;
        if snapshot.table.len() != table_size {
            return Err(BucketError::SerializationError(format!(
                "table holds {} slots, header declares {}",
                snapshot.table.len(),
                table_size
            )));
        }
        // A stamped slot always carries the occupied bit
        if let Some(pos) = snapshot.table.iter().position(|&b| b != 0 && b & 1 == 0)
        {
            return Err(BucketError::SerializationError(format!(
                "slot {pos} holds a bucket id without the occupied flag"
            )));
        }

        let config = BucketFilterConfig {
            table_size,
            hash_a: snapshot.hash_a,
            hash_b: snapshot.hash_b,
            hash_kind: snapshot.hash_kind,
        };
        config.validate()?;

        Ok(Self {
            config,
            table: snapshot.table.into_iter().map(Slot::from_byte).collect(),
            clock: snapshot.clock,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::encode_to_vec(
            self.snapshot(),
            bincode::config::standard(),
        )?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (snapshot, _): (FilterSnapshot, usize) =
            bincode::decode_from_slice(bytes, bincode::config::standard())?;
        Self::from_snapshot(snapshot)
    }
}

impl fmt::Debug for BucketFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketFilter")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl BucketFilterOps for BucketFilter {
    fn insert(&mut self, item: &[u8]) {
        let idx = self.slot_index(item);
        self.table[idx] = Slot::stamped(self.clock);
    }

    fn contains(&self, item: &[u8]) -> bool {
        self.table[self.slot_index(item)].is_occupied()
    }

    fn advance_time(&mut self) -> u64 {
        self.clock = self.clock.wrapping_add(1);
        debug!(clock = self.clock, "advanced clock");
        self.clock
    }

    fn set_time(&mut self, time: i64) -> Result<()> {
        let time = u64::try_from(time).map_err(|_| {
            BucketError::InvalidArgument(format!(
                "time must be non-negative, got {time}"
            ))
        })?;
        self.clock = time;
        debug!(clock = self.clock, "set clock");
        Ok(())
    }

    fn clear_bucket(&mut self, bucket: i64) -> Result<usize> {
        let bucket = u64::try_from(bucket).map_err(|_| {
            BucketError::InvalidArgument(format!(
                "bucket must be non-negative, got {bucket}"
            ))
        })?;
        let target = Slot::bucket_of(bucket);

        let mut cleared = 0;
        for slot in self.table.iter_mut() {
            if slot.is_occupied() && slot.in_bucket(target) {
                *slot = Slot::EMPTY;
                cleared += 1;
            }
        }

        info!(bucket, target, cleared, "cleared bucket");
        Ok(cleared)
    }
}

impl BucketFilterStats for BucketFilter {
    fn table_size(&self) -> usize {
        self.table.len()
    }

    fn clock(&self) -> u64 {
        self.clock
    }

    fn occupied_slots(&self) -> usize {
        self.table.iter().filter(|slot| slot.is_occupied()).count()
    }

    fn hash_params(&self) -> (u64, u64) {
        (self.config.hash_a, self.config.hash_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbloom::config::BucketFilterConfigBuilder;
    use rand::Rng;

    fn small_filter(table_size: usize) -> BucketFilter {
        let config = BucketFilterConfigBuilder::default()
            .table_size(table_size)
            .build()
            .expect("Unable to build BucketFilterConfig");
        BucketFilter::new(config).expect("Failed to create BucketFilter")
    }

    #[test]
    fn test_new_filter_is_zeroed() {
        let filter = small_filter(64);
        assert_eq!(filter.table_size(), 64);
        assert_eq!(filter.clock(), 0);
        assert_eq!(filter.occupied_slots(), 0);
        assert!((0..64).all(|i| filter.slot_at(i) == Some(Slot::EMPTY)));
        assert_eq!(filter.slot_at(64), None);
    }

    #[test]
    fn test_zero_size_rejected() {
        let config = BucketFilterConfig {
            table_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            BucketFilter::new(config),
            Err(BucketError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_huge_table_reports_allocation_failure() {
        let config = BucketFilterConfig {
            table_size: usize::MAX,
            ..Default::default()
        };
        assert!(matches!(
            BucketFilter::new(config),
            Err(BucketError::AllocationFailure { size: usize::MAX })
        ));
    }

    #[test]
    fn test_insert_stamps_current_bucket() {
        let mut filter = small_filter(1000);
        filter.set_time(5).unwrap();
        filter.insert(b"apple");

        let slot = filter.slot_at(filter.slot_index(b"apple")).unwrap();
        assert!(slot.is_occupied());
        assert_eq!(slot.bucket(), 5);
    }

    #[test]
    fn test_insert_overwrites_previous_stamp() {
        let mut filter = small_filter(1000);
        filter.insert(b"apple");
        filter.set_time(9).unwrap();
        filter.insert(b"apple");

        let slot = filter.slot_at(filter.slot_index(b"apple")).unwrap();
        assert_eq!(slot.bucket(), 9);
        assert_eq!(filter.occupied_slots(), 1);
    }

    #[test]
    fn test_advance_time_wraps_full_clock() {
        let mut filter = small_filter(8);
        filter.clock = u64::MAX;
        assert_eq!(filter.advance_time(), 0);
    }

    #[test]
    fn test_negative_arguments_rejected_without_mutation() {
        let mut filter = small_filter(100);
        filter.set_time(3).unwrap();
        filter.insert(b"x");

        assert!(matches!(
            filter.set_time(-1),
            Err(BucketError::InvalidArgument(_))
        ));
        assert!(matches!(
            filter.clear_bucket(-3),
            Err(BucketError::InvalidArgument(_))
        ));
        assert_eq!(filter.clock(), 3);
        assert!(filter.contains(b"x"));
    }

    #[test]
    fn test_clear_bucket_counts_and_aliases() {
        let mut filter = small_filter(1_000_000);
        filter.set_time(133).unwrap();
        filter.insert(b"old");
        filter.set_time(6).unwrap();
        filter.insert(b"new");

        assert_eq!(filter.clear_bucket(5).unwrap(), 1);
        assert!(!filter.contains(b"old"));
        assert!(filter.contains(b"new"));
    }

    #[test]
    fn test_bucket_zero_clear_leaves_empty_slots_alone() {
        let mut filter = small_filter(1000);
        filter.insert(b"at_zero");
        assert_eq!(filter.clear_bucket(0).unwrap(), 1);
        assert_eq!(filter.occupied_slots(), 0);
    }

    #[test]
    fn test_random_inserts_are_always_found() {
        let mut rng = rand::rng();
        let mut filter = small_filter(10_000);
        for _ in 0..500 {
            let len = rng.random_range(0..32);
            let item: Vec<u8> = (0..len).map(|_| rng.random()).collect();
            filter.set_time(rng.random_range(0..1_000)).unwrap();
            filter.insert(&item);
            assert!(filter.contains(&item));
        }
    }

    #[test]
    fn test_snapshot_roundtrip_preserves_state() {
        let mut filter = small_filter(512);
        filter.set_time(200).unwrap();
        filter.insert(b"a");
        filter.insert(b"b");

        let bytes = filter.to_bytes().unwrap();
        let restored = BucketFilter::from_bytes(&bytes).unwrap();

        assert_eq!(restored.snapshot(), filter.snapshot());
        assert_eq!(restored.clock(), 200);
        assert!(restored.contains(b"a"));
        assert_eq!(restored.info(), "current time: 200");
    }

    #[test]
    fn test_snapshot_with_wrong_length_rejected() {
        let mut snapshot = small_filter(16).snapshot();
        snapshot.table.pop();
        assert!(matches!(
            BucketFilter::from_snapshot(snapshot),
            Err(BucketError::SerializationError(_))
        ));
    }

    #[test]
    fn test_snapshot_with_unflagged_slot_rejected() {
        let mut snapshot = small_filter(16).snapshot();
        snapshot.table[3] = 0b0000_0100;
        assert!(matches!(
            BucketFilter::from_snapshot(snapshot),
            Err(BucketError::SerializationError(_))
        ));
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(BucketFilter::from_bytes(&[0xff, 0xff, 0xff]).is_err());
    }
}
