//! Time-bucketed Bloom filter ("bucket bloom filter") with an in-memory keyed
//! store, redb snapshots and an HTTP API.
//!
//! Answers "was this item seen, and in which time bucket" with one byte per
//! slot and a single hash function.
//!
//! HowTo:
//!    * Slots: a filter is a fixed table of `N` bytes. Bit 0 marks a slot as
//!      occupied, bits 1..7 hold the bucket id it was stamped with.
//!    * Clock: every filter carries its own counter. It never moves on its
//!      own; callers advance it or set it explicitly.
//!    * Bucket id: the clock truncated to 7 bits, so clock 5 and clock 133
//!      share bucket 5.
//!
//! Insertion:
//!     * The item is folded into a 64-bit word, mapped to a slot with
//!       `(a * x + b) mod N`, and the slot is overwritten with the current
//!       bucket id and the occupied flag.
//! Query:
//!     * An item is present if its slot is occupied.
//! Expiration:
//!     * Clearing a bucket scans the table and zeroes every slot stamped with
//!       that bucket id. Items from other buckets are untouched.
//!
//! Obvious problems:
//!     * False Positives: unrelated items sharing a slot answer for each
//!       other, and a later insert overwrites the earlier item's bucket.
//!     * Aliasing: bucket ids wrap every 128 clock values, so clearing one
//!       bucket clears all clock values congruent to it.
//!     * The default positional hash is weak; `HashKind::Murmur3` spreads
//!       items better at the cost of a different slot layout.

#[cfg(feature = "server")]
pub mod api;
pub mod bbloom;
pub mod commands;
mod error;
mod hash;
#[cfg(feature = "redb")]
pub mod persistence;
pub mod store;
#[cfg(feature = "server")]
pub mod types;

pub use bbloom::{
    BucketFilter, BucketFilterConfig, BucketFilterConfigBuilder,
    BucketFilterConfigBuilderError, BucketFilterOps, BucketFilterStats,
    FilterSnapshot, Slot,
};
pub use commands::{Command, FilterStats, Reply, execute, execute_args};
pub use error::{BucketError, Result};
pub use hash::{HashFunction, HashKind, murmur_fnv_hash, positional_hash};
#[cfg(feature = "redb")]
pub use persistence::RedbSnapshotStore;
pub use store::{FilterStore, KeyHandle, KeyType, KeyedStore, OpenMode, StoredValue};
#[cfg(feature = "server")]
pub use types::{
    AppState, ServerConfig, ServerConfigBuilder, ServerConfigBuilderError,
};
