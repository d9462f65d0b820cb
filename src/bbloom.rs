//! Bucket bloom filter engine.
//!
//! Each filter is a fixed table of one-byte slots. Bit 0 of a slot marks it
//! occupied, bits 1..7 carry the bucket id: the filter clock, truncated to
//! 7 bits, at the moment the slot was last written. The clock only moves
//! when the caller advances or sets it, and clearing a bucket zeroes every
//! slot stamped with that id.
pub mod config;
pub mod filter;
pub mod slot;
pub mod traits;

pub use config::{
    BucketFilterConfig, BucketFilterConfigBuilder, BucketFilterConfigBuilderError,
    DEFAULT_TABLE_SIZE,
};
pub use filter::{BucketFilter, FilterSnapshot};
pub use slot::{BUCKET_COUNT, Slot};
pub use traits::{BucketFilterOps, BucketFilterStats};
