use bincode::{Decode, Encode};
use fnv::FnvHasher;
use murmur3::murmur3_32;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use std::io::Cursor;

/// Width of the accumulator word the positional fold wraps around.
const WORD_BITS: usize = u64::BITS as usize;

/// A type alias for the function that maps an item onto a table slot.
///
/// **Parameters:**
///
/// - `item: &[u8]`
///   - A byte slice representing the item to be hashed.
/// - `hash_a: u64`
///   - Multiplier applied to the folded item.
/// - `hash_b: u64`
///   - Additive offset applied after the multiplier.
/// - `table_size: usize`
///   - Number of slots in the table. Must be greater than zero.
///
/// **Returns:**
///
/// - `usize`
///   - Slot index in `[0, table_size)`.
pub type HashFunction = fn(&[u8], u64, u64, usize) -> usize;

/// Which fingerprint function addresses a filter's table.
///
/// `Positional` is the default and keeps the classic slot layout, so tables
/// written by earlier deployments stay readable. `Murmur3` spreads items far
/// better but places them at different slots, so tables written with one
/// kind cannot be read with the other.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode,
)]
pub enum HashKind {
    #[default]
    Positional,
    Murmur3,
}

impl HashKind {
    pub fn function(self) -> HashFunction {
        match self {
            HashKind::Positional => positional_hash,
            HashKind::Murmur3 => murmur_fnv_hash,
        }
    }

    pub fn index(
        self,
        item: &[u8],
        hash_a: u64,
        hash_b: u64,
        table_size: usize,
    ) -> usize {
        (self.function())(item, hash_a, hash_b, table_size)
    }
}

impl std::str::FromStr for HashKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "positional" => Ok(HashKind::Positional),
            "murmur3" => Ok(HashKind::Murmur3),
            other => Err(format!("unknown hash kind '{other}'")),
        }
    }
}

/// Folds the item into one 64-bit word: byte `i` lands at bit offset
/// `8 * i mod 64`, so bytes eight positions apart share a lane.
pub(crate) fn fold_positional(item: &[u8]) -> u64 {
    item.iter().enumerate().fold(0u64, |acc, (i, &byte)| {
        acc.wrapping_add((byte as u64) << ((i * 8) % WORD_BITS))
    })
}

pub(crate) fn hash_murmur32(key: &[u8]) -> u32 {
    let mut cursor = Cursor::new(key);
    murmur3_32(&mut cursor, 0).expect("Failed to compute Murmur3 hash")
}

pub(crate) fn hash_fnv32(key: &[u8]) -> u32 {
    let mut hasher = FnvHasher::default();
    hasher.write(key);
    hasher.finish() as u32
}

#[inline]
fn reduce(x: u64, hash_a: u64, hash_b: u64, table_size: usize) -> usize {
    (hash_a.wrapping_mul(x).wrapping_add(hash_b) % table_size as u64) as usize
}

/// `(a * fold(item) + b) mod table_size` with wrapping arithmetic.
pub fn positional_hash(
    item: &[u8],
    hash_a: u64,
    hash_b: u64,
    table_size: usize,
) -> usize {
    reduce(fold_positional(item), hash_a, hash_b, table_size)
}

pub fn murmur_fnv_hash(
    item: &[u8],
    hash_a: u64,
    hash_b: u64,
    table_size: usize,
) -> usize {
    let x = ((hash_murmur32(item) as u64) << 32) | hash_fnv32(item) as u64;
    reduce(x, hash_a, hash_b, table_size)
}
