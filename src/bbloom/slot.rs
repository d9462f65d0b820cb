/// Number of distinct bucket ids a slot can carry (7 bits).
pub const BUCKET_COUNT: u64 = 128;

const OCCUPIED: u8 = 0b0000_0001;

/// One packed table cell: bit 0 is the occupied flag, bits 1..7 the bucket
/// id. The all-zero byte means "never written or cleared".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Slot(u8);

impl Slot {
    pub const EMPTY: Slot = Slot(0);

    /// Occupied slot stamped with `clock mod 128`.
    #[inline]
    pub fn stamped(clock: u64) -> Self {
        Slot((Self::bucket_of(clock) << 1) | OCCUPIED)
    }

    /// Truncates a clock value or requested bucket to the 7-bit id a slot
    /// can hold. 5, 133 and 261 all map to 5.
    #[inline]
    pub fn bucket_of(value: u64) -> u8 {
        (value % BUCKET_COUNT) as u8
    }

    #[inline]
    pub fn is_occupied(self) -> bool {
        self.0 & OCCUPIED != 0
    }

    #[inline]
    pub fn bucket(self) -> u8 {
        self.0 >> 1
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether this slot would be zeroed by clearing `bucket`.
    #[inline]
    pub fn in_bucket(self, bucket: u8) -> bool {
        self.bucket() == bucket
    }

    #[inline]
    pub fn from_byte(byte: u8) -> Self {
        Slot(byte)
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self.0
    }
}
