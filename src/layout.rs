use crate::ByteOrder;

/// Width of the producer interpreter's native integers and pointers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(test, derive(arbitrary::Arbitrary))]
#[repr(u8)]
pub enum WordSize {
    Four = 4,
    Eight = 8,
}

impl WordSize {
    /// The width in bytes.
    pub const fn len(self) -> usize {
        match self {
            Self::Four => 4,
            Self::Eight => 8,
        }
    }

    /// The all-ones value of this width.
    ///
    /// Used as the "absent" sentinel for string lengths.
    pub const fn sentinel(self) -> u64 {
        match self {
            Self::Four => u32::MAX as u64,
            Self::Eight => u64::MAX,
        }
    }
}

/// Width of the producer interpreter's floating-point values.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(test, derive(arbitrary::Arbitrary))]
#[repr(u8)]
pub enum FloatSize {
    /// IEEE 754 binary64.
    Eight = 8,
    /// x87 80-bit extended precision.
    Ten = 10,
    /// IEEE 754 binary128.
    Sixteen = 16,
}

impl FloatSize {
    /// The width in bytes.
    pub const fn len(self) -> usize {
        match self {
            Self::Eight => 8,
            Self::Ten => 10,
            Self::Sixteen => 16,
        }
    }
}

/// Byte order and field widths of a dump file.
///
/// Decoded from the header flags byte and threaded through every read.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(test, derive(arbitrary::Arbitrary))]
pub struct Layout {
    /// Byte order of all multi-byte fields.
    pub byte_order: ByteOrder,
    /// Width of native integer fields.
    pub uint_size: WordSize,
    /// Width of pointer fields.
    pub ptr_size: WordSize,
    /// Width of floating-point fields.
    pub float_size: FloatSize,
}

impl Layout {
    /// The layout of dumps produced on the host platform.
    pub const fn host() -> Self {
        Self {
            byte_order: ByteOrder::native(),
            uint_size: WordSize::Eight,
            ptr_size: WordSize::Eight,
            float_size: FloatSize::Eight,
        }
    }
}
