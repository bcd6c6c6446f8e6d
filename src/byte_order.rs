/// Byte order of all multi-byte fields in a dump file.
///
/// Decoded from bit 0 of the header flags byte.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(test, derive(arbitrary::Arbitrary))]
#[repr(u8)]
pub enum ByteOrder {
    LittleEndian = 0,
    BigEndian = 1,
}

impl ByteOrder {
    /// Byte order of the machine that runs the analysis.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::BigEndian
        } else {
            Self::LittleEndian
        }
    }
}
