use bitflags::bitflags;

bitflags! {
    /// Dump header flags byte.
    ///
    /// Bits above the defined range are rejected with
    /// [`Error::InvalidFlags`](crate::Error::InvalidFlags).
    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
    pub struct HeaderFlags: u8 {
        /// All multi-byte fields are big-endian.
        const BIG_ENDIAN = 1 << 0;
        /// Native integers are 8 bytes wide.
        const UINT64 = 1 << 1;
        /// Pointers are 8 bytes wide.
        const PTR64 = 1 << 2;
        /// Floats are wider than 8 bytes.
        const LONG_FLOAT = 1 << 3;
        /// The producer embeds pad constants at compile time (ithreads).
        const ITHREADS = 1 << 4;
    }
}

bitflags! {
    /// Scalar record flags.
    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
    pub struct ScalarFlags: u8 {
        /// The integer body is valid.
        const HAS_IV = 1 << 0;
        /// The integer body is unsigned.
        const IV_IS_UV = 1 << 1;
        /// The float body is valid.
        const HAS_NV = 1 << 2;
        /// The byte-string body is valid.
        const HAS_PV = 1 << 3;
        /// The byte-string body is UTF-8 encoded.
        const PV_UTF8 = 1 << 4;
    }
}

bitflags! {
    /// Array record flags.
    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
    pub struct ArrayFlags: u8 {
        /// The array does not hold reference counts on its elements.
        const UNREAL = 1 << 0;
    }
}

bitflags! {
    /// Code record flags.
    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
    pub struct CodeFlags: u8 {
        /// A closure prototype.
        const CLONE = 1 << 0;
        /// A closure cloned from a prototype.
        const CLONED = 1 << 1;
        /// Implemented by native code rather than bytecode.
        const XSUB = 1 << 2;
        /// The link to the enclosing scope does not count a reference.
        const WEAKOUTSIDE = 1 << 3;
        /// The link to the owning glob counts a reference.
        const CVGV_RC = 1 << 4;
    }
}
