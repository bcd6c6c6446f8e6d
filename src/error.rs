use thiserror::Error;

/// All errors produced by this crate.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not a PMAT file")]
    NotPmat,
    #[error("Unexpected end of file")]
    UnexpectedEof,
    #[error("Invalid header flags: {0:#04x}")]
    InvalidFlags(u8),
    #[error("Unsupported format version {major}.{minor}")]
    UnsupportedVersion {
        /// Format major version found in the file.
        major: u8,
        /// Format minor version found in the file.
        minor: u8,
    },
    #[error("Unknown record tag {tag:#04x} at byte {position:#x}")]
    UnknownTag {
        /// The tag byte that was read.
        tag: u8,
        /// Offset of the tag byte from the start of the file.
        position: u64,
    },
    #[error("No symbol {symbol:?}: at {segment:?} expected {expected}, found {found}")]
    NoSuchSymbol {
        /// The symbol that was looked up.
        symbol: String,
        /// The path segment at which the walk failed.
        segment: String,
        /// What the walk needed to find there.
        expected: &'static str,
        /// What it found instead.
        found: String,
    },
    #[error("No object at address {0:#x}")]
    NoSuchAddress(u64),
    #[error("Input/output error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<std::io::ErrorKind> for Error {
    fn from(other: std::io::ErrorKind) -> Self {
        Self::Io(other.into())
    }
}
