use crate::ByteOrder;
use crate::DumpRead;
use crate::Error;
use crate::FloatSize;
use crate::HeaderFlags;
use crate::Layout;
use crate::WordSize;

pub(crate) const MAGIC: [u8; 4] = *b"PMAT";

/// The format major version this crate understands.
pub const FORMAT_VERSION_MAJOR: u8 = 0;
/// The newest format minor version this crate fully understands.
///
/// Newer minors are loaded best-effort; the per-type size table makes the
/// record layout self-describing.
pub const FORMAT_VERSION_MINOR: u8 = 4;

/// Version of the interpreter that produced a dump, packed as
/// `rev << 24 | ver << 16 | sub`.
///
/// Informational; comparisons gate a few decoding details.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct PerlVersion(u32);

impl PerlVersion {
    /// Pack a revision/version/subversion triple.
    pub const fn new(rev: u8, ver: u8, sub: u16) -> Self {
        Self((rev as u32) << 24 | (ver as u32) << 16 | sub as u32)
    }

    pub(crate) const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The revision component (`5` of `5.36.0`).
    pub const fn revision(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// The version component (`36` of `5.36.0`).
    pub const fn version(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// The subversion component (`0` of `5.36.0`).
    pub const fn subversion(self) -> u16 {
        self.0 as u16
    }
}

impl std::fmt::Display for PerlVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            self.revision(),
            self.version(),
            self.subversion()
        )
    }
}

/// One row of the per-type size table.
///
/// Describes how many bytes of type-specific header, how many trailing
/// pointers and how many trailing strings each record of that type carries.
/// The table is what keeps the format forward- and backward-compatible: a
/// newer producer may append fields this crate skips, an older one may omit
/// fields that then decode as absent.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct SvSizes {
    /// Bytes of type-specific header.
    pub header_len: u8,
    /// Number of trailing pointer fields.
    pub nptrs: u8,
    /// Number of trailing string fields.
    pub nstrs: u8,
}

/// Dump file header.
#[derive(Debug)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct Header {
    /// Byte order and field widths of the rest of the file.
    pub layout: Layout,
    /// Whether pad constants are embedded at compile time (ithreads).
    pub ithreads: bool,
    /// Format minor version found in the file.
    pub format_minor: u8,
    /// Version of the producer interpreter.
    pub perl_version: PerlVersion,
    /// Per-type size table, indexed by record tag minus one.
    pub sv_sizes: Vec<SvSizes>,
}

impl Header {
    /// Read the header from `reader`.
    pub fn read<R: DumpRead>(reader: &mut R) -> Result<Self, Error> {
        let mut magic = [0_u8; MAGIC.len()];
        reader.read_bytes(&mut magic[..]).map_err(|e| match e {
            Error::UnexpectedEof => Error::NotPmat,
            e => e,
        })?;
        if magic != MAGIC {
            return Err(Error::NotPmat);
        }
        let raw_flags = reader.read_u8()?;
        let flags = HeaderFlags::from_bits(raw_flags).ok_or(Error::InvalidFlags(raw_flags))?;
        let _reserved = reader.read_u8()?;
        let major = reader.read_u8()?;
        let minor = reader.read_u8()?;
        if major != FORMAT_VERSION_MAJOR {
            return Err(Error::UnsupportedVersion { major, minor });
        }
        if minor > FORMAT_VERSION_MINOR {
            log::warn!(
                "Dump has format version {}.{}, newer than the supported {}.{}; \
                 loading best-effort",
                major,
                minor,
                FORMAT_VERSION_MAJOR,
                FORMAT_VERSION_MINOR,
            );
        }
        let byte_order = if flags.contains(HeaderFlags::BIG_ENDIAN) {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        };
        let uint_size = if flags.contains(HeaderFlags::UINT64) {
            WordSize::Eight
        } else {
            WordSize::Four
        };
        let ptr_size = if flags.contains(HeaderFlags::PTR64) {
            WordSize::Eight
        } else {
            WordSize::Four
        };
        let perl_version = PerlVersion::from_raw(reader.read_u32(byte_order)?);
        let n_types = reader.read_u8()?;
        let mut sv_sizes = Vec::with_capacity(n_types as usize);
        for _ in 0..n_types {
            sv_sizes.push(SvSizes {
                header_len: reader.read_u8()?,
                nptrs: reader.read_u8()?,
                nstrs: reader.read_u8()?,
            });
        }
        let float_size = if flags.contains(HeaderFlags::LONG_FLOAT) {
            // The flag alone cannot distinguish 10-byte from 16-byte floats;
            // the SCALAR row of the size table is authoritative.
            match scalar_float_len(&sv_sizes, uint_size) {
                Some(16) => FloatSize::Sixteen,
                _ => FloatSize::Ten,
            }
        } else {
            FloatSize::Eight
        };
        Ok(Self {
            layout: Layout {
                byte_order,
                uint_size,
                ptr_size,
                float_size,
            },
            ithreads: flags.contains(HeaderFlags::ITHREADS),
            format_minor: minor,
            perl_version,
            sv_sizes,
        })
    }

    /// The size-table row for the record tag, if the table has one.
    pub fn sizes_of(&self, tag: u8) -> Option<SvSizes> {
        self.sv_sizes.get((tag as usize).checked_sub(1)?).copied()
    }
}

// The SCALAR header is flags byte + uint + float + uint; whatever remains
// after the fixed parts is the float width.
fn scalar_float_len(sv_sizes: &[SvSizes], uint_size: WordSize) -> Option<usize> {
    let scalar = sv_sizes.get(1)?;
    (scalar.header_len as usize).checked_sub(1 + 2 * uint_size.len())
}
