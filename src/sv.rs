use std::collections::BTreeMap;

use crate::ArrayFlags;
use crate::CodeFlags;
use crate::DumpRead;
use crate::Error;
use crate::Header;
use crate::Layout;
use crate::PositionReader;
use crate::ScalarFlags;

/// A magic annotation attached to a value object.
///
/// Not an object itself; associates the owner with up to two target
/// addresses, keyed by a one-character type.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Magic {
    /// The one-character magic type.
    pub mtype: u8,
    /// Whether the object link counts a reference.
    pub refcounted: bool,
    /// Address of the associated object, zero if none.
    pub obj_at: u64,
    /// Address of the associated pointer target, zero if none.
    pub ptr_at: u64,
}

/// Which of the three immortal singletons a fabricated record stands for.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Immortal {
    Undef,
    Yes,
    No,
}

/// A named multi-slot container registered under a key in a stash.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Glob {
    /// Address of the stash the glob is registered in.
    pub stash_at: u64,
    /// The scalar slot.
    pub scalar_at: u64,
    /// The array slot.
    pub array_at: u64,
    /// The hash slot.
    pub hash_at: u64,
    /// The code slot.
    pub code_at: u64,
    /// The effective glob; equal to the own address unless aliased.
    pub egv_at: u64,
    /// The io slot.
    pub io_at: u64,
    /// The format slot.
    pub form_at: u64,
    /// Name of the glob within its stash.
    pub name: Option<Vec<u8>>,
    /// Source file that created the glob.
    pub file: Option<Vec<u8>>,
    /// Source line that created the glob.
    pub line: u64,
}

/// A plain value: any combination of integer, float and byte-string bodies.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Scalar {
    /// Which bodies are valid, and the UTF-8 bit.
    pub flags: ScalarFlags,
    /// The unsigned-integer body.
    pub uv: Option<u64>,
    /// The signed-integer body.
    pub iv: Option<i64>,
    /// The float body.
    pub nv: Option<f64>,
    /// The byte-string body.
    pub pv: Option<Vec<u8>>,
    /// Full length of the byte-string body in the producer; `pv` may have
    /// been truncated by the dumper.
    pub pvlen: u64,
    /// Stash of the `our` declaration, if any.
    pub ourstash_at: u64,
}

impl Scalar {
    /// Whether the byte-string body is UTF-8 encoded.
    pub fn pv_is_utf8(&self) -> bool {
        self.flags.contains(ScalarFlags::PV_UTF8)
    }

    /// The byte-string body quoted for human-readable output.
    pub fn quoted_pv(&self) -> Option<String> {
        self.pv.as_deref().map(quote_pv)
    }
}

/// A reference-holding value pointing at another object.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Ref {
    /// Address of the referrant.
    pub rv_at: u64,
    /// Whether the reference was weakened.
    pub weak: bool,
    /// Stash of the `our` declaration, if any.
    pub ourstash_at: u64,
}

/// Role of an array object; the pad roles are assigned during fixup and never
/// emitted by the producer.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ArrayRole {
    /// An ordinary array.
    #[default]
    Plain,
    /// The per-function lexical storage of a code object.
    Padlist,
    /// Element 0 of a padlist: the lexical-name table.
    Padnames,
    /// One per-depth pad of a padlist.
    Pad,
}

/// An ordered sequence of values.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Array {
    /// Wire flags.
    pub flags: ArrayFlags,
    /// Element addresses, zero for empty slots.
    pub elems_at: Vec<u64>,
    /// Synthetic subtype, assigned during fixup.
    pub role: ArrayRole,
    /// Address of the owning code object when the role is a pad role.
    pub padcv_at: u64,
    /// Whether the array is a hash's backrefs list; set during fixup.
    pub is_backrefs: bool,
}

impl Array {
    /// Whether elements hold reference counts.
    ///
    /// Producers that predate the explicit flag never set it; for those only
    /// backrefs arrays are known to be unreal.
    pub fn is_real(&self) -> bool {
        !self.flags.contains(ArrayFlags::UNREAL) && !self.is_backrefs
    }
}

/// An unordered mapping from unique byte-string keys to values.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Hash {
    /// Key to value-address map.
    pub values: BTreeMap<Vec<u8>, u64>,
    /// Address of the backrefs list or single backref, zero if none.
    pub backrefs_at: u64,
}

/// A hash used as a package symbol table.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Stash {
    /// The hash body.
    pub hash: Hash,
    /// The package name.
    pub name: Option<Vec<u8>>,
    /// MRO metadata: all linearizations.
    pub mro_linear_all_at: u64,
    /// MRO metadata: the current linearization.
    pub mro_linear_current_at: u64,
    /// MRO metadata: the `next::method` cache.
    pub mro_nextmethod_at: u64,
    /// MRO metadata: the ISA cache.
    pub mro_isa_at: u64,
}

/// A code object.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Code {
    /// Source line of the definition.
    pub line: u64,
    /// Wire flags.
    pub flags: CodeFlags,
    /// Nonzero when the body is implemented in bytecode.
    pub oproot: u64,
    /// The owning stash.
    pub stash_at: u64,
    /// The enclosing scope.
    pub outside_at: u64,
    /// The padlist array.
    pub padlist_at: u64,
    /// The constant value for constant subs.
    pub constval_at: u64,
    /// Source file of the definition.
    pub file: Option<Vec<u8>>,
    /// The lexical-name table; explicit on newer producers, derived from the
    /// padlist during fixup otherwise.
    pub padnames_at: u64,
    /// Per-depth pads, indexed by depth; index 0 is unused.
    pub pads_at: Vec<u64>,
    /// Embedded constants.
    pub constants_at: Vec<u64>,
    /// Referenced globs.
    pub globrefs_at: Vec<u64>,
    /// Pad indices of compile-time-embedded constants; drained during fixup.
    pub const_indices: Vec<u64>,
    /// Pad indices of compile-time-embedded globs; drained during fixup.
    pub globref_indices: Vec<u64>,
}

impl Code {
    /// Whether this is a closure prototype.
    pub fn is_clone(&self) -> bool {
        self.flags.contains(CodeFlags::CLONE)
    }

    /// Whether this closure was cloned from a prototype.
    pub fn is_cloned(&self) -> bool {
        self.flags.contains(CodeFlags::CLONED)
    }

    /// Whether the body is native code rather than bytecode.
    pub fn is_xsub(&self) -> bool {
        self.flags.contains(CodeFlags::XSUB)
    }
}

/// A filehandle object.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Io {
    /// The top-of-page format glob.
    pub topgv_at: u64,
    /// The format glob.
    pub fmtgv_at: u64,
    /// The bottom-of-page format glob.
    pub bottomgv_at: u64,
}

/// A deferred-assignment value.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Lvalue {
    /// The one-character lvalue subtype.
    pub lvtype: u8,
    /// Offset into the target.
    pub off: u64,
    /// Length within the target.
    pub len: u64,
    /// Address of the target object.
    pub targ_at: u64,
}

/// Variant-specific body of a value object.
#[derive(Clone, PartialEq, Debug)]
pub enum SvBody {
    Glob(Glob),
    Scalar(Scalar),
    Ref(Ref),
    Array(Array),
    Hash(Hash),
    Stash(Stash),
    Code(Code),
    Io(Io),
    Lvalue(Lvalue),
    /// Opaque; only the owned size is known.
    Regexp,
    /// Opaque; only the owned size is known.
    Format,
    /// Opaque; only the owned size is known.
    Invlist,
    /// A fabricated record for one of the three immortal singletons.
    Immortal(Immortal),
}

/// Kind of a value object, including the synthetic array subtypes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum SvKind {
    Glob,
    Scalar,
    Ref,
    Array,
    Padlist,
    Padnames,
    Pad,
    Hash,
    Stash,
    Code,
    Io,
    Lvalue,
    Regexp,
    Format,
    Invlist,
    Undef,
    Yes,
    No,
}

impl std::fmt::Display for SvKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Self::Glob => "GLOB",
            Self::Scalar => "SCALAR",
            Self::Ref => "REF",
            Self::Array => "ARRAY",
            Self::Padlist => "PADLIST",
            Self::Padnames => "PADNAMES",
            Self::Pad => "PAD",
            Self::Hash => "HASH",
            Self::Stash => "STASH",
            Self::Code => "CODE",
            Self::Io => "IO",
            Self::Lvalue => "LVALUE",
            Self::Regexp => "REGEXP",
            Self::Format => "FORMAT",
            Self::Invlist => "INVLIST",
            Self::Undef => "UNDEF",
            Self::Yes => "YES",
            Self::No => "NO",
        };
        write!(f, "{}", s)
    }
}

/// One value object of the dumped heap.
#[derive(Clone, PartialEq, Debug)]
pub struct Sv {
    /// The producer-side address; the object's identity.
    pub addr: u64,
    /// Reference count at dump time.
    pub refcnt: u32,
    /// Owned bytes at dump time.
    pub size: u64,
    /// Address of the blessing stash, zero if unblessed.
    pub blessed_at: u64,
    /// Address of the owning glob; propagated during fixup, zero if none.
    pub glob_at: u64,
    /// Magic annotations, in file order.
    pub magic: Vec<Magic>,
    /// The variant body.
    pub body: SvBody,
}

impl Sv {
    /// The object's kind, including synthetic array subtypes.
    pub fn kind(&self) -> SvKind {
        match &self.body {
            SvBody::Glob(_) => SvKind::Glob,
            SvBody::Scalar(_) => SvKind::Scalar,
            SvBody::Ref(_) => SvKind::Ref,
            SvBody::Array(a) => match a.role {
                ArrayRole::Plain => SvKind::Array,
                ArrayRole::Padlist => SvKind::Padlist,
                ArrayRole::Padnames => SvKind::Padnames,
                ArrayRole::Pad => SvKind::Pad,
            },
            SvBody::Hash(_) => SvKind::Hash,
            SvBody::Stash(_) => SvKind::Stash,
            SvBody::Code(_) => SvKind::Code,
            SvBody::Io(_) => SvKind::Io,
            SvBody::Lvalue(_) => SvKind::Lvalue,
            SvBody::Regexp => SvKind::Regexp,
            SvBody::Format => SvKind::Format,
            SvBody::Invlist => SvKind::Invlist,
            SvBody::Immortal(Immortal::Undef) => SvKind::Undef,
            SvBody::Immortal(Immortal::Yes) => SvKind::Yes,
            SvBody::Immortal(Immortal::No) => SvKind::No,
        }
    }

    /// Whether this is one of the three immortal singletons.
    pub fn is_immortal(&self) -> bool {
        matches!(self.body, SvBody::Immortal(_))
    }

    /// The reference count with the producer's artificial extra on backrefs
    /// arrays subtracted.
    pub fn refcnt_adjusted(&self) -> u32 {
        match &self.body {
            SvBody::Array(a) if a.is_backrefs => self.refcnt.saturating_sub(1),
            _ => self.refcnt,
        }
    }

    /// Owned bytes plus an approximation of the in-memory body tables.
    pub fn structure_size(&self) -> u64 {
        let extra = match &self.body {
            SvBody::Array(a) => 8 * a.elems_at.len() as u64,
            SvBody::Hash(h) => hash_overhead(h),
            SvBody::Stash(s) => hash_overhead(&s.hash),
            SvBody::Code(c) => {
                8 * (c.constants_at.len() + c.globrefs_at.len() + c.pads_at.len()) as u64
            }
            _ => 0,
        };
        self.size + extra
    }

    /// The glob body, if this is a glob.
    pub fn as_glob(&self) -> Option<&Glob> {
        match &self.body {
            SvBody::Glob(g) => Some(g),
            _ => None,
        }
    }

    /// The scalar body, if this is a scalar.
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.body {
            SvBody::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// The reference body, if this is a reference.
    pub fn as_ref_sv(&self) -> Option<&Ref> {
        match &self.body {
            SvBody::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// The array body, if this is an array of any role.
    pub fn as_array(&self) -> Option<&Array> {
        match &self.body {
            SvBody::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The hash body; stashes expose their composed hash.
    pub fn as_hash(&self) -> Option<&Hash> {
        match &self.body {
            SvBody::Hash(h) => Some(h),
            SvBody::Stash(s) => Some(&s.hash),
            _ => None,
        }
    }

    /// The stash body, if this is a stash.
    pub fn as_stash(&self) -> Option<&Stash> {
        match &self.body {
            SvBody::Stash(s) => Some(s),
            _ => None,
        }
    }

    /// The code body, if this is a code object.
    pub fn as_code(&self) -> Option<&Code> {
        match &self.body {
            SvBody::Code(c) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn fabricate_immortal(addr: u64, which: Immortal) -> Self {
        Self {
            addr,
            refcnt: 0,
            size: 0,
            blessed_at: 0,
            glob_at: 0,
            magic: Vec::new(),
            body: SvBody::Immortal(which),
        }
    }

    /// Read one heap record of type `tag`, driven by the header's size table.
    pub(crate) fn read_record<R: std::io::Read>(
        reader: &mut PositionReader<R>,
        tag: u8,
        header: &Header,
    ) -> Result<Self, Error> {
        let layout = header.layout;
        let sizes = header.sizes_of(tag).ok_or(Error::UnknownTag {
            tag,
            position: reader.position().saturating_sub(1),
        })?;
        let mut hdr = vec![0_u8; sizes.header_len as usize];
        reader.read_bytes(&mut hdr[..])?;
        let addr = reader.read_ptr(layout)?;
        let refcnt = reader.read_u32(layout.byte_order)?;
        let size = reader.read_uint(layout)?;
        let blessed_at = reader.read_ptr(layout)?;
        let ptrs = reader.read_ptrs(layout, sizes.nptrs as usize)?;
        let mut strs = Vec::with_capacity(sizes.nstrs as usize);
        for _ in 0..sizes.nstrs {
            strs.push(reader.read_str(layout)?);
        }
        let mut fields = Fields::new(&hdr, layout);
        let mut glob_at = 0;
        let body = match tag {
            tags::GLOB => SvBody::Glob(Glob {
                line: fields.uint().unwrap_or(0),
                stash_at: ptr(&ptrs, 0),
                scalar_at: ptr(&ptrs, 1),
                array_at: ptr(&ptrs, 2),
                hash_at: ptr(&ptrs, 3),
                code_at: ptr(&ptrs, 4),
                egv_at: ptr(&ptrs, 5),
                io_at: ptr(&ptrs, 6),
                form_at: ptr(&ptrs, 7),
                name: string(&mut strs, 0),
                file: string(&mut strs, 1),
            }),
            tags::SCALAR => {
                let flags = ScalarFlags::from_bits_truncate(fields.u8().unwrap_or(0));
                let raw_uv = fields.uint().unwrap_or(0);
                let nv = fields.nv().unwrap_or(0.0);
                let pvlen = fields.uint().unwrap_or(0);
                SvBody::Scalar(Scalar {
                    flags,
                    uv: (flags.contains(ScalarFlags::HAS_IV)
                        && flags.contains(ScalarFlags::IV_IS_UV))
                    .then_some(raw_uv),
                    iv: (flags.contains(ScalarFlags::HAS_IV)
                        && !flags.contains(ScalarFlags::IV_IS_UV))
                    .then_some(raw_uv as i64),
                    nv: flags.contains(ScalarFlags::HAS_NV).then_some(nv),
                    pv: string(&mut strs, 0),
                    pvlen,
                    ourstash_at: ptr(&ptrs, 0),
                })
            }
            tags::REF => SvBody::Ref(Ref {
                weak: fields.u8().unwrap_or(0) & 0x01 != 0,
                rv_at: ptr(&ptrs, 0),
                ourstash_at: ptr(&ptrs, 1),
            }),
            tags::ARRAY => {
                let n = fields.uint().unwrap_or(0);
                let flags = ArrayFlags::from_bits_truncate(fields.u8().unwrap_or(0));
                let elems_at = reader.read_ptrs(layout, n as usize)?;
                SvBody::Array(Array {
                    flags,
                    elems_at,
                    role: ArrayRole::Plain,
                    padcv_at: 0,
                    is_backrefs: false,
                })
            }
            tags::HASH => {
                let n = fields.uint().unwrap_or(0);
                SvBody::Hash(read_hash_body(reader, layout, n, ptr(&ptrs, 0))?)
            }
            tags::STASH => {
                let n = fields.uint().unwrap_or(0);
                let hash = read_hash_body(reader, layout, n, ptr(&ptrs, 0))?;
                SvBody::Stash(Stash {
                    hash,
                    name: string(&mut strs, 0),
                    mro_linear_all_at: ptr(&ptrs, 1),
                    mro_linear_current_at: ptr(&ptrs, 2),
                    mro_nextmethod_at: ptr(&ptrs, 3),
                    mro_isa_at: ptr(&ptrs, 4),
                })
            }
            tags::CODE => {
                glob_at = ptr(&ptrs, 1);
                let mut code = Code {
                    line: fields.uint().unwrap_or(0),
                    flags: CodeFlags::from_bits_truncate(fields.u8().unwrap_or(0)),
                    oproot: fields.ptr().unwrap_or(0),
                    stash_at: ptr(&ptrs, 0),
                    outside_at: ptr(&ptrs, 2),
                    padlist_at: ptr(&ptrs, 3),
                    constval_at: ptr(&ptrs, 4),
                    file: string(&mut strs, 0),
                    ..Code::default()
                };
                read_code_extras(reader, layout, &mut code)?;
                SvBody::Code(code)
            }
            tags::IO => SvBody::Io(Io {
                topgv_at: ptr(&ptrs, 0),
                fmtgv_at: ptr(&ptrs, 1),
                bottomgv_at: ptr(&ptrs, 2),
            }),
            tags::LVALUE => SvBody::Lvalue(Lvalue {
                lvtype: fields.u8().unwrap_or(0),
                off: fields.uint().unwrap_or(0),
                len: fields.uint().unwrap_or(0),
                targ_at: ptr(&ptrs, 0),
            }),
            tags::REGEXP => SvBody::Regexp,
            tags::FORMAT => SvBody::Format,
            tags::INVLIST => SvBody::Invlist,
            _ => {
                return Err(Error::UnknownTag {
                    tag,
                    position: reader.position().saturating_sub(1),
                })
            }
        };
        Ok(Self {
            addr,
            refcnt,
            size,
            blessed_at,
            glob_at,
            magic: Vec::new(),
            body,
        })
    }
}

/// Record tags of the heap body.
pub(crate) mod tags {
    pub const GLOB: u8 = 1;
    pub const SCALAR: u8 = 2;
    pub const REF: u8 = 3;
    pub const ARRAY: u8 = 4;
    pub const HASH: u8 = 5;
    pub const STASH: u8 = 6;
    pub const CODE: u8 = 7;
    pub const IO: u8 = 8;
    pub const LVALUE: u8 = 9;
    pub const REGEXP: u8 = 10;
    pub const FORMAT: u8 = 11;
    pub const INVLIST: u8 = 12;
    pub const MAGIC: u8 = 0x80;
}

/// Sub-record tags inside a code record.
pub(crate) mod code_tags {
    pub const CONSTSV: u8 = 1;
    pub const CONSTIX: u8 = 2;
    pub const GVSV: u8 = 3;
    pub const GVIX: u8 = 4;
    pub const LEGACY_PADNAME: u8 = 5;
    pub const LEGACY_PADSV: u8 = 6;
    pub const PADNAMES: u8 = 7;
    pub const PAD: u8 = 8;
}

fn read_code_extras<R: std::io::Read>(
    reader: &mut PositionReader<R>,
    layout: Layout,
    code: &mut Code,
) -> Result<(), Error> {
    loop {
        let tag = reader.read_u8()?;
        match tag {
            0 => return Ok(()),
            code_tags::CONSTSV => code.constants_at.push(reader.read_ptr(layout)?),
            code_tags::CONSTIX => code.const_indices.push(reader.read_uint(layout)?),
            code_tags::GVSV => code.globrefs_at.push(reader.read_ptr(layout)?),
            code_tags::GVIX => code.globref_indices.push(reader.read_uint(layout)?),
            code_tags::LEGACY_PADNAME => {
                let _ = reader.read_uint(layout)?;
                let _ = reader.read_str(layout)?;
            }
            code_tags::LEGACY_PADSV => {
                let _ = reader.read_uint(layout)?;
                let _ = reader.read_uint(layout)?;
                let _ = reader.read_ptr(layout)?;
            }
            code_tags::PADNAMES => code.padnames_at = reader.read_ptr(layout)?,
            code_tags::PAD => {
                let depth = reader.read_uint(layout)? as usize;
                let pad = reader.read_ptr(layout)?;
                if code.pads_at.len() <= depth {
                    code.pads_at.resize(depth + 1, 0);
                }
                code.pads_at[depth] = pad;
            }
            tag => {
                return Err(Error::UnknownTag {
                    tag,
                    position: reader.position().saturating_sub(1),
                })
            }
        }
    }
}

fn read_hash_body<R: std::io::Read>(
    reader: &mut PositionReader<R>,
    layout: Layout,
    n: u64,
    backrefs_at: u64,
) -> Result<Hash, Error> {
    let mut values = BTreeMap::new();
    for _ in 0..n {
        let key = reader.read_str(layout)?.unwrap_or_default();
        let value = reader.read_ptr(layout)?;
        values.insert(key, value);
    }
    Ok(Hash {
        values,
        backrefs_at,
    })
}

fn hash_overhead(hash: &Hash) -> u64 {
    hash.values.keys().map(|k| k.len() as u64 + 16).sum()
}

fn ptr(ptrs: &[u64], index: usize) -> u64 {
    ptrs.get(index).copied().unwrap_or(0)
}

fn string(strs: &mut [Option<Vec<u8>>], index: usize) -> Option<Vec<u8>> {
    strs.get_mut(index).and_then(Option::take)
}

// Cursor over the type-specific header buffer. Fields past the end of the
// buffer decode as absent, extra trailing bytes are ignored; this is what
// tolerates older and newer producers.
struct Fields<'a> {
    buf: &'a [u8],
    layout: Layout,
}

impl<'a> Fields<'a> {
    fn new(buf: &'a [u8], layout: Layout) -> Self {
        Self { buf, layout }
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.buf.len() < n {
            self.buf = &[];
            return None;
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Some(head)
    }

    fn u8(&mut self) -> Option<u8> {
        Some(self.take(1)?[0])
    }

    fn uint(&mut self) -> Option<u64> {
        let layout = self.layout;
        let mut bytes = self.take(layout.uint_size.len())?;
        bytes.read_uint(layout).ok()
    }

    fn ptr(&mut self) -> Option<u64> {
        let layout = self.layout;
        let mut bytes = self.take(layout.ptr_size.len())?;
        bytes.read_ptr(layout).ok()
    }

    fn nv(&mut self) -> Option<f64> {
        let layout = self.layout;
        let mut bytes = self.take(layout.float_size.len())?;
        bytes.read_nv(layout).ok()
    }
}

/// Quote a byte string for human-readable output.
///
/// Printable strings are single-quoted with `\` escapes; anything else is
/// double-quoted with control bytes as `\xNN`.
pub fn quote_pv(bytes: &[u8]) -> String {
    let printable = bytes.iter().all(|b| (0x20..0x7f).contains(b));
    if printable {
        let mut out = String::with_capacity(bytes.len() + 2);
        out.push('\'');
        for &b in bytes {
            if b == b'\'' || b == b'\\' {
                out.push('\\');
            }
            out.push(b as char);
        }
        out.push('\'');
        out
    } else {
        use std::fmt::Write;
        let mut out = String::with_capacity(bytes.len() + 2);
        out.push('"');
        for &b in bytes {
            match b {
                b'"' | b'\\' => {
                    out.push('\\');
                    out.push(b as char);
                }
                b'\n' => out.push_str("\\n"),
                b'\t' => out.push_str("\\t"),
                b'\r' => out.push_str("\\r"),
                0x20..=0x7e => out.push(b as char),
                _ => {
                    let _ = write!(&mut out, "\\x{:02x}", b);
                }
            }
        }
        out.push('"');
        out
    }
}
