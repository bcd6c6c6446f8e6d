#![allow(missing_docs)]

use crate::sv::code_tags;
use crate::sv::tags;
use crate::ArrayFlags;
use crate::ByteOrder;
use crate::Code;
use crate::FloatSize;
use crate::Glob;
use crate::Layout;
use crate::Magic;
use crate::PerlVersion;
use crate::Ref;
use crate::Scalar;
use crate::ScalarFlags;
use crate::WordSize;

// Assembles bit-exact dump streams for the loader tests. Only the analysis
// side ships; writing dumps is a test concern.
pub struct DumpBuilder {
    pub layout: Layout,
    pub ithreads: bool,
    pub format_minor: u8,
    pub perl_version: PerlVersion,
    pub undef_at: u64,
    pub yes_at: u64,
    pub no_at: u64,
    roots: Vec<(String, u64)>,
    stack: Vec<u64>,
    heap: Vec<u8>,
    contexts: Vec<u8>,
    size_overrides: Vec<(u8, (u8, u8, u8))>,
}

pub const UNDEF_AT: u64 = 0x100;
pub const YES_AT: u64 = 0x108;
pub const NO_AT: u64 = 0x110;

impl DumpBuilder {
    pub fn new() -> Self {
        Self::with_layout(Layout::host())
    }

    pub fn with_layout(layout: Layout) -> Self {
        Self {
            layout,
            ithreads: false,
            format_minor: crate::FORMAT_VERSION_MINOR,
            perl_version: PerlVersion::new(5, 36, 0),
            undef_at: UNDEF_AT,
            yes_at: YES_AT,
            no_at: NO_AT,
            roots: Vec::new(),
            stack: Vec::new(),
            heap: Vec::new(),
            contexts: Vec::new(),
            size_overrides: Vec::new(),
        }
    }

    /// Pretend the producer used a different record layout for `tag`;
    /// records must then be pushed with matching raw parts.
    pub fn override_size(&mut self, tag: u8, row: (u8, u8, u8)) -> &mut Self {
        self.size_overrides.push((tag, row));
        self
    }

    pub fn root(&mut self, name: &str, addr: u64) -> &mut Self {
        self.roots.push((name.to_string(), addr));
        self
    }

    pub fn stack(&mut self, addrs: &[u64]) -> &mut Self {
        self.stack.extend_from_slice(addrs);
        self
    }

    pub fn glob(&mut self, addr: u64, glob: &Glob) -> &mut Self {
        let mut hdr = Vec::new();
        self.w_uint(&mut hdr, glob.line);
        let ptrs = [
            glob.stash_at,
            glob.scalar_at,
            glob.array_at,
            glob.hash_at,
            glob.code_at,
            glob.egv_at,
            glob.io_at,
            glob.form_at,
        ];
        let strs = [glob.name.as_deref(), glob.file.as_deref()];
        self.push_sv(tags::GLOB, addr, 1, 160, 0, &hdr, &ptrs, &strs, &[]);
        self
    }

    pub fn scalar(&mut self, addr: u64, scalar: &Scalar) -> &mut Self {
        self.scalar_blessed(addr, scalar, 0)
    }

    pub fn scalar_blessed(&mut self, addr: u64, scalar: &Scalar, blessed_at: u64) -> &mut Self {
        let mut hdr = Vec::new();
        hdr.push(scalar.flags.bits());
        let raw_uv = scalar
            .uv
            .or(scalar.iv.map(|iv| iv as u64))
            .unwrap_or_default();
        self.w_uint(&mut hdr, raw_uv);
        self.w_nv(&mut hdr, scalar.nv.unwrap_or_default());
        self.w_uint(&mut hdr, scalar.pvlen);
        let ptrs = [scalar.ourstash_at];
        let strs = [scalar.pv.as_deref()];
        self.push_sv(tags::SCALAR, addr, 1, 24, blessed_at, &hdr, &ptrs, &strs, &[]);
        self
    }

    pub fn ref_sv(&mut self, addr: u64, r: &Ref) -> &mut Self {
        let hdr = [u8::from(r.weak)];
        let ptrs = [r.rv_at, r.ourstash_at];
        self.push_sv(tags::REF, addr, 1, 24, 0, &hdr, &ptrs, &[], &[]);
        self
    }

    pub fn array(&mut self, addr: u64, flags: ArrayFlags, elems: &[u64]) -> &mut Self {
        let mut hdr = Vec::new();
        self.w_uint(&mut hdr, elems.len() as u64);
        hdr.push(flags.bits());
        let mut body = Vec::new();
        for elem in elems {
            self.w_ptr(&mut body, *elem);
        }
        self.push_sv(tags::ARRAY, addr, 1, 64, 0, &hdr, &[], &[], &body);
        self
    }

    pub fn hash(&mut self, addr: u64, backrefs_at: u64, entries: &[(&[u8], u64)]) -> &mut Self {
        let mut hdr = Vec::new();
        self.w_uint(&mut hdr, entries.len() as u64);
        let body = self.hash_body(entries);
        self.push_sv(tags::HASH, addr, 1, 120, 0, &hdr, &[backrefs_at], &[], &body);
        self
    }

    pub fn stash(
        &mut self,
        addr: u64,
        name: &[u8],
        backrefs_at: u64,
        entries: &[(&[u8], u64)],
    ) -> &mut Self {
        let mut hdr = Vec::new();
        self.w_uint(&mut hdr, entries.len() as u64);
        let body = self.hash_body(entries);
        let ptrs = [backrefs_at, 0, 0, 0, 0];
        let strs = [Some(name)];
        self.push_sv(tags::STASH, addr, 1, 160, 0, &hdr, &ptrs, &strs, &body);
        self
    }

    pub fn code(&mut self, addr: u64, code: &Code) -> &mut Self {
        self.code_with_glob(addr, 0, code)
    }

    // The wire glob pointer lands in Sv::glob_at, not in the Code body.
    pub fn code_with_glob(&mut self, addr: u64, glob_at: u64, code: &Code) -> &mut Self {
        let mut hdr = Vec::new();
        self.w_uint(&mut hdr, code.line);
        hdr.push(code.flags.bits());
        self.w_ptr(&mut hdr, code.oproot);
        let ptrs = [
            code.stash_at,
            glob_at,
            code.outside_at,
            code.padlist_at,
            code.constval_at,
        ];
        let strs = [code.file.as_deref()];
        let body = self.code_body(code);
        self.push_sv(tags::CODE, addr, 1, 128, 0, &hdr, &ptrs, &strs, &body);
        self
    }

    fn code_body(&self, code: &Code) -> Vec<u8> {
        let mut body = Vec::new();
        for constant in &code.constants_at {
            body.push(code_tags::CONSTSV);
            self.w_ptr(&mut body, *constant);
        }
        for index in &code.const_indices {
            body.push(code_tags::CONSTIX);
            self.w_uint(&mut body, *index);
        }
        for glob in &code.globrefs_at {
            body.push(code_tags::GVSV);
            self.w_ptr(&mut body, *glob);
        }
        for index in &code.globref_indices {
            body.push(code_tags::GVIX);
            self.w_uint(&mut body, *index);
        }
        if code.padnames_at != 0 {
            body.push(code_tags::PADNAMES);
            self.w_ptr(&mut body, code.padnames_at);
        }
        for (depth, pad) in code.pads_at.iter().enumerate().skip(1) {
            if *pad != 0 {
                body.push(code_tags::PAD);
                self.w_uint(&mut body, depth as u64);
                self.w_ptr(&mut body, *pad);
            }
        }
        body.push(0);
        body
    }

    pub fn magic(&mut self, owner_at: u64, magic: &Magic) -> &mut Self {
        self.heap.push(tags::MAGIC);
        let mut bytes = Vec::new();
        self.w_ptr(&mut bytes, owner_at);
        bytes.push(magic.mtype);
        bytes.push(u8::from(magic.refcounted));
        self.w_ptr(&mut bytes, magic.obj_at);
        if self.format_minor >= 2 {
            self.w_ptr(&mut bytes, magic.ptr_at);
        }
        self.heap.extend_from_slice(&bytes);
        self
    }

    pub fn context_sub(&mut self, file: &[u8], line: u64, cv_at: u64, args_at: u64) -> &mut Self {
        self.contexts.push(crate::context::tags::SUB);
        let mut bytes = Vec::new();
        bytes.push(1); // scalar context
        self.w_str(&mut bytes, Some(file));
        self.w_uint(&mut bytes, line);
        self.w_ptr(&mut bytes, cv_at);
        self.w_ptr(&mut bytes, args_at);
        self.contexts.extend_from_slice(&bytes);
        self
    }

    pub fn context_eval(&mut self, file: &[u8], line: u64, code_at: u64) -> &mut Self {
        self.contexts.push(crate::context::tags::EVAL);
        let mut bytes = Vec::new();
        bytes.push(0); // void context
        self.w_str(&mut bytes, Some(file));
        self.w_uint(&mut bytes, line);
        self.w_ptr(&mut bytes, code_at);
        self.contexts.extend_from_slice(&bytes);
        self
    }

    /// A scalar holding only a byte string.
    pub fn pv_scalar(&mut self, addr: u64, pv: &[u8]) -> &mut Self {
        self.scalar(
            addr,
            &Scalar {
                flags: ScalarFlags::HAS_PV,
                pv: Some(pv.to_vec()),
                pvlen: pv.len() as u64,
                ..Scalar::default()
            },
        )
    }

    pub fn finish(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"PMAT");
        let mut flags = 0_u8;
        if self.layout.byte_order == ByteOrder::BigEndian {
            flags |= 1 << 0;
        }
        if self.layout.uint_size == WordSize::Eight {
            flags |= 1 << 1;
        }
        if self.layout.ptr_size == WordSize::Eight {
            flags |= 1 << 2;
        }
        if self.layout.float_size != FloatSize::Eight {
            flags |= 1 << 3;
        }
        if self.ithreads {
            flags |= 1 << 4;
        }
        out.push(flags);
        out.push(0);
        out.push(crate::FORMAT_VERSION_MAJOR);
        out.push(self.format_minor);
        self.w_u32(
            &mut out,
            (self.perl_version.revision() as u32) << 24
                | (self.perl_version.version() as u32) << 16
                | self.perl_version.subversion() as u32,
        );
        let sizes = self.type_sizes();
        out.push(sizes.len() as u8);
        for (header_len, nptrs, nstrs) in sizes {
            out.push(header_len);
            out.push(nptrs);
            out.push(nstrs);
        }
        self.w_ptr(&mut out, self.undef_at);
        self.w_ptr(&mut out, self.yes_at);
        self.w_ptr(&mut out, self.no_at);
        self.w_u32(&mut out, self.roots.len() as u32);
        for (name, addr) in &self.roots {
            self.w_str(&mut out, Some(name.as_bytes()));
            self.w_ptr(&mut out, *addr);
        }
        self.w_uint(&mut out, self.stack.len() as u64);
        for addr in &self.stack {
            self.w_ptr(&mut out, *addr);
        }
        out.extend_from_slice(&self.heap);
        out.push(0);
        out.extend_from_slice(&self.contexts);
        out.push(0);
        out
    }

    fn type_sizes(&self) -> Vec<(u8, u8, u8)> {
        let uint = self.layout.uint_size.len() as u8;
        let ptr = self.layout.ptr_size.len() as u8;
        let nv = self.layout.float_size.len() as u8;
        let mut sizes = vec![
            (uint, 8, 2),              // GLOB
            (1 + 2 * uint + nv, 1, 1), // SCALAR
            (1, 2, 0),                 // REF
            (uint + 1, 0, 0),          // ARRAY
            (uint, 1, 0),              // HASH
            (uint, 5, 1),              // STASH
            (uint + 1 + ptr, 5, 1),    // CODE
            (0, 3, 0),                 // IO
            (1 + 2 * uint, 1, 0),      // LVALUE
            (0, 0, 0),                 // REGEXP
            (0, 0, 0),                 // FORMAT
            (0, 0, 0),                 // INVLIST
        ];
        for (tag, row) in &self.size_overrides {
            sizes[*tag as usize - 1] = *row;
        }
        sizes
    }

    #[allow(clippy::too_many_arguments)]
    pub fn push_sv(
        &mut self,
        tag: u8,
        addr: u64,
        refcnt: u32,
        size: u64,
        blessed_at: u64,
        hdr: &[u8],
        ptrs: &[u64],
        strs: &[Option<&[u8]>],
        body: &[u8],
    ) {
        let mut record = Vec::new();
        record.push(tag);
        record.extend_from_slice(hdr);
        self.w_ptr(&mut record, addr);
        self.w_u32(&mut record, refcnt);
        self.w_uint(&mut record, size);
        self.w_ptr(&mut record, blessed_at);
        for ptr in ptrs {
            self.w_ptr(&mut record, *ptr);
        }
        for s in strs {
            self.w_str(&mut record, *s);
        }
        record.extend_from_slice(body);
        self.heap.extend_from_slice(&record);
    }

    fn hash_body(&self, entries: &[(&[u8], u64)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (key, value) in entries {
            self.w_str(&mut body, Some(key));
            self.w_ptr(&mut body, *value);
        }
        body
    }

    fn w_u32(&self, out: &mut Vec<u8>, value: u32) {
        match self.layout.byte_order {
            ByteOrder::LittleEndian => out.extend_from_slice(&value.to_le_bytes()),
            ByteOrder::BigEndian => out.extend_from_slice(&value.to_be_bytes()),
        }
    }

    fn w_u64(&self, out: &mut Vec<u8>, value: u64) {
        match self.layout.byte_order {
            ByteOrder::LittleEndian => out.extend_from_slice(&value.to_le_bytes()),
            ByteOrder::BigEndian => out.extend_from_slice(&value.to_be_bytes()),
        }
    }

    fn w_uint(&self, out: &mut Vec<u8>, value: u64) {
        match self.layout.uint_size {
            WordSize::Four => self.w_u32(out, value as u32),
            WordSize::Eight => self.w_u64(out, value),
        }
    }

    fn w_ptr(&self, out: &mut Vec<u8>, value: u64) {
        match self.layout.ptr_size {
            WordSize::Four => self.w_u32(out, value as u32),
            WordSize::Eight => self.w_u64(out, value),
        }
    }

    fn w_nv(&self, out: &mut Vec<u8>, value: f64) {
        // The builder only emits binary64 dumps.
        assert_eq!(FloatSize::Eight, self.layout.float_size);
        self.w_u64(out, value.to_bits());
    }

    fn w_str(&self, out: &mut Vec<u8>, value: Option<&[u8]>) {
        match value {
            Some(bytes) => {
                self.w_uint(out, bytes.len() as u64);
                out.extend_from_slice(bytes);
            }
            None => self.w_uint(out, self.layout.uint_size.sentinel()),
        }
    }
}

impl Default for DumpBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// Addresses of the sample world, shared by the scenario tests.
pub mod world {
    pub const DEFSTASH: u64 = 0x1000;
    pub const STASH_BACKREFS: u64 = 0x1010;
    pub const PKG_SCALAR_GV: u64 = 0x1020;
    pub const PKG_SCALAR: u64 = 0x1030;
    pub const MAIN_GV: u64 = 0x1040;
    pub const STRONGREF_GV: u64 = 0x1050;
    pub const STRONGREF: u64 = 0x1060;
    pub const WEAKREF_GV: u64 = 0x1070;
    pub const WEAKREF: u64 = 0x1080;
    pub const REF_TARGET: u64 = 0x10a0;
    pub const AOFA_GV: u64 = 0x10b0;
    pub const AOFA: u64 = 0x10c0;
    pub const AOFA_ELEM_REF: u64 = 0x10d0;
    pub const AOFA_INNER: u64 = 0x10e0;
    pub const PROTO_CV: u64 = 0x1100;
    pub const CLOSURE_CV: u64 = 0x1110;
    pub const CLOSURE_GV: u64 = 0x1120;
    pub const CLOSURE_REF: u64 = 0x1130;
    pub const MAKER_GV: u64 = 0x1140;
    pub const MAIN_CV: u64 = 0x1200;
    pub const PADLIST: u64 = 0x1210;
    pub const PADNAMES: u64 = 0x1220;
    pub const PAD1: u64 = 0x1230;
    pub const PADNAME_X: u64 = 0x1240;
    pub const ARGS_AV: u64 = 0x1250;
    pub const LEXICAL_X: u64 = 0x1260;
    pub const STRTAB: u64 = 0x1300;
    pub const OPROOT: u64 = 0xbeef;
}

/// A small but representative dump: a package scalar, weak and strong
/// references to a shared target, an array of arrays, a cloned closure and a
/// main code with one lexical.
pub fn sample_dump() -> crate::Dumpfile {
    use world::*;
    let mut b = DumpBuilder::new();
    b.root("defstash", DEFSTASH)
        .root("main_cv", MAIN_CV)
        .root("strtabhv", STRTAB)
        .stack(&[PKG_SCALAR]);
    b.stash(
        DEFSTASH,
        b"main",
        STASH_BACKREFS,
        &[
            (b"main::", MAIN_GV),
            (b"PACKAGE_SCALAR", PKG_SCALAR_GV),
            (b"strongref", STRONGREF_GV),
            (b"weakref", WEAKREF_GV),
            (b"AofA", AOFA_GV),
            (b"CLOSURE", CLOSURE_GV),
            (b"make_closure", MAKER_GV),
        ],
    );
    b.array(
        STASH_BACKREFS,
        crate::ArrayFlags::UNREAL,
        &[PKG_SCALAR_GV],
    );
    b.glob(
        MAIN_GV,
        &Glob {
            stash_at: DEFSTASH,
            hash_at: DEFSTASH,
            egv_at: MAIN_GV,
            name: Some(b"main::".to_vec()),
            ..Glob::default()
        },
    );
    b.glob(
        PKG_SCALAR_GV,
        &Glob {
            stash_at: DEFSTASH,
            scalar_at: PKG_SCALAR,
            egv_at: PKG_SCALAR_GV,
            name: Some(b"PACKAGE_SCALAR".to_vec()),
            file: Some(b"t/test.pl".to_vec()),
            line: 12,
            ..Glob::default()
        },
    );
    b.pv_scalar(PKG_SCALAR, b"some value");
    b.glob(
        STRONGREF_GV,
        &Glob {
            stash_at: DEFSTASH,
            scalar_at: STRONGREF,
            egv_at: STRONGREF_GV,
            name: Some(b"strongref".to_vec()),
            ..Glob::default()
        },
    );
    b.ref_sv(
        STRONGREF,
        &Ref {
            rv_at: REF_TARGET,
            ..Ref::default()
        },
    );
    b.glob(
        WEAKREF_GV,
        &Glob {
            stash_at: DEFSTASH,
            scalar_at: WEAKREF,
            egv_at: WEAKREF_GV,
            name: Some(b"weakref".to_vec()),
            ..Glob::default()
        },
    );
    b.ref_sv(
        WEAKREF,
        &Ref {
            rv_at: REF_TARGET,
            weak: true,
            ..Ref::default()
        },
    );
    b.array(REF_TARGET, ArrayFlags::empty(), &[]);
    b.glob(
        AOFA_GV,
        &Glob {
            stash_at: DEFSTASH,
            array_at: AOFA,
            egv_at: AOFA_GV,
            name: Some(b"AofA".to_vec()),
            ..Glob::default()
        },
    );
    b.array(AOFA, ArrayFlags::empty(), &[AOFA_ELEM_REF]);
    b.ref_sv(
        AOFA_ELEM_REF,
        &Ref {
            rv_at: AOFA_INNER,
            ..Ref::default()
        },
    );
    b.array(AOFA_INNER, ArrayFlags::empty(), &[]);
    b.glob(
        MAKER_GV,
        &Glob {
            stash_at: DEFSTASH,
            code_at: PROTO_CV,
            egv_at: MAKER_GV,
            name: Some(b"make_closure".to_vec()),
            ..Glob::default()
        },
    );
    b.code_with_glob(
        PROTO_CV,
        MAKER_GV,
        &Code {
            flags: crate::CodeFlags::CLONE,
            oproot: OPROOT,
            stash_at: DEFSTASH,
            file: Some(b"t/test.pl".to_vec()),
            line: 20,
            ..Code::default()
        },
    );
    b.code(
        CLOSURE_CV,
        &Code {
            flags: crate::CodeFlags::CLONED | crate::CodeFlags::WEAKOUTSIDE,
            oproot: OPROOT,
            stash_at: DEFSTASH,
            outside_at: MAIN_CV,
            file: Some(b"t/test.pl".to_vec()),
            line: 21,
            ..Code::default()
        },
    );
    b.glob(
        CLOSURE_GV,
        &Glob {
            stash_at: DEFSTASH,
            scalar_at: CLOSURE_REF,
            egv_at: CLOSURE_GV,
            name: Some(b"CLOSURE".to_vec()),
            ..Glob::default()
        },
    );
    b.ref_sv(
        CLOSURE_REF,
        &Ref {
            rv_at: CLOSURE_CV,
            ..Ref::default()
        },
    );
    b.code(
        MAIN_CV,
        &Code {
            stash_at: DEFSTASH,
            padlist_at: PADLIST,
            padnames_at: PADNAMES,
            pads_at: vec![0, PAD1],
            file: Some(b"t/test.pl".to_vec()),
            ..Code::default()
        },
    );
    b.array(PADLIST, ArrayFlags::UNREAL, &[PADNAMES, PAD1]);
    b.array(PADNAMES, ArrayFlags::UNREAL, &[0, PADNAME_X]);
    b.pv_scalar(PADNAME_X, b"$x");
    b.array(PAD1, ArrayFlags::UNREAL, &[ARGS_AV, LEXICAL_X]);
    b.array(ARGS_AV, ArrayFlags::empty(), &[]);
    b.pv_scalar(LEXICAL_X, b"lexical value");
    b.hash(STRTAB, 0, &[(b"shared string", 0xdead)]);
    b.context_sub(b"t/test.pl", 30, MAIN_CV, 0);
    b.context_eval(b"t/test.pl", 31, PKG_SCALAR);
    crate::Dumpfile::read(&b.finish()[..]).expect("sample dump loads")
}
