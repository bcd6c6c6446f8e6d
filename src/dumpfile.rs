use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::io::BufReader;
use std::path::Path;

use crate::sv::tags;
use crate::Context;
use crate::DumpRead;
use crate::Error;
use crate::Header;
use crate::Immortal;
use crate::Inref;
use crate::Magic;
use crate::PositionReader;
use crate::Reachability;
use crate::Sv;
use crate::SvBody;
use crate::SvKind;

/// One entry of the named-root table.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Root {
    /// The root's name as recorded in the file.
    pub name: String,
    /// Address of the rooted object, zero if the root was empty.
    pub addr: u64,
}

impl Root {
    /// A human-readable description of the root.
    ///
    /// Well-known names get a fixed description, unknown names are kept
    /// verbatim.
    pub fn description(&self) -> &str {
        root_description(&self.name).unwrap_or(&self.name)
    }
}

/// Look up the description of a well-known root name.
pub fn root_description(name: &str) -> Option<&'static str> {
    WELL_KNOWN_ROOTS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, d)| *d)
}

// The producer writes whatever singletons its interpreter build has; this
// table only supplies display names, so additions never break loading.
const WELL_KNOWN_ROOTS: &[(&str, &str)] = &[
    ("main_cv", "the main code"),
    ("defstash", "the default stash"),
    ("mainstack", "the main stack AV"),
    ("beginav", "the BEGIN list"),
    ("checkav", "the CHECK list"),
    ("unitcheckav", "the UNITCHECK list"),
    ("initav", "the INIT list"),
    ("endav", "the END list"),
    ("strtabhv", "the shared string table"),
    ("envgv", "the ENV GV"),
    ("incgv", "the INC GV"),
    ("statgv", "the stat GV"),
    ("statname", "the statname SV"),
    ("tmpsv", "the temporary SV"),
    ("defgv", "the default GV"),
    ("argvgv", "the ARGV GV"),
    ("argvoutgv", "the ARGVOUT GV"),
    ("errgv", "the error GV"),
    ("debstash", "the debugger stash"),
    ("stashcache", "the stash cache"),
    ("isarev", "the ISA reverse map"),
    ("registeredmros", "the registered MROs HV"),
    ("sortstash", "the sort stash"),
    ("firstgv", "the *a GV"),
    ("secondgv", "the *b GV"),
];

/// Which long-running operation a [`Progress`] report belongs to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    /// Loading heap records.
    Load,
    /// Resolving cross-object invariants.
    Fixup,
    /// Building the inverse reference index.
    Inrefs,
    /// Classifying reachability.
    Reachability,
}

/// A progress report passed to the optional callbacks.
///
/// Purely informational; callbacks must not mutate the engine.
#[derive(Clone, Copy, Debug)]
pub struct Progress {
    /// The running operation.
    pub phase: Phase,
    /// Work units done so far.
    pub done: u64,
    /// Total work units, when known up front.
    pub total: Option<u64>,
}

// One callback per this many work units.
pub(crate) const PROGRESS_INTERVAL: u64 = 10_000;

/// An optional progress callback.
pub type ProgressFn<'a> = &'a dyn Fn(&Progress);

/// A loaded heap dump: the typed object graph plus roots, operand stack and
/// call contexts.
///
/// Owns every object; analyses refer to objects by address through
/// [`sv_at`](Self::sv_at).
#[derive(Debug)]
pub struct Dumpfile {
    /// The decoded file header.
    pub header: Header,
    /// Address of the immortal `undef`.
    pub undef_at: u64,
    /// Address of the immortal true value.
    pub yes_at: u64,
    /// Address of the immortal false value.
    pub no_at: u64,
    /// The named-root table, in file order.
    pub roots: Vec<Root>,
    /// The operand-stack snapshot, bottom first.
    pub stack_at: Vec<u64>,
    /// The call-context stack, innermost first.
    pub contexts: Vec<Context>,
    pub(crate) svs: BTreeMap<u64, Sv>,
    pub(crate) inrefs: OnceCell<BTreeMap<u64, Vec<Inref>>>,
    pub(crate) reachability: OnceCell<BTreeMap<u64, Reachability>>,
    pub(crate) protosubs: OnceCell<BTreeMap<u64, u64>>,
}

impl Dumpfile {
    /// Read a dump from `reader`.
    pub fn read<R: std::io::Read>(reader: R) -> Result<Self, Error> {
        Self::read_with_progress(reader, None)
    }

    /// Read a dump from the file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::read(BufReader::new(std::fs::File::open(path)?))
    }

    /// Read a dump from `reader`, reporting progress at fixed work intervals.
    pub fn read_with_progress<R: std::io::Read>(
        reader: R,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Self, Error> {
        let mut reader = PositionReader::new(reader);
        let header = Header::read(&mut reader)?;
        let layout = header.layout;
        let undef_at = reader.read_ptr(layout)?;
        let yes_at = reader.read_ptr(layout)?;
        let no_at = reader.read_ptr(layout)?;
        let n_roots = reader.read_u32(layout.byte_order)?;
        let mut roots = Vec::with_capacity(n_roots as usize);
        for _ in 0..n_roots {
            let name = reader.read_str(layout)?.unwrap_or_default();
            let name = String::from_utf8_lossy(&name).into_owned();
            let addr = reader.read_ptr(layout)?;
            if root_description(&name).is_none() {
                log::debug!("Unknown root {:?}, keeping verbatim", name);
            }
            roots.push(Root { name, addr });
        }
        let n_stack = reader.read_uint(layout)?;
        let stack_at = reader.read_ptrs(layout, n_stack as usize)?;
        let mut svs = BTreeMap::new();
        for (addr, which) in [
            (undef_at, Immortal::Undef),
            (yes_at, Immortal::Yes),
            (no_at, Immortal::No),
        ] {
            if addr != 0 {
                svs.insert(addr, Sv::fabricate_immortal(addr, which));
            }
        }
        let mut annotations: Vec<(u64, Magic)> = Vec::new();
        let mut n_loaded: u64 = 0;
        loop {
            let tag = reader.read_u8()?;
            if tag == 0 {
                break;
            }
            if tag == tags::MAGIC {
                let owner = reader.read_ptr(layout)?;
                let mtype = reader.read_u8()?;
                let flags = reader.read_u8()?;
                let obj_at = reader.read_ptr(layout)?;
                // Early format minors did not record the pointer-typed
                // target.
                let ptr_at = if header.format_minor >= 2 {
                    reader.read_ptr(layout)?
                } else {
                    0
                };
                annotations.push((
                    owner,
                    Magic {
                        mtype,
                        refcounted: flags & 0x01 != 0,
                        obj_at,
                        ptr_at,
                    },
                ));
                continue;
            }
            let sv = Sv::read_record(&mut reader, tag, &header)?;
            svs.insert(sv.addr, sv);
            n_loaded += 1;
            if n_loaded % PROGRESS_INTERVAL == 0 {
                if let Some(callback) = progress {
                    callback(&Progress {
                        phase: Phase::Load,
                        done: n_loaded,
                        total: None,
                    });
                }
            }
        }
        let mut contexts = Vec::new();
        loop {
            let tag = match reader.read_u8() {
                Ok(0) => break,
                Ok(tag) => tag,
                // The context section is optional.
                Err(Error::UnexpectedEof) => break,
                Err(e) => return Err(e),
            };
            contexts.push(Context::read_record(&mut reader, tag, layout)?);
        }
        for (owner, magic) in annotations {
            match svs.get_mut(&owner) {
                Some(sv) => sv.magic.push(magic),
                None => log::debug!("Magic for unknown object {:#x}", owner),
            }
        }
        let mut dump = Self {
            header,
            undef_at,
            yes_at,
            no_at,
            roots,
            stack_at,
            contexts,
            svs,
            inrefs: OnceCell::new(),
            reachability: OnceCell::new(),
            protosubs: OnceCell::new(),
        };
        dump.fixup(progress);
        Ok(dump)
    }

    /// Look up an object by address.
    ///
    /// Unresolved addresses yield `None`; dangling pointers in a dump are not
    /// fatal.
    pub fn sv_at(&self, addr: u64) -> Option<&Sv> {
        if addr == 0 {
            return None;
        }
        self.svs.get(&addr)
    }

    /// Look up an object by address, failing with
    /// [`Error::NoSuchAddress`] when absent.
    pub fn sv_at_or_err(&self, addr: u64) -> Result<&Sv, Error> {
        self.sv_at(addr).ok_or(Error::NoSuchAddress(addr))
    }

    /// Iterate over all objects in address order.
    pub fn svs(&self) -> impl Iterator<Item = &Sv> {
        self.svs.values()
    }

    /// The number of objects, including the fabricated immortals.
    pub fn len(&self) -> usize {
        self.svs.len()
    }

    /// Whether the heap is empty.
    pub fn is_empty(&self) -> bool {
        self.svs.is_empty()
    }

    /// Whether `addr` is one of the three immortal addresses.
    pub fn is_immortal_addr(&self, addr: u64) -> bool {
        addr != 0 && (addr == self.undef_at || addr == self.yes_at || addr == self.no_at)
    }

    /// Address of the named root, if present and non-empty.
    pub fn root_addr(&self, name: &str) -> Option<u64> {
        self.roots
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.addr)
            .filter(|addr| *addr != 0)
    }

    /// The default stash.
    pub fn defstash(&self) -> Option<&Sv> {
        self.sv_at(self.root_addr("defstash")?)
    }

    /// The main code object.
    pub fn main_cv(&self) -> Option<&Sv> {
        self.sv_at(self.root_addr("main_cv")?)
    }

    /// The shared string table.
    pub fn strtab(&self) -> Option<&Sv> {
        self.sv_at(self.root_addr("strtabhv")?)
    }

    /// A language-level name for the object at `addr`, when one can be
    /// derived: `*main::foo` for globs, sigil-prefixed names for glob slots,
    /// `%Foo::` for stashes.
    pub fn identity_of(&self, addr: u64) -> Option<String> {
        let sv = self.sv_at(addr)?;
        match &sv.body {
            SvBody::Glob(g) => {
                let name = g.name.as_deref()?;
                Some(format!(
                    "*{}::{}",
                    self.stash_name_of(g.stash_at),
                    String::from_utf8_lossy(name)
                ))
            }
            SvBody::Stash(s) => {
                let name = s.name.as_deref()?;
                Some(format!("%{}::", String::from_utf8_lossy(name)))
            }
            SvBody::Scalar(_) | SvBody::Ref(_) => self.slot_identity(sv, '$'),
            SvBody::Array(_) => self.slot_identity(sv, '@'),
            SvBody::Hash(_) => self.slot_identity(sv, '%'),
            SvBody::Code(c) => {
                let name = self.slot_identity(sv, '&');
                if name.is_some() {
                    name
                } else {
                    c.file.as_deref().map(|file| {
                        format!("code at {} line {}", String::from_utf8_lossy(file), c.line)
                    })
                }
            }
            _ => None,
        }
    }

    /// The class name of the object's blessing stash, if it is blessed.
    pub fn blessed_package(&self, sv: &Sv) -> Option<String> {
        let stash = self.sv_at(sv.blessed_at)?.as_stash()?;
        let name = stash.name.as_deref()?;
        Some(String::from_utf8_lossy(name).into_owned())
    }

    /// Per-kind object counts and byte totals, for size reporting.
    ///
    /// `structure` switches from the producer-owned bytes to
    /// [`structure_size`](Sv::structure_size).
    pub fn kind_totals(&self, structure: bool) -> BTreeMap<SvKind, (u64, u64)> {
        let mut table: BTreeMap<SvKind, (u64, u64)> = BTreeMap::new();
        for sv in self.svs() {
            let bytes = if structure {
                sv.structure_size()
            } else {
                sv.size
            };
            let entry = table.entry(sv.kind()).or_default();
            entry.0 += 1;
            entry.1 += bytes;
        }
        table
    }

    fn slot_identity(&self, sv: &Sv, sigil: char) -> Option<String> {
        let glob = self.sv_at(sv.glob_at)?.as_glob()?;
        let name = glob.name.as_deref()?;
        Some(format!(
            "{}{}::{}",
            sigil,
            self.stash_name_of(glob.stash_at),
            String::from_utf8_lossy(name)
        ))
    }

    fn stash_name_of(&self, addr: u64) -> String {
        self.sv_at(addr)
            .and_then(|sv| sv.as_stash())
            .and_then(|s| s.name.as_deref())
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .unwrap_or_else(|| "main".into())
    }
}
