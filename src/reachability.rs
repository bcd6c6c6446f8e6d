use std::collections::BTreeMap;
use std::collections::VecDeque;

use crate::dumpfile::PROGRESS_INTERVAL;
use crate::Dumpfile;
use crate::Phase;
use crate::Progress;
use crate::ProgressFn;
use crate::StrengthFilter;
use crate::Sv;
use crate::SvBody;

/// Why an object is reachable.
///
/// Precedence is established by walk order: symbol-table structure first,
/// then user data hanging off it, then the pad structure and lexicals, and
/// interpreter internals last. Every reached object gets exactly one
/// category.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Reachability {
    /// Part of the symbol-table structure: stashes and their globs.
    Symtab,
    /// User data: values stored in glob slots and everything they refer to.
    User,
    /// Pad structure: padlists, padnames tables and pads.
    Padlist,
    /// A lexical variable living in a pad slot.
    Lexical,
    /// Interpreter-internal bookkeeping.
    Internal,
}

impl std::fmt::Display for Reachability {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Self::Symtab => "symbol table",
            Self::User => "user data",
            Self::Padlist => "padlist structure",
            Self::Lexical => "lexical variable",
            Self::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

struct WorkItem {
    addr: u64,
    // Set for values already coloured lexical whose contents still count as
    // user data.
    expand_only: bool,
}

impl Dumpfile {
    /// The reachability category of the object at `addr`, or `None` when the
    /// object is unreached or unknown.
    ///
    /// Classifies the whole heap on first use.
    pub fn reachability_of(&self, addr: u64) -> Option<Reachability> {
        self.classify_reachability(None).get(&addr).copied()
    }

    /// Classify every reachable object, reporting progress.
    ///
    /// The classification runs once and is cached.
    pub fn classify_reachability(
        &self,
        progress: Option<ProgressFn<'_>>,
    ) -> &BTreeMap<u64, Reachability> {
        self.reachability.get_or_init(|| {
            let mut colors: BTreeMap<u64, Reachability> = BTreeMap::new();
            let mut user_seeds: VecDeque<WorkItem> = VecDeque::new();
            let mut internal_seeds: Vec<u64> = Vec::new();
            self.walk_symtab(&mut colors, &mut user_seeds, &mut internal_seeds);
            self.walk_user(&mut colors, user_seeds, &mut internal_seeds, progress);
            self.walk_internal(&mut colors, internal_seeds, progress);
            colors
        })
    }

    // Walk 1: the stash tree. Stashes and their globs are symbol-table
    // structure; glob slots and plain stash values seed the user walk.
    fn walk_symtab(
        &self,
        colors: &mut BTreeMap<u64, Reachability>,
        user_seeds: &mut VecDeque<WorkItem>,
        internal_seeds: &mut Vec<u64>,
    ) {
        let Some(defstash) = self.root_addr("defstash") else {
            return;
        };
        let mut stash_queue = VecDeque::from([defstash]);
        while let Some(addr) = stash_queue.pop_front() {
            if colors.contains_key(&addr) {
                continue;
            }
            let Some(sv) = self.sv_at(addr) else {
                continue;
            };
            let Some(hash) = sv.as_hash() else {
                continue;
            };
            colors.insert(addr, Reachability::Symtab);
            if hash.backrefs_at != 0 {
                internal_seeds.push(hash.backrefs_at);
            }
            for magic in &sv.magic {
                internal_seeds.push(magic.obj_at);
                internal_seeds.push(magic.ptr_at);
            }
            for (key, value) in &hash.values {
                let value = *value;
                if value == 0 {
                    continue;
                }
                let Some(entry) = self.sv_at(value) else {
                    continue;
                };
                if key.ends_with(b"::") {
                    match &entry.body {
                        SvBody::Glob(glob) => {
                            colors.entry(value).or_insert(Reachability::Symtab);
                            if glob.hash_at != 0 {
                                stash_queue.push_back(glob.hash_at);
                            }
                        }
                        SvBody::Stash(_) | SvBody::Hash(_) => stash_queue.push_back(value),
                        _ => {}
                    }
                } else if let SvBody::Glob(glob) = &entry.body {
                    colors.entry(value).or_insert(Reachability::Symtab);
                    for slot in [
                        glob.scalar_at,
                        glob.array_at,
                        glob.hash_at,
                        glob.code_at,
                        glob.io_at,
                        glob.form_at,
                    ] {
                        if slot != 0 {
                            user_seeds.push_back(WorkItem {
                                addr: slot,
                                expand_only: false,
                            });
                        }
                    }
                } else {
                    user_seeds.push_back(WorkItem {
                        addr: value,
                        expand_only: false,
                    });
                }
            }
        }
    }

    // Walk 2: user data, starting from glob slots and the main code.
    fn walk_user(
        &self,
        colors: &mut BTreeMap<u64, Reachability>,
        mut queue: VecDeque<WorkItem>,
        internal_seeds: &mut Vec<u64>,
        progress: Option<ProgressFn<'_>>,
    ) {
        if let Some(main_cv) = self.root_addr("main_cv") {
            queue.push_back(WorkItem {
                addr: main_cv,
                expand_only: false,
            });
        }
        let mut done: u64 = 0;
        while let Some(item) = queue.pop_front() {
            if item.addr == 0 || self.is_immortal_addr(item.addr) {
                continue;
            }
            let Some(sv) = self.sv_at(item.addr) else {
                continue;
            };
            if !item.expand_only {
                if colors.contains_key(&item.addr) {
                    continue;
                }
                colors.insert(item.addr, Reachability::User);
            }
            self.expand_user(sv, colors, &mut queue, internal_seeds);
            done += 1;
            if done % PROGRESS_INTERVAL == 0 {
                if let Some(callback) = progress {
                    callback(&Progress {
                        phase: Phase::Reachability,
                        done,
                        total: None,
                    });
                }
            }
        }
    }

    fn expand_user(
        &self,
        sv: &Sv,
        colors: &mut BTreeMap<u64, Reachability>,
        queue: &mut VecDeque<WorkItem>,
        internal_seeds: &mut Vec<u64>,
    ) {
        let mut enqueue = |addr: u64| {
            if addr != 0 {
                queue.push_back(WorkItem {
                    addr,
                    expand_only: false,
                });
            }
        };
        match &sv.body {
            SvBody::Ref(r) => enqueue(r.rv_at),
            SvBody::Array(a) => {
                for elem in a.elems_at.iter().copied() {
                    enqueue(elem);
                }
            }
            SvBody::Hash(h) => {
                for value in h.values.values().copied() {
                    enqueue(value);
                }
            }
            SvBody::Stash(st) => {
                for value in st.hash.values.values().copied() {
                    enqueue(value);
                }
            }
            SvBody::Code(c) => {
                self.expand_user_code(sv.addr, c, colors, queue, internal_seeds);
            }
            SvBody::Lvalue(l) => {
                if l.targ_at != 0 {
                    internal_seeds.push(l.targ_at);
                }
            }
            // Globs reached as user data are terminal; opaque kinds and plain
            // scalars hold no further references.
            _ => {}
        }
        for magic in &sv.magic {
            internal_seeds.push(magic.obj_at);
            internal_seeds.push(magic.ptr_at);
        }
    }

    fn expand_user_code(
        &self,
        addr: u64,
        code: &crate::Code,
        colors: &mut BTreeMap<u64, Reachability>,
        queue: &mut VecDeque<WorkItem>,
        internal_seeds: &mut Vec<u64>,
    ) {
        for a in [code.padlist_at, code.padnames_at] {
            if self.sv_at(a).is_some() {
                colors.entry(a).or_insert(Reachability::Padlist);
            }
        }
        for pad_at in code.pads_at.iter().copied().filter(|p| *p != 0) {
            let Some(pad) = self.sv_at(pad_at).and_then(Sv::as_array) else {
                continue;
            };
            colors.entry(pad_at).or_insert(Reachability::Padlist);
            for (i, elem) in pad.elems_at.iter().copied().enumerate() {
                if elem == 0 || self.is_immortal_addr(elem) {
                    continue;
                }
                if i == 0 {
                    // The implicit @_ argument array.
                    internal_seeds.push(elem);
                    continue;
                }
                if self.sv_at(elem).is_none() {
                    continue;
                }
                if self.padname_of(addr, i).is_some() {
                    if !colors.contains_key(&elem) {
                        colors.insert(elem, Reachability::Lexical);
                        queue.push_back(WorkItem {
                            addr: elem,
                            expand_only: true,
                        });
                    }
                } else {
                    internal_seeds.push(elem);
                }
            }
        }
        for next in [code.outside_at, code.constval_at]
            .into_iter()
            .chain(code.constants_at.iter().copied())
            .chain(code.globrefs_at.iter().copied())
        {
            if next != 0 {
                queue.push_back(WorkItem {
                    addr: next,
                    expand_only: false,
                });
            }
        }
    }

    // Walk 3: everything else reachable from the remaining roots is
    // interpreter internal.
    fn walk_internal(
        &self,
        colors: &mut BTreeMap<u64, Reachability>,
        seeds: Vec<u64>,
        progress: Option<ProgressFn<'_>>,
    ) {
        let mut queue: VecDeque<u64> = VecDeque::new();
        for root in &self.roots {
            if root.addr != 0 && !colors.contains_key(&root.addr) {
                queue.push_back(root.addr);
            }
        }
        queue.extend(seeds);
        let mut done: u64 = 0;
        while let Some(addr) = queue.pop_front() {
            if addr == 0 || self.is_immortal_addr(addr) || colors.contains_key(&addr) {
                continue;
            }
            let Some(sv) = self.sv_at(addr) else {
                continue;
            };
            colors.insert(addr, Reachability::Internal);
            // The non-public outref view: annotations are followed, the
            // blessing edge is not.
            self.each_outref(sv, StrengthFilter::ALL, false, &mut |r| {
                if !colors.contains_key(&r.addr) {
                    queue.push_back(r.addr);
                }
            });
            done += 1;
            if done % PROGRESS_INTERVAL == 0 {
                if let Some(callback) = progress {
                    callback(&Progress {
                        phase: Phase::Reachability,
                        done,
                        total: None,
                    });
                }
            }
        }
    }
}
