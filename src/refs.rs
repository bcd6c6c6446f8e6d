use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::dumpfile::PROGRESS_INTERVAL;
use crate::ArrayRole;
use crate::Code;
use crate::CodeFlags;
use crate::Dumpfile;
use crate::Hash;
use crate::Phase;
use crate::Progress;
use crate::ProgressFn;
use crate::Sv;
use crate::SvBody;

/// How an outgoing reference relates to the target's reference count.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Strength {
    /// The slot contributes to the target's reference count.
    Strong,
    /// The slot deliberately does not contribute.
    Weak,
    /// A convenience edge through a reference cell; does not affect counts.
    Indirect,
    /// A relation reconstructed by the engine, absent from the producer.
    Inferred,
}

bitflags! {
    /// A multiset of strengths selecting a filtered reference view.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct StrengthFilter: u8 {
        const STRONG = 1 << 0;
        const WEAK = 1 << 1;
        const INDIRECT = 1 << 2;
        const INFERRED = 1 << 3;
        /// Strong and weak: the references that exist as pointers.
        const DIRECT = Self::STRONG.bits() | Self::WEAK.bits();
        /// Every strength.
        const ALL = Self::STRONG.bits()
            | Self::WEAK.bits()
            | Self::INDIRECT.bits()
            | Self::INFERRED.bits();
    }
}

impl Strength {
    /// Whether this strength belongs to `filter`.
    pub fn matches(self, filter: StrengthFilter) -> bool {
        filter.contains(match self {
            Self::Strong => StrengthFilter::STRONG,
            Self::Weak => StrengthFilter::WEAK,
            Self::Indirect => StrengthFilter::INDIRECT,
            Self::Inferred => StrengthFilter::INFERRED,
        })
    }
}

/// An outgoing reference of an object.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Reference {
    /// The role of the reference within its owner, e.g. `element [3]`.
    pub name: String,
    /// Reference strength.
    pub strength: Strength,
    /// Address of the target object.
    pub addr: u64,
}

/// An incoming reference of an object.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Inref {
    /// The role of the reference within its owner, or the root name.
    pub name: String,
    /// Reference strength.
    pub strength: Strength,
    /// Address of the referring object; `None` for named roots and the
    /// operand stack.
    pub owner_at: Option<u64>,
}

struct Emit<'a> {
    filter: StrengthFilter,
    f: &'a mut dyn FnMut(Reference),
}

impl Emit<'_> {
    fn push(&mut self, name: impl Into<String>, strength: Strength, addr: u64) {
        if addr == 0 || !strength.matches(self.filter) {
            return;
        }
        (self.f)(Reference {
            name: name.into(),
            strength,
            addr,
        });
    }
}

impl Dumpfile {
    /// All outgoing references of `sv`.
    pub fn outrefs(&self, sv: &Sv) -> Vec<Reference> {
        self.outrefs_matching(sv, StrengthFilter::ALL)
    }

    /// The outgoing references of `sv` whose strength belongs to `filter`.
    pub fn outrefs_matching(&self, sv: &Sv, filter: StrengthFilter) -> Vec<Reference> {
        let mut refs = Vec::new();
        self.each_outref(sv, filter, true, &mut |r| refs.push(r));
        refs
    }

    /// The number of outgoing references matching `filter`, without
    /// collecting them.
    pub fn outref_count(&self, sv: &Sv, filter: StrengthFilter) -> usize {
        let mut n = 0;
        self.each_outref(sv, filter, true, &mut |_| n += 1);
        n
    }

    // The `public` view adds the blessing edge; the non-public view is what
    // the reachability walks traverse.
    pub(crate) fn each_outref(
        &self,
        sv: &Sv,
        filter: StrengthFilter,
        public: bool,
        f: &mut dyn FnMut(Reference),
    ) {
        let mut emit = Emit { filter, f };
        match &sv.body {
            SvBody::Glob(g) => {
                emit.push("the scalar", Strength::Strong, g.scalar_at);
                emit.push("the array", Strength::Strong, g.array_at);
                emit.push("the hash", Strength::Strong, g.hash_at);
                emit.push("the code", Strength::Strong, g.code_at);
                emit.push("the io", Strength::Strong, g.io_at);
                emit.push("the form", Strength::Strong, g.form_at);
                let strength = if g.egv_at == sv.addr {
                    Strength::Weak
                } else {
                    Strength::Strong
                };
                emit.push("the egv", strength, g.egv_at);
            }
            SvBody::Scalar(s) => {
                emit.push("the our stash", Strength::Strong, s.ourstash_at);
            }
            SvBody::Ref(r) => {
                let strength = if r.weak {
                    Strength::Weak
                } else {
                    Strength::Strong
                };
                emit.push("the referrant", strength, r.rv_at);
                if let Some(inner) = self.rv_through(r.rv_at) {
                    emit.push("the referrant via RV", Strength::Indirect, inner);
                }
                emit.push("the our stash", Strength::Strong, r.ourstash_at);
            }
            SvBody::Array(a) => match a.role {
                ArrayRole::Plain => {
                    let strength = if a.is_real() {
                        Strength::Strong
                    } else {
                        Strength::Weak
                    };
                    for (i, elem) in a.elems_at.iter().copied().enumerate() {
                        self.direct_or_indirect(
                            &mut emit,
                            format!("element [{}]", i),
                            strength,
                            elem,
                        );
                    }
                }
                ArrayRole::Padlist => {
                    for (i, elem) in a.elems_at.iter().copied().enumerate() {
                        if i == 0 {
                            emit.push("the padnames", Strength::Strong, elem);
                        } else {
                            emit.push(format!("pad at depth {}", i), Strength::Strong, elem);
                        }
                    }
                }
                ArrayRole::Padnames => {
                    for (i, elem) in a.elems_at.iter().copied().enumerate().skip(1) {
                        emit.push(format!("padname [{}]", i), Strength::Strong, elem);
                    }
                }
                ArrayRole::Pad => {
                    for (i, elem) in a.elems_at.iter().copied().enumerate() {
                        if i == 0 {
                            emit.push("the @_ av", Strength::Strong, elem);
                            continue;
                        }
                        let name = match self.padname_of(a.padcv_at, i) {
                            Some(name) => format!("the lexical {}", name),
                            None => format!("elem [{}]", i),
                        };
                        self.direct_or_indirect(&mut emit, name, Strength::Strong, elem);
                    }
                }
            },
            SvBody::Hash(h) => self.hash_outrefs(&mut emit, h),
            SvBody::Stash(st) => {
                self.hash_outrefs(&mut emit, &st.hash);
                emit.push("the mro linear all HV", Strength::Strong, st.mro_linear_all_at);
                emit.push(
                    "the mro linear current",
                    Strength::Strong,
                    st.mro_linear_current_at,
                );
                emit.push("the mro next::method", Strength::Strong, st.mro_nextmethod_at);
                emit.push("the mro ISA cache", Strength::Strong, st.mro_isa_at);
            }
            SvBody::Code(c) => {
                let strength = if c.flags.contains(CodeFlags::WEAKOUTSIDE) {
                    Strength::Weak
                } else {
                    Strength::Strong
                };
                emit.push("the scope", strength, c.outside_at);
                emit.push("the stash", Strength::Weak, c.stash_at);
                let strength = if c.flags.contains(CodeFlags::CVGV_RC) {
                    Strength::Strong
                } else {
                    Strength::Weak
                };
                emit.push("the glob", strength, sv.glob_at);
                emit.push("the constant value", Strength::Strong, c.constval_at);
                if let Some(proto) = self.protosub_of(sv.addr, c) {
                    emit.push("the protosub", Strength::Inferred, proto);
                }
                for constant in c.constants_at.iter().copied() {
                    emit.push("a constant", Strength::Strong, constant);
                }
                for glob in c.globrefs_at.iter().copied() {
                    emit.push("a referenced glob", Strength::Strong, glob);
                }
                emit.push("the padlist", Strength::Strong, c.padlist_at);
                // With a padlist present the pads are owned through it and
                // the direct links are conveniences.
                let strength = if c.padlist_at != 0 {
                    Strength::Indirect
                } else {
                    Strength::Strong
                };
                emit.push("the padnames", strength, c.padnames_at);
                for (depth, pad) in c.pads_at.iter().copied().enumerate().skip(1) {
                    emit.push(format!("pad at depth {}", depth), strength, pad);
                }
            }
            SvBody::Io(io) => {
                emit.push("the top GV", Strength::Strong, io.topgv_at);
                emit.push("the format GV", Strength::Strong, io.fmtgv_at);
                emit.push("the bottom GV", Strength::Strong, io.bottomgv_at);
            }
            SvBody::Lvalue(l) => {
                emit.push("the target", Strength::Strong, l.targ_at);
            }
            SvBody::Regexp | SvBody::Format | SvBody::Invlist | SvBody::Immortal(_) => {}
        }
        for magic in &sv.magic {
            let strength = if magic.refcounted {
                Strength::Strong
            } else {
                Strength::Weak
            };
            emit.push(
                format!("'{}' magic object", magic.mtype as char),
                strength,
                magic.obj_at,
            );
            emit.push(
                format!("'{}' magic pointer", magic.mtype as char),
                strength,
                magic.ptr_at,
            );
        }
        if public {
            emit.push("the bless package", Strength::Weak, sv.blessed_at);
        }
    }

    fn hash_outrefs(&self, emit: &mut Emit<'_>, hash: &Hash) {
        if hash.backrefs_at != 0 {
            match self.sv_at(hash.backrefs_at).and_then(Sv::as_array) {
                Some(backrefs) => {
                    emit.push("the backrefs list", Strength::Strong, hash.backrefs_at);
                    for elem in backrefs.elems_at.iter().copied() {
                        emit.push("a backref", Strength::Indirect, elem);
                    }
                }
                None => emit.push("a backref", Strength::Weak, hash.backrefs_at),
            }
        }
        for (key, value) in &hash.values {
            let name = format!("value {{{}}}", String::from_utf8_lossy(key));
            self.direct_or_indirect(emit, name, Strength::Strong, *value);
        }
    }

    // Emit the direct reference, and when the target is a reference cell
    // without magic, also the convenience edge to what it refers to.
    fn direct_or_indirect(
        &self,
        emit: &mut Emit<'_>,
        name: String,
        strength: Strength,
        addr: u64,
    ) {
        if addr == 0 {
            return;
        }
        let inner = self.rv_through(addr);
        emit.push(name.clone(), strength, addr);
        if let Some(inner) = inner {
            emit.push(format!("{} via RV", name), Strength::Indirect, inner);
        }
    }

    fn rv_through(&self, addr: u64) -> Option<u64> {
        let sv = self.sv_at(addr)?;
        if !sv.magic.is_empty() {
            return None;
        }
        let r = sv.as_ref_sv()?;
        (r.rv_at != 0).then_some(r.rv_at)
    }

    pub(crate) fn padname_of(&self, code_at: u64, index: usize) -> Option<String> {
        let code = self.sv_at(code_at)?.as_code()?;
        let padnames = self.sv_at(code.padnames_at)?.as_array()?;
        let name_at = padnames.elems_at.get(index).copied()?;
        let scalar = self.sv_at(name_at)?.as_scalar()?;
        let pv = scalar.pv.as_deref()?;
        if pv.is_empty() {
            return None;
        }
        Some(String::from_utf8_lossy(pv).into_owned())
    }

    fn protosub_of(&self, addr: u64, code: &Code) -> Option<u64> {
        if !code.is_cloned() || code.oproot == 0 {
            return None;
        }
        let index = self.protosubs.get_or_init(|| {
            let mut index = BTreeMap::new();
            for sv in self.svs.values() {
                if let SvBody::Code(c) = &sv.body {
                    if c.is_clone() && c.oproot != 0 {
                        index.entry(c.oproot).or_insert(sv.addr);
                    }
                }
            }
            index
        });
        index.get(&code.oproot).copied().filter(|proto| *proto != addr)
    }

    /// Build the inverse reference index now, reporting progress.
    ///
    /// The index is otherwise built lazily on the first
    /// [`inrefs_of`](Self::inrefs_of) call.
    pub fn build_inrefs_index(&self, progress: Option<ProgressFn<'_>>) {
        self.inrefs.get_or_init(|| {
            let mut index: BTreeMap<u64, Vec<Inref>> = BTreeMap::new();
            for root in &self.roots {
                if root.addr == 0
                    || self.is_immortal_addr(root.addr)
                    || self.sv_at(root.addr).is_none()
                {
                    continue;
                }
                index.entry(root.addr).or_default().push(Inref {
                    name: root.description().to_string(),
                    strength: Strength::Strong,
                    owner_at: None,
                });
            }
            for addr in self.stack_at.iter().copied() {
                if addr == 0 || self.is_immortal_addr(addr) || self.sv_at(addr).is_none() {
                    continue;
                }
                index.entry(addr).or_default().push(Inref {
                    name: "a value on the stack".to_string(),
                    strength: Strength::Strong,
                    owner_at: None,
                });
            }
            let total = self.svs.len() as u64;
            for (i, sv) in self.svs.values().enumerate() {
                self.each_outref(sv, StrengthFilter::ALL, true, &mut |r| {
                    if self.is_immortal_addr(r.addr) || !self.svs.contains_key(&r.addr) {
                        return;
                    }
                    index.entry(r.addr).or_default().push(Inref {
                        name: r.name,
                        strength: r.strength,
                        owner_at: Some(sv.addr),
                    });
                });
                if (i + 1) as u64 % PROGRESS_INTERVAL == 0 {
                    if let Some(callback) = progress {
                        callback(&Progress {
                            phase: Phase::Inrefs,
                            done: (i + 1) as u64,
                            total: Some(total),
                        });
                    }
                }
            }
            index
        });
    }

    /// All incoming references of the object at `addr`.
    ///
    /// Builds the index on first use. Immortals and unknown addresses have
    /// none.
    pub fn inrefs_of(&self, addr: u64) -> &[Inref] {
        self.build_inrefs_index(None);
        self.inrefs
            .get()
            .and_then(|index| index.get(&addr))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The incoming references of `addr` whose strength belongs to `filter`.
    pub fn inrefs_matching(&self, addr: u64, filter: StrengthFilter) -> Vec<&Inref> {
        self.inrefs_of(addr)
            .iter()
            .filter(|r| r.strength.matches(filter))
            .collect()
    }

    /// The number of incoming references matching `filter`.
    pub fn inref_count(&self, addr: u64, filter: StrengthFilter) -> usize {
        self.inrefs_of(addr)
            .iter()
            .filter(|r| r.strength.matches(filter))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test::sample_dump;
    use crate::test::world::*;
    use crate::test::DumpBuilder;
    use crate::test::UNDEF_AT;
    use crate::ArrayFlags;
    use crate::Magic;

    fn named<'a>(refs: &'a [Reference], name: &str) -> &'a Reference {
        refs.iter()
            .find(|r| r.name == name)
            .unwrap_or_else(|| panic!("no outref named {name:?} in {refs:?}"))
    }

    #[test]
    fn glob_outrefs() {
        let dump = sample_dump();
        let gv = dump.sv_at(PKG_SCALAR_GV).expect("glob");
        let refs = dump.outrefs(gv);
        let scalar = named(&refs, "the scalar");
        assert_eq!(Strength::Strong, scalar.strength);
        assert_eq!(PKG_SCALAR, scalar.addr);
        // The egv points back at the glob itself, which must not count.
        let egv = named(&refs, "the egv");
        assert_eq!(Strength::Weak, egv.strength);
        assert_eq!(PKG_SCALAR_GV, egv.addr);
        assert_eq!(2, refs.len());
    }

    #[test]
    fn weak_and_strong_references_share_a_target() {
        let dump = sample_dump();
        let strong = dump.sv_at(STRONGREF).expect("ref").as_ref_sv().expect("ref");
        let weak = dump.sv_at(WEAKREF).expect("ref").as_ref_sv().expect("ref");
        assert_eq!(strong.rv_at, weak.rv_at);
        assert!(!strong.weak);
        assert!(weak.weak);
        let strong_in = dump.inrefs_matching(REF_TARGET, StrengthFilter::STRONG);
        assert_eq!(1, strong_in.len());
        assert_eq!(Some(STRONGREF), strong_in[0].owner_at);
        assert_eq!("the referrant", strong_in[0].name);
        let weak_in = dump.inrefs_matching(REF_TARGET, StrengthFilter::WEAK);
        assert_eq!(1, weak_in.len());
        assert_eq!(Some(WEAKREF), weak_in[0].owner_at);
    }

    #[test]
    fn a_ref_to_an_array_has_no_indirect_edge() {
        let dump = sample_dump();
        let refs = dump.outrefs(dump.sv_at(STRONGREF).expect("ref"));
        assert_eq!(1, refs.len());
        assert_eq!("the referrant", refs[0].name);
        assert_eq!(Strength::Strong, refs[0].strength);
    }

    #[test]
    fn array_of_arrays_has_indirect_edges() {
        let dump = sample_dump();
        let refs = dump.outrefs(dump.sv_at(AOFA).expect("array"));
        let direct = named(&refs, "element [0]");
        assert_eq!(Strength::Strong, direct.strength);
        assert_eq!(AOFA_ELEM_REF, direct.addr);
        let indirect = named(&refs, "element [0] via RV");
        assert_eq!(Strength::Indirect, indirect.strength);
        assert_eq!(AOFA_INNER, indirect.addr);
        let inner_in = dump.inrefs_of(AOFA_INNER);
        assert!(inner_in
            .iter()
            .any(|r| r.owner_at == Some(AOFA_ELEM_REF)
                && r.name == "the referrant"
                && r.strength == Strength::Strong));
        assert!(inner_in
            .iter()
            .any(|r| r.owner_at == Some(AOFA)
                && r.name == "element [0] via RV"
                && r.strength == Strength::Indirect));
    }

    #[test]
    fn stash_outrefs_include_backrefs_and_values() {
        let dump = sample_dump();
        let refs = dump.outrefs(dump.sv_at(DEFSTASH).expect("stash"));
        let backrefs = named(&refs, "the backrefs list");
        assert_eq!(Strength::Strong, backrefs.strength);
        assert_eq!(STASH_BACKREFS, backrefs.addr);
        assert!(refs
            .iter()
            .any(|r| r.name == "a backref"
                && r.strength == Strength::Indirect
                && r.addr == PKG_SCALAR_GV));
        let value = named(&refs, "value {PACKAGE_SCALAR}");
        assert_eq!(Strength::Strong, value.strength);
        assert_eq!(PKG_SCALAR_GV, value.addr);
    }

    #[test]
    fn backrefs_array_elements_are_weak() {
        let dump = sample_dump();
        let refs = dump.outrefs(dump.sv_at(STASH_BACKREFS).expect("av"));
        let elem = named(&refs, "element [0]");
        assert_eq!(Strength::Weak, elem.strength);
    }

    #[test]
    fn code_outrefs() {
        let dump = sample_dump();
        let refs = dump.outrefs(dump.sv_at(CLOSURE_CV).expect("cv"));
        let scope = named(&refs, "the scope");
        assert_eq!(Strength::Weak, scope.strength);
        assert_eq!(MAIN_CV, scope.addr);
        assert_eq!(Strength::Weak, named(&refs, "the stash").strength);
        let proto = named(&refs, "the protosub");
        assert_eq!(Strength::Inferred, proto.strength);
        assert_eq!(PROTO_CV, proto.addr);
    }

    #[test]
    fn a_closure_identifies_its_prototype() {
        let dump = sample_dump();
        let closure_ref = dump
            .find_symbol("$CLOSURE")
            .expect("closure ref")
            .as_ref_sv()
            .expect("ref body");
        assert_eq!(CLOSURE_CV, closure_ref.rv_at);
        let closure = dump
            .sv_at(CLOSURE_CV)
            .expect("closure")
            .as_code()
            .expect("code");
        assert!(closure.is_cloned());
        assert!(!closure.is_clone());
        let proto = dump.sv_at(PROTO_CV).expect("proto").as_code().expect("code");
        assert!(proto.is_clone());
        assert!(!proto.is_cloned());
    }

    #[test]
    fn code_pad_links_are_indirect_when_the_padlist_exists() {
        let dump = sample_dump();
        let refs = dump.outrefs(dump.sv_at(MAIN_CV).expect("cv"));
        assert_eq!(Strength::Strong, named(&refs, "the padlist").strength);
        assert_eq!(Strength::Indirect, named(&refs, "the padnames").strength);
        assert_eq!(Strength::Indirect, named(&refs, "pad at depth 1").strength);
    }

    #[test]
    fn padlist_family_outrefs() {
        let dump = sample_dump();
        let padlist = dump.outrefs(dump.sv_at(PADLIST).expect("padlist"));
        assert_eq!(PADNAMES, named(&padlist, "the padnames").addr);
        assert_eq!(PAD1, named(&padlist, "pad at depth 1").addr);
        let padnames = dump.outrefs(dump.sv_at(PADNAMES).expect("padnames"));
        assert_eq!(1, padnames.len());
        assert_eq!(PADNAME_X, named(&padnames, "padname [1]").addr);
        let pad = dump.outrefs(dump.sv_at(PAD1).expect("pad"));
        assert_eq!(ARGS_AV, named(&pad, "the @_ av").addr);
        assert_eq!(LEXICAL_X, named(&pad, "the lexical $x").addr);
    }

    #[test]
    fn magic_and_bless_edges() {
        let mut b = DumpBuilder::new();
        b.pv_scalar(0x2000, b"victim");
        b.magic(
            0x2000,
            &Magic {
                mtype: b'P',
                refcounted: true,
                obj_at: 0x3000,
                ptr_at: 0x3010,
            },
        );
        b.magic(
            0x2000,
            &Magic {
                mtype: b'<',
                refcounted: false,
                obj_at: 0x3020,
                ptr_at: 0,
            },
        );
        b.stash(0x4000, b"Some::Class", 0, &[]);
        b.scalar_blessed(
            0x2010,
            &crate::Scalar::default(),
            0x4000,
        );
        b.array(0x3000, ArrayFlags::empty(), &[]);
        b.array(0x3020, ArrayFlags::empty(), &[]);
        let dump = crate::Dumpfile::read(&b.finish()[..]).expect("load");
        let refs = dump.outrefs(dump.sv_at(0x2000).expect("scalar"));
        let obj = named(&refs, "'P' magic object");
        assert_eq!(Strength::Strong, obj.strength);
        assert_eq!(0x3000, obj.addr);
        let ptr = named(&refs, "'P' magic pointer");
        assert_eq!(Strength::Strong, ptr.strength);
        assert_eq!(0x3010, ptr.addr);
        let weak_obj = named(&refs, "'<' magic object");
        assert_eq!(Strength::Weak, weak_obj.strength);
        let blessed = dump.outrefs(dump.sv_at(0x2010).expect("blessed"));
        let class = named(&blessed, "the bless package");
        assert_eq!(Strength::Weak, class.strength);
        assert_eq!(0x4000, class.addr);
    }

    #[test]
    fn strength_filters_partition_the_full_set() {
        let dump = sample_dump();
        for sv in dump.svs() {
            let all = dump.outref_count(sv, StrengthFilter::ALL);
            let by_parts = dump.outref_count(sv, StrengthFilter::STRONG)
                + dump.outref_count(sv, StrengthFilter::WEAK)
                + dump.outref_count(sv, StrengthFilter::INDIRECT)
                + dump.outref_count(sv, StrengthFilter::INFERRED);
            assert_eq!(all, by_parts, "at {:#x}", sv.addr);
            let direct = dump.outref_count(sv, StrengthFilter::DIRECT);
            let strong_weak = dump.outref_count(sv, StrengthFilter::STRONG)
                + dump.outref_count(sv, StrengthFilter::WEAK);
            assert_eq!(direct, strong_weak, "at {:#x}", sv.addr);
            assert_eq!(all, dump.outrefs(sv).len());
        }
    }

    #[test]
    fn every_inref_has_a_matching_outref() {
        let dump = sample_dump();
        for sv in dump.svs() {
            for inref in dump.inrefs_of(sv.addr) {
                let Some(owner_at) = inref.owner_at else {
                    continue;
                };
                let owner = dump.sv_at(owner_at).expect("owner");
                let matching: Vec<_> = dump
                    .outrefs(owner)
                    .into_iter()
                    .filter(|r| {
                        r.addr == sv.addr
                            && r.name == inref.name
                            && r.strength == inref.strength
                    })
                    .collect();
                assert_eq!(1, matching.len(), "inref {:?} of {:#x}", inref.name, sv.addr);
            }
        }
    }

    #[test]
    fn roots_and_stack_contribute_inrefs() {
        let dump = sample_dump();
        assert!(dump
            .inrefs_of(DEFSTASH)
            .iter()
            .any(|r| r.owner_at.is_none() && r.name == "the default stash"));
        assert!(dump
            .inrefs_of(PKG_SCALAR)
            .iter()
            .any(|r| r.owner_at.is_none() && r.name == "a value on the stack"));
    }

    #[test]
    fn immortals_receive_no_inrefs() {
        let mut b = DumpBuilder::new();
        b.array(0x2000, ArrayFlags::empty(), &[UNDEF_AT]);
        let dump = crate::Dumpfile::read(&b.finish()[..]).expect("load");
        assert!(dump.inrefs_of(UNDEF_AT).is_empty());
    }

    #[test]
    fn outrefs_only_target_live_or_immortal_addresses() {
        let dump = sample_dump();
        for sv in dump.svs() {
            for r in dump.outrefs(sv) {
                assert!(
                    dump.sv_at(r.addr).is_some() || dump.is_immortal_addr(r.addr),
                    "dangling outref {:?} of {:#x}",
                    r.name,
                    sv.addr
                );
            }
        }
    }
}
