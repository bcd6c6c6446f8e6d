use crate::dumpfile::PROGRESS_INTERVAL;
use crate::ArrayRole;
use crate::Dumpfile;
use crate::Phase;
use crate::Progress;
use crate::ProgressFn;
use crate::SvBody;
use crate::SvKind;

// Everything in here is idempotent: re-running the pass on an already-fixed
// dump changes no field.
impl Dumpfile {
    /// Resolve the cross-object invariants that need random access: pad-role
    /// reclassification, glob back-links, backrefs marking, embedded-constant
    /// resolution and the shared-string-table scrub.
    pub(crate) fn fixup(&mut self, progress: Option<ProgressFn<'_>>) {
        let addrs: Vec<u64> = self.svs.keys().copied().collect();
        let total = addrs.len() as u64;
        for (i, addr) in addrs.into_iter().enumerate() {
            let Some(kind) = self.svs.get(&addr).map(|sv| sv.kind()) else {
                continue;
            };
            match kind {
                SvKind::Glob => self.fixup_glob(addr),
                SvKind::Hash | SvKind::Stash => self.fixup_hash(addr),
                SvKind::Code => self.fixup_code(addr),
                _ => {}
            }
            if (i + 1) as u64 % PROGRESS_INTERVAL == 0 {
                if let Some(callback) = progress {
                    callback(&Progress {
                        phase: Phase::Fixup,
                        done: (i + 1) as u64,
                        total: Some(total),
                    });
                }
            }
        }
        self.scrub_strtab();
    }

    // Propagate the owning glob into the four value slots so they can be
    // printed as symbols later.
    fn fixup_glob(&mut self, addr: u64) {
        let Some(glob) = self.svs.get(&addr).and_then(|sv| sv.as_glob()) else {
            return;
        };
        let slots = [
            glob.scalar_at,
            glob.array_at,
            glob.hash_at,
            glob.code_at,
        ];
        for slot in slots {
            if slot == 0 {
                continue;
            }
            if let Some(target) = self.svs.get_mut(&slot) {
                target.glob_at = addr;
            }
        }
    }

    fn fixup_hash(&mut self, addr: u64) {
        let Some(backrefs_at) = self
            .svs
            .get(&addr)
            .and_then(|sv| sv.as_hash())
            .map(|h| h.backrefs_at)
        else {
            return;
        };
        if backrefs_at == 0 {
            return;
        }
        if let Some(SvBody::Array(array)) =
            self.svs.get_mut(&backrefs_at).map(|sv| &mut sv.body)
        {
            array.is_backrefs = true;
        }
    }

    fn fixup_code(&mut self, addr: u64) {
        let Some(code) = self.svs.get(&addr).and_then(|sv| sv.as_code()) else {
            return;
        };
        let padlist_at = code.padlist_at;
        let mut padnames_at = code.padnames_at;
        let mut pads_at: Vec<u64> = code.pads_at.clone();
        let explicit = crate::PerlVersion::new(5, 18, 0) <= self.header.perl_version;
        if padlist_at != 0 {
            self.set_array_role(padlist_at, ArrayRole::Padlist, addr);
            if !explicit || (padnames_at == 0 && pads_at.is_empty()) {
                // Older producers leave the layout implicit: element 0 of the
                // padlist is the name table, the rest are per-depth pads.
                let elems = self
                    .svs
                    .get(&padlist_at)
                    .and_then(|sv| sv.as_array())
                    .map(|a| a.elems_at.clone())
                    .unwrap_or_default();
                padnames_at = elems.first().copied().unwrap_or(0);
                pads_at = vec![0];
                pads_at.extend(elems.iter().skip(1).copied());
            }
        }
        if padnames_at != 0 {
            self.set_array_role(padnames_at, ArrayRole::Padnames, addr);
        }
        for pad in pads_at.iter().copied().filter(|p| *p != 0) {
            self.set_array_role(pad, ArrayRole::Pad, addr);
        }
        let (const_indices, globref_indices) = {
            let Some(SvBody::Code(code)) = self.svs.get_mut(&addr).map(|sv| &mut sv.body)
            else {
                return;
            };
            code.padnames_at = padnames_at;
            code.pads_at = pads_at.clone();
            (
                std::mem::take(&mut code.const_indices),
                std::mem::take(&mut code.globref_indices),
            )
        };
        if self.header.ithreads && !(const_indices.is_empty() && globref_indices.is_empty()) {
            self.resolve_pad_indices(addr, &pads_at, padnames_at, const_indices, globref_indices);
        }
    }

    // Under ithreads, constants and referenced globs live in pad 0 addressed
    // by index. Resolve the indices to addresses and blank the originating
    // slots so the reachability walks cannot report them as user data.
    fn resolve_pad_indices(
        &mut self,
        addr: u64,
        pads_at: &[u64],
        padnames_at: u64,
        const_indices: Vec<u64>,
        globref_indices: Vec<u64>,
    ) {
        let Some(pad0) = pads_at.iter().copied().find(|p| *p != 0) else {
            return;
        };
        let pad0_elems = self
            .svs
            .get(&pad0)
            .and_then(|sv| sv.as_array())
            .map(|a| a.elems_at.clone())
            .unwrap_or_default();
        let mut constants = Vec::with_capacity(const_indices.len());
        let mut globrefs = Vec::with_capacity(globref_indices.len());
        for index in &const_indices {
            if let Some(target) = pad0_elems.get(*index as usize).copied() {
                constants.push(target);
            }
        }
        for index in &globref_indices {
            if let Some(target) = pad0_elems.get(*index as usize).copied() {
                globrefs.push(target);
            }
        }
        let blank = |svs: &mut std::collections::BTreeMap<u64, crate::Sv>, array_at: u64| {
            let indices = const_indices.iter().chain(globref_indices.iter());
            if let Some(SvBody::Array(array)) = svs.get_mut(&array_at).map(|sv| &mut sv.body) {
                for index in indices {
                    if let Some(slot) = array.elems_at.get_mut(*index as usize) {
                        *slot = 0;
                    }
                }
            }
        };
        if padnames_at != 0 {
            blank(&mut self.svs, padnames_at);
        }
        for pad in pads_at.iter().copied().filter(|p| *p != 0) {
            blank(&mut self.svs, pad);
        }
        if let Some(SvBody::Code(code)) = self.svs.get_mut(&addr).map(|sv| &mut sv.body) {
            code.constants_at.extend(constants);
            code.globrefs_at.extend(globrefs);
        }
    }

    fn set_array_role(&mut self, addr: u64, role: ArrayRole, padcv_at: u64) {
        if let Some(SvBody::Array(array)) = self.svs.get_mut(&addr).map(|sv| &mut sv.body) {
            array.role = role;
            array.padcv_at = padcv_at;
        }
    }

    // The shared string table's values are reference counts in the producer,
    // not addresses; expose the key set with zero values so nothing ever
    // follows them.
    fn scrub_strtab(&mut self) {
        let Some(addr) = self.root_addr("strtabhv") else {
            return;
        };
        if let Some(sv) = self.svs.get_mut(&addr) {
            if let SvBody::Hash(hash) = &mut sv.body {
                for value in hash.values.values_mut() {
                    *value = 0;
                }
            }
        }
    }
}
