use crate::Dumpfile;
use crate::Error;
use crate::Glob;
use crate::Sv;

/// The sigil of a symbol name, selecting a glob slot.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Sigil {
    /// `$`: the scalar slot.
    Scalar,
    /// `@`: the array slot.
    Array,
    /// `%`: the hash slot.
    Hash,
    /// `&`: the code slot.
    Code,
}

impl Sigil {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '$' => Some(Self::Scalar),
            '@' => Some(Self::Array),
            '%' => Some(Self::Hash),
            '&' => Some(Self::Code),
            _ => None,
        }
    }

    fn slot(self, glob: &Glob) -> u64 {
        match self {
            Self::Scalar => glob.scalar_at,
            Self::Array => glob.array_at,
            Self::Hash => glob.hash_at,
            Self::Code => glob.code_at,
        }
    }
}

impl Dumpfile {
    /// Resolve a sigil-prefixed symbol name to the bound object.
    ///
    /// `$Foo::Bar::baz` walks the stash tree from the default stash through
    /// `Foo::` and `Bar::` and returns the scalar bound to the `baz` glob.
    /// An empty leading segment (`$::baz`) names the default package.
    pub fn find_symbol(&self, name: &str) -> Result<&Sv, Error> {
        let mut chars = name.chars();
        let sigil = chars
            .next()
            .and_then(Sigil::from_char)
            .ok_or_else(|| no_symbol(name, name, "a leading sigil", "none"))?;
        let glob = self.walk_glob(name, chars.as_str())?;
        let slot = sigil.slot(glob);
        if slot == 0 {
            return Err(no_symbol(name, name, "a bound value", "an empty glob slot"));
        }
        self.sv_at(slot)
            .ok_or_else(|| no_symbol(name, name, "a bound value", "a dangling slot"))
    }

    /// Resolve a package-qualified name (without sigil) to its glob.
    pub fn find_glob(&self, path: &str) -> Result<&Glob, Error> {
        self.walk_glob(path, path)
    }

    /// Resolve a package name to its stash.
    pub fn find_stash(&self, package: &str) -> Result<&Sv, Error> {
        let defstash = self
            .defstash()
            .ok_or_else(|| no_symbol(package, "", "the default stash", "nothing"))?;
        if package.is_empty() || package == "main" {
            return Ok(defstash);
        }
        let glob = self.walk_glob(package, &format!("{}::", package))?;
        // A `Foo::` glob's hash slot is the stash itself.
        self.sv_at(glob.hash_at)
            .filter(|sv| sv.as_stash().is_some())
            .ok_or_else(|| no_symbol(package, package, "a stash", "no hash slot"))
    }

    fn walk_glob<'a>(&'a self, symbol: &str, path: &str) -> Result<&'a Glob, Error> {
        let mut segments = path.split("::").peekable();
        // An empty leading segment names the default package.
        if segments.peek() == Some(&"") {
            let _ = segments.next();
        }
        let mut segments: Vec<&str> = segments.collect();
        // A trailing `::` leaves an empty final segment behind; fold it into
        // the last real one so `Foo::` resolves the `Foo::` key.
        if segments.last() == Some(&"") && segments.len() > 1 {
            let _ = segments.pop();
            if let Some(last) = segments.last_mut() {
                *last = &path[path.len() - last.len() - 2..];
            }
        }
        let last = segments
            .pop()
            .ok_or_else(|| no_symbol(symbol, path, "a symbol name", "an empty path"))?;
        let mut stash = self
            .defstash()
            .and_then(Sv::as_stash)
            .ok_or_else(|| no_symbol(symbol, "", "the default stash", "nothing"))?;
        for segment in segments {
            let key = format!("{}::", segment);
            let entry = stash
                .hash
                .values
                .get(key.as_bytes())
                .copied()
                .ok_or_else(|| no_symbol(symbol, &key, "a stash entry", "no entry"))?;
            let glob = self
                .sv_at(entry)
                .and_then(Sv::as_glob)
                .ok_or_else(|| no_symbol(symbol, &key, "a glob", "another kind"))?;
            stash = self
                .sv_at(glob.hash_at)
                .and_then(Sv::as_stash)
                .ok_or_else(|| no_symbol(symbol, &key, "a stash", "no hash slot"))?;
        }
        let entry = stash
            .hash
            .values
            .get(last.as_bytes())
            .copied()
            .ok_or_else(|| no_symbol(symbol, last, "a stash entry", "no entry"))?;
        self.sv_at(entry)
            .and_then(Sv::as_glob)
            .ok_or_else(|| no_symbol(symbol, last, "a glob", "another kind"))
    }
}

fn no_symbol(symbol: &str, segment: &str, expected: &'static str, found: &str) -> Error {
    Error::NoSuchSymbol {
        symbol: symbol.to_string(),
        segment: segment.to_string(),
        expected,
        found: found.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use crate::test::sample_dump;
    use crate::test::world::*;
    use crate::Error;

    #[test]
    fn package_scalar_resolves_under_every_spelling() {
        let dump = sample_dump();
        for name in [
            "$PACKAGE_SCALAR",
            "$::PACKAGE_SCALAR",
            "$main::PACKAGE_SCALAR",
        ] {
            let sv = dump.find_symbol(name).expect(name);
            assert_eq!(PKG_SCALAR, sv.addr, "{name}");
            let scalar = sv.as_scalar().expect("scalar");
            assert_eq!(Some(b"some value".as_slice()), scalar.pv.as_deref());
        }
    }

    #[test]
    fn sigils_select_glob_slots() {
        let dump = sample_dump();
        assert_eq!(AOFA, dump.find_symbol("@AofA").expect("array").addr);
        assert_eq!(
            PROTO_CV,
            dump.find_symbol("&make_closure").expect("code").addr
        );
        // The hash slot of the main:: self-glob is the default stash.
        assert_eq!(DEFSTASH, dump.find_symbol("%main::").expect("stash").addr);
    }

    #[test]
    fn find_stash_walks_the_tree() {
        let dump = sample_dump();
        assert_eq!(DEFSTASH, dump.find_stash("main").expect("main").addr);
        assert_eq!(DEFSTASH, dump.find_stash("").expect("default").addr);
    }

    #[test]
    fn missing_symbols_carry_context() {
        let dump = sample_dump();
        match dump.find_symbol("$nonexistent") {
            Err(Error::NoSuchSymbol {
                symbol, segment, ..
            }) => {
                assert_eq!("$nonexistent", symbol);
                assert_eq!("nonexistent", segment);
            }
            other => panic!("expected NoSuchSymbol, got {:?}", other.map(|_| ())),
        }
        match dump.find_symbol("$Missing::x") {
            Err(Error::NoSuchSymbol { segment, .. }) => assert_eq!("Missing::", segment),
            other => panic!("expected NoSuchSymbol, got {:?}", other.map(|_| ())),
        }
        match dump.find_symbol("no_sigil") {
            Err(Error::NoSuchSymbol { expected, .. }) => {
                assert_eq!("a leading sigil", expected)
            }
            other => panic!("expected NoSuchSymbol, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn an_unbound_slot_is_not_a_symbol() {
        let dump = sample_dump();
        // make_closure has no scalar slot.
        assert!(dump.find_symbol("$make_closure").is_err());
    }
}
