use pmat::Dumpfile;
use pmat::SvBody;

/// `KIND at 0xADDR` plus whatever identity the dump can derive.
pub fn sv_brief(dump: &Dumpfile, addr: u64) -> String {
    let Some(sv) = dump.sv_at(addr) else {
        return format!("unknown object at {:#x}", addr);
    };
    let mut out = format!("{} at {:#x}", sv.kind(), addr);
    if let Some(identity) = dump.identity_of(addr) {
        out.push_str(&format!(" ({})", identity));
    }
    if let SvBody::Scalar(scalar) = &sv.body {
        if let Some(quoted) = scalar.quoted_pv() {
            out.push_str(&format!(" = {}", quoted));
        }
    }
    out
}

#[derive(clap::ValueEnum, Clone, Copy)]
pub enum TreeStyleKind {
    Ascii,
    Rounded,
}

impl TreeStyleKind {
    pub fn to_style(self) -> TreeStyle {
        match self {
            Self::Ascii => TREE_STYLE_ASCII,
            Self::Rounded => TREE_STYLE_ROUNDED,
        }
    }
}

/// Corner, horizontal bar, vertical rail, tee.
#[derive(Clone, Copy)]
pub struct TreeStyle(pub [char; 4]);

pub const TREE_STYLE_ASCII: TreeStyle = TreeStyle(['\\', '_', '|', '|']);
pub const TREE_STYLE_ROUNDED: TreeStyle = TreeStyle(['╰', '─', '│', '├']);
