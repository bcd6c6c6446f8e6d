#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod byte_order;
mod context;
mod dumpfile;
mod error;
mod fixup;
mod flags;
mod header;
mod identify;
mod io;
mod layout;
mod reachability;
mod refs;
mod sv;
mod symbols;
#[cfg(test)]
pub(crate) mod test;

pub use self::byte_order::*;
pub use self::context::*;
pub use self::dumpfile::*;
pub use self::error::*;
pub use self::flags::*;
pub use self::header::*;
pub use self::identify::*;
pub use self::io::*;
pub use self::layout::*;
pub use self::reachability::*;
pub use self::refs::*;
pub use self::sv::*;
pub use self::symbols::*;
