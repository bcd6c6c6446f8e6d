use std::collections::BTreeSet;
use std::io::BufWriter;
use std::io::Write;
use std::path::PathBuf;

use colored::Colorize;
use fs_err::File;
use pmat::Dumpfile;
use pmat::InrefGraph;
use pmat::Strength;
use pmat::StrengthFilter;

use crate::formatting::sv_brief;
use crate::formatting::TreeStyle;
use crate::formatting::TreeStyleKind;

#[derive(clap::Args)]
pub struct IdentifyArgs {
    /// How many reference levels to walk; 0 means unlimited.
    #[clap(short = 'd', long = "depth", value_name = "NUM", default_value_t = 10)]
    depth: usize,

    /// Include weak references in the trace.
    #[clap(action, long = "weak")]
    weak: bool,

    /// Include references of every strength.
    #[clap(action, long = "all")]
    all: bool,

    /// Tree visual style.
    #[clap(
        short = 's',
        long = "style",
        value_name = "STYLE",
        default_value = "rounded"
    )]
    style: TreeStyleKind,

    /// Dump file.
    #[clap(value_name = "PMAT file")]
    file: PathBuf,

    /// Address of the value, hexadecimal.
    #[clap(value_name = "ADDR")]
    addr: String,
}

pub fn identify(args: IdentifyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let addr = parse_addr(&args.addr)?;
    let dump = Dumpfile::read(std::io::BufReader::new(File::open(&args.file)?))?;
    let filter = if args.all {
        StrengthFilter::ALL
    } else if args.weak {
        StrengthFilter::DIRECT
    } else {
        StrengthFilter::STRONG
    };
    let depth = if args.depth == 0 {
        None
    } else {
        Some(args.depth)
    };
    let graph = dump.inref_graph(addr, depth, filter);
    let mut writer = BufWriter::new(std::io::stdout());
    let brief = sv_brief(&dump, addr);
    writeln!(writer, "{}", brief.as_str().bold())?;
    let style = args.style.to_style();
    let mut on_path = BTreeSet::new();
    on_path.insert(addr);
    print_node(
        &mut writer,
        &dump,
        &graph,
        addr,
        &mut Vec::new(),
        &mut on_path,
        style,
    )?;
    writer.flush()?;
    Ok(())
}

fn parse_addr(input: &str) -> Result<u64, Box<dyn std::error::Error>> {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    Ok(u64::from_str_radix(digits, 16)?)
}

// Renders the inbound edges of one node as tree branches, recursing towards
// the roots.
fn print_node<W: Write>(
    writer: &mut W,
    dump: &Dumpfile,
    graph: &InrefGraph,
    addr: u64,
    rails: &mut Vec<bool>,
    on_path: &mut BTreeSet<u64>,
    style: TreeStyle,
) -> Result<(), std::io::Error> {
    let Some(node) = graph.node(addr) else {
        return print_line(writer, rails, true, "not found", style);
    };
    let total = node.edges.len() + node.roots.len();
    if total == 0 {
        return print_line(writer, rails, true, "not referenced", style);
    }
    for (i, edge) in node.edges.iter().enumerate() {
        let last = i + 1 == total;
        let qualifier = match edge.strength {
            Strength::Strong => "",
            Strength::Weak => " (weak)",
            Strength::Indirect => " (via RV)",
            Strength::Inferred => " (inferred)",
        };
        let recurse = !edge.cycle && !on_path.contains(&edge.owner_at);
        let suffix = if recurse { ", which is:" } else { " (circular)" };
        let line = format!(
            "{}{} of {}{}",
            edge.name,
            qualifier,
            sv_brief(dump, edge.owner_at),
            suffix
        );
        print_line(writer, rails, last, &line, style)?;
        if recurse {
            on_path.insert(edge.owner_at);
            rails.push(last);
            print_node(writer, dump, graph, edge.owner_at, rails, on_path, style)?;
            rails.pop();
            on_path.remove(&edge.owner_at);
        }
    }
    for (i, root) in node.roots.iter().enumerate() {
        let last = node.edges.len() + i + 1 == total;
        let line = if root == pmat::EDEPTH {
            "(depth limit reached)".dimmed().to_string()
        } else {
            format!("{}: {}", "a root".green(), root)
        };
        print_line(writer, rails, last, &line, style)?;
    }
    Ok(())
}

fn print_line<W: Write>(
    writer: &mut W,
    rails: &[bool],
    last: bool,
    text: &str,
    style: TreeStyle,
) -> Result<(), std::io::Error> {
    for rail_last in rails {
        if *rail_last {
            write!(writer, "   ")?;
        } else {
            write!(writer, "{}  ", style.0[2])?;
        }
    }
    let ch = if last { style.0[0] } else { style.0[3] };
    writeln!(writer, "{}{} {}", ch, style.0[1], text)?;
    Ok(())
}
