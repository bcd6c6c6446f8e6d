use std::io::BufWriter;
use std::io::Write;
use std::path::PathBuf;

use colored::Colorize;
use fs_err::File;
use pmat::Dumpfile;
use pmat::SvKind;

#[derive(clap::Args)]
pub struct SizesArgs {
    /// Which size to account: the bytes the producer owned, or those plus
    /// the reconstructed body tables.
    #[clap(long = "size", value_name = "KIND", default_value = "owned")]
    size: SizeKind,

    /// Dump file.
    #[clap(value_name = "PMAT file")]
    file: PathBuf,
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum SizeKind {
    Owned,
    Structure,
}

pub fn sizes(args: SizesArgs) -> Result<(), Box<dyn std::error::Error>> {
    let dump = Dumpfile::read(std::io::BufReader::new(File::open(&args.file)?))?;
    let table = dump.kind_totals(matches!(args.size, SizeKind::Structure));
    let mut rows: Vec<(SvKind, u64, u64)> = table
        .into_iter()
        .map(|(kind, (count, bytes))| (kind, count, bytes))
        .collect();
    rows.sort_by(|a, b| b.2.cmp(&a.2));
    let mut writer = BufWriter::new(std::io::stdout());
    writeln!(
        writer,
        "{:>10} {:>10} {:>12}",
        "Kind".bold(),
        "Count".bold(),
        "Bytes".bold()
    )?;
    let mut total_count = 0;
    let mut total_bytes = 0;
    for (kind, count, bytes) in rows {
        writeln!(writer, "{:>10} {:>10} {:>12}", kind.to_string(), count, bytes)?;
        total_count += count;
        total_bytes += bytes;
    }
    writeln!(
        writer,
        "{:>10} {:>10} {:>12}",
        "total".bold(),
        total_count,
        total_bytes
    )?;
    writer.flush()?;
    Ok(())
}
