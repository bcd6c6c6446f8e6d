use std::io::BufWriter;
use std::io::Write;
use std::path::PathBuf;

use colored::Colorize;
use fs_err::File;
use pmat::Context;
use pmat::Dumpfile;

use crate::formatting::sv_brief;

#[derive(clap::Args)]
pub struct CallstackArgs {
    /// Dump file.
    #[clap(value_name = "PMAT file")]
    file: PathBuf,
}

pub fn callstack(args: CallstackArgs) -> Result<(), Box<dyn std::error::Error>> {
    let dump = Dumpfile::read(std::io::BufReader::new(File::open(&args.file)?))?;
    let mut writer = BufWriter::new(std::io::stdout());
    if dump.contexts.is_empty() {
        writeln!(writer, "no call contexts were dumped")?;
    }
    for (i, context) in dump.contexts.iter().enumerate() {
        let location = format!(
            "at {} line {}",
            context
                .file()
                .map(|f| String::from_utf8_lossy(f).into_owned())
                .unwrap_or_else(|| "(unknown)".to_string()),
            context.line()
        );
        let what = match context {
            Context::Sub { cv_at, .. } => format!("sub {}", sv_brief(&dump, *cv_at)),
            Context::Try { .. } => "try block".to_string(),
            Context::Eval { code_at, .. } => format!("eval {}", sv_brief(&dump, *code_at)),
        };
        let frame = format!("#{i}");
        writeln!(
            writer,
            "{} {} {} [{}]",
            frame.as_str().bold(),
            what,
            location,
            context.gimme()
        )?;
        if let Context::Sub { args_at, .. } = context {
            if *args_at != 0 {
                writeln!(writer, "   args: {}", sv_brief(&dump, *args_at))?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}
