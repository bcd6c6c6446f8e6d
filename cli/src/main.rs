use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

mod callstack;
mod formatting;
mod identify;
mod sizes;

use self::callstack::callstack;
use self::callstack::CallstackArgs;
use self::identify::identify;
use self::identify::IdentifyArgs;
use self::sizes::sizes;
use self::sizes::SizesArgs;

#[derive(clap::Parser)]
#[clap(version)]
struct Args {
    /// Verbose output.
    #[clap(short = 'v', long = "verbose")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Trace a value back to the named roots.
    Identify(IdentifyArgs),
    /// Report object counts and sizes by kind.
    Sizes(SizesArgs),
    /// Print the dumped call stack.
    Callstack(CallstackArgs),
}

fn main() -> ExitCode {
    match do_main() {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn do_main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let max_level = if args.verbose {
        LevelFilter::Trace
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(max_level)
        .format_timestamp(None)
        .format_target(false)
        .init();
    match args.command {
        Command::Identify(identify_args) => identify(identify_args),
        Command::Sizes(sizes_args) => sizes(sizes_args),
        Command::Callstack(callstack_args) => callstack(callstack_args),
    }
}
