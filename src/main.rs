use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ustar_stream::{pack, unpack};

/// Pack directory trees into ustar archives and unpack them again
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Log every entry as it is processed
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an archive from everything below ROOT (.tar.gz/.tgz is compressed)
    Pack { tarfile: PathBuf, root: PathBuf },
    /// Extract an archive, plain or gzip, into DIR
    Unpack {
        tarfile: PathBuf,
        dir: PathBuf,
        /// Replace files that already exist
        #[arg(long)]
        overwrite: bool,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match &args.command {
        Command::Pack { tarfile, root } => pack(tarfile, root),
        Command::Unpack {
            tarfile,
            dir,
            overwrite,
        } => unpack(tarfile, dir, *overwrite),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
