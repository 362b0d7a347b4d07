//
// filter-traces: syscall log -> filtered trace
//
//! Keeps the single-block, sector-aligned `read`/`write` calls of an
//! `strace -f -y` log and prints them in the format `ioreplay --mode replay`
//! loads.
//!
//! ```bash
//! strace -f -y -e trace=read,write,lseek -o app.strace ./app
//! filter-traces app.strace > filtered_trace.log
//! filter-traces app.strace.zst --output filtered_trace.log.zst
//! ```

use anyhow::Result;
use clap::{ArgAction, Parser};
use std::io::{self, BufWriter, ErrorKind};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use ioreplay::constants::{BLOCK_SIZE, DEFAULT_MAX_DESCRIPTORS};
use ioreplay::{codec, ParserConfig, TraceParser};

#[derive(Parser)]
#[command(author, version, about = "Extract replayable I/O operations from a syscall log")]
struct Cli {
    /// Increase log verbosity: -v = Info, -vv = Debug
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Syscall log (.zst accepted)
    log: PathBuf,

    /// Write here instead of stdout (.zst compresses)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Descriptors at or above this number are ignored
    #[arg(long = "max-fd", default_value_t = DEFAULT_MAX_DESCRIPTORS)]
    max_fd: i64,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut parser = TraceParser::with_config(ParserConfig {
        block_size: BLOCK_SIZE,
        max_descriptors: cli.max_fd,
    });
    let trace = parser.parse_file(&cli.log)?;

    match &cli.output {
        Some(path) => codec::save(&trace, path)?,
        None => match codec::encode(&trace, BufWriter::new(io::stdout().lock())) {
            Ok(()) => {}
            // Piped into head/tail
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
            Err(e) => return Err(e.into()),
        },
    }
    Ok(())
}
