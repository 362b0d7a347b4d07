//
// ioreplay CLI
//
//! Sequential benchmarks, trace replay and trace analysis.
//!
//! Examples:
//! ```bash
//! ioreplay --mode read  --nb_run 1000 --sz_bloc 4k --data-file /tmp/iortest.file
//! ioreplay --mode write --nb_bloc 8 --sz_bloc 1s --filesize 1G
//! ioreplay --mode replay --trace-file filtered_trace.log --data-file /dev/sdb -v
//! ioreplay --mode analyze --trace-file filtered_trace.log
//! ```

use anyhow::{bail, Result};
use clap::error::ErrorKind as ClapErrorKind;
use clap::{ArgAction, Parser};
use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ioreplay::analysis::OffsetDistribution;
use ioreplay::config::parse_size_arg;
use ioreplay::constants::{
    DEFAULT_DATA_FILE, DEFAULT_DATA_FILE_SIZE, DEFAULT_HISTOGRAM_BINS, DEFAULT_NB_BLOC,
    DEFAULT_NB_RUN, DEFAULT_SZ_BLOC,
};
use ioreplay::report::{format_stats, seek_line, summary_line, RunReport};
use ioreplay::{
    bench, codec, replay_file, sample_log, BenchConfig, BenchMode, CachePolicy, FileTargetConfig,
    IoReplayError, OpKind, ReplayConfig, ReplayOutcome,
};

/// Macro to safely print with broken pipe handling
macro_rules! safe_println {
    ($($arg:tt)*) => {
        match writeln!(io::stdout(), $($arg)*) {
            Ok(_) => {},
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                // Gracefully exit on broken pipe (e.g., when piped to head/tail)
                std::process::exit(0);
            }
            Err(e) => return Err(e.into())
        }
    };
}

#[derive(Parser)]
#[command(author, version, about = "Replay captured file I/O and measure per-operation latency")]
struct Cli {
    /// Increase log verbosity: -v = Info, -vv = Debug
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    #[arg(long, value_enum, default_value_t = BenchMode::Read)]
    mode: BenchMode,

    /// Filtered trace (replay, analyze)
    #[arg(long = "trace-file", value_name = "PATH")]
    trace_file: Option<PathBuf>,

    /// Data file or block device to run against
    #[arg(long = "data-file", value_name = "PATH")]
    data_file: Option<PathBuf>,

    /// Number of operations (read/write)
    #[arg(long = "nb_run", default_value_t = DEFAULT_NB_RUN)]
    nb_run: usize,

    /// Blocks per operation (read/write)
    #[arg(long = "nb_bloc", default_value_t = DEFAULT_NB_BLOC)]
    nb_bloc: usize,

    /// Block size, e.g. 512, 8s, 4k, 1M (read/write)
    #[arg(long = "sz_bloc", value_parser = parse_size_arg, default_value_t = DEFAULT_SZ_BLOC)]
    sz_bloc: u64,

    /// Data file size, e.g. 256M, 4G (read/write)
    #[arg(long = "filesize", value_parser = parse_size_arg, default_value_t = DEFAULT_DATA_FILE_SIZE)]
    filesize: u64,

    /// When to purge the page cache
    #[arg(long = "cache-policy", value_enum, default_value_t = CachePolicy::EveryOp)]
    cache_policy: CachePolicy,

    /// Use buffered I/O instead of O_DIRECT
    #[arg(long = "no-direct")]
    no_direct: bool,

    /// Write <prefix>_times.log, <prefix>_seek.log and <prefix>_timestamps.log
    #[arg(long = "log-prefix", value_name = "PREFIX")]
    log_prefix: Option<String>,

    /// Write latency and seek statistics as JSON
    #[arg(long = "report-json", value_name = "PATH")]
    report_json: Option<PathBuf>,

    /// Histogram bins (analyze)
    #[arg(long, default_value_t = DEFAULT_HISTOGRAM_BINS)]
    bins: usize,
}

impl Cli {
    fn target_config(&self) -> FileTargetConfig {
        FileTargetConfig { direct_io: !self.no_direct, ..Default::default() }
    }

    fn replay_config(&self) -> ReplayConfig {
        ReplayConfig { cache_policy: self.cache_policy, ..Default::default() }
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() -> ExitCode {
    // Loads any variables from .env file that are not already set
    dotenvy::dotenv().ok();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.mode {
        BenchMode::Read => run_bench(&cli, OpKind::Read),
        BenchMode::Write => run_bench(&cli, OpKind::Write),
        BenchMode::Replay => run_replay(&cli),
        BenchMode::Analyze => run_analyze(&cli),
    }
}

fn run_bench(cli: &Cli, kind: OpKind) -> Result<()> {
    let bench_config = BenchConfig {
        nb_run: cli.nb_run,
        nb_bloc: cli.nb_bloc,
        sz_bloc: cli.sz_bloc,
        data_file: cli.data_file.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE)),
        data_file_size: cli.filesize,
    };

    let outcome = bench::run_sequential(kind, &bench_config, &cli.target_config(), cli.replay_config())?;
    finish(cli, bench_config.nb_run, &outcome)
}

fn run_replay(cli: &Cli) -> Result<()> {
    let (Some(trace_path), Some(data_path)) = (&cli.trace_file, &cli.data_file) else {
        bail!(IoReplayError::Usage(
            "ioreplay --mode replay --trace-file <path> --data-file <path>".to_string()
        ));
    };

    info!("Loading trace from {:?}", trace_path);
    let trace = codec::load(trace_path)?;
    if trace.is_empty() {
        bail!(IoReplayError::NoOperations);
    }
    info!("{} requests loaded", trace.len());

    let outcome = replay_file(&trace, data_path, &cli.target_config(), cli.replay_config())?;
    finish(cli, trace.len(), &outcome)
}

fn run_analyze(cli: &Cli) -> Result<()> {
    let Some(trace_path) = &cli.trace_file else {
        bail!(IoReplayError::Usage("ioreplay --mode analyze --trace-file <path>".to_string()));
    };

    let trace = codec::load(trace_path)?;
    if trace.is_empty() {
        bail!(IoReplayError::NoOperations);
    }

    let distribution = OffsetDistribution::from_trace(&trace, cli.bins);
    safe_println!("{}", distribution.render());
    Ok(())
}

/// Print, log and export the results of a run
fn finish(cli: &Cli, planned: usize, outcome: &ReplayOutcome) -> Result<()> {
    info!("{} of {} requests executed", outcome.executed, planned);

    if let Some(prefix) = &cli.log_prefix {
        sample_log::log_outcome(prefix, outcome);
    }

    if outcome.executed == 0 {
        info!("No requests executed, no statistics");
        return Ok(());
    }

    let report = RunReport::new(planned, outcome);
    safe_println!("{}", format_stats(&report.latency_us));
    safe_println!("{}", summary_line(&report.latency_us));
    safe_println!("{}", seek_line(&report.seek_bytes));

    if let Some(path) = &cli.report_json {
        report.write_json(path)?;
        info!("Wrote JSON report to {:?}", path);
    }
    Ok(())
}
