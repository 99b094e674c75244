use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use chunkmap::{try_parallel_map, MapError};

mod cli;
mod config_file;
mod decompression;
mod ops;
mod platform;
mod readers;

use cli::Cli;
use platform::{ExitCode, SafeStderr, SafeStdout, SignalHandler};

/// Environment variable holding a `tracing` filter directive
const LOG_ENV: &str = "CHUNKMAP_LOG";

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    // A second init (tests) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn report_map_error(stderr: &mut SafeStderr, err: &MapError) {
    stderr.writeln(&format!("chunkmap: Error: {}", err));
    if let Some(cause) = err.original_error() {
        stderr.writeln(&format!("  caused by: {}", cause));
    }
    if let MapError::Worker { trace, .. } = err {
        tracing::debug!(trace = %trace, "worker fault trace");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut stderr = SafeStderr::new();

    let (file_config, config_path) = match config_file::load_config(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            stderr.writeln(&format!("chunkmap: Error: {:#}", e));
            ExitCode::InvalidUsage.exit();
        }
    };
    if let Some(path) = &config_path {
        tracing::debug!(path = %path.display(), "loaded config file");
    }

    let config = match cli.apply_to(file_config) {
        Ok(config) => config,
        Err(e) => {
            stderr.writeln(&format!("chunkmap: Error: {}", e));
            ExitCode::InvalidUsage.exit();
        }
    };

    let mut inputs = Vec::new();
    for path in cli.input_paths() {
        match decompression::open_input(&path) {
            Ok(reader) => inputs.push(reader),
            Err(e) => {
                stderr.writeln(&format!("chunkmap: Error: {:#}", e));
                ExitCode::GeneralError.exit();
            }
        }
    }
    let lines = inputs.into_iter().flat_map(readers::LineReader::new);

    let op = cli.op;
    let mut results = match try_parallel_map(move |line: String| op.apply(&line), lines, config)
    {
        Ok(results) => results,
        Err(e) => {
            stderr.writeln(&format!("chunkmap: Error: {}", e));
            ExitCode::InvalidUsage.exit();
        }
    };

    let _signal_handler = match SignalHandler::new(results.cancel_token()) {
        Ok(handler) => handler,
        Err(e) => {
            stderr.writeln(&format!("Failed to initialize signal handling: {}", e));
            ExitCode::GeneralError.exit();
        }
    };

    let mut stdout = SafeStdout::new();
    let mut failure = None;
    for item in results.by_ref() {
        match item {
            Ok(Some(line)) => stdout.writeln(&line)?,
            Ok(None) => stdout.writeln(&cli.null_text)?,
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }
    stdout.flush()?;

    if cli.stats {
        stderr.writeln(&results.stats().to_string());
    }
    drop(results);

    match (failure, platform::signal_exit_code()) {
        (None, _) => ExitCode::Success.exit(),
        (Some(MapError::Cancelled), Some(signal_code)) => signal_code.exit(),
        (Some(e), _) => {
            report_map_error(&mut stderr, &e);
            ExitCode::GeneralError.exit()
        }
    }
}
