// Command-line interface definitions

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use chunkmap::ParallelConfig;

use crate::ops::LineOp;

#[derive(Parser, Debug)]
#[command(name = "chunkmap")]
#[command(about = "Apply a line operation to every input line on a pool of worker threads")]
#[command(
    long_about = "Apply a line operation to every input line on a pool of worker threads\n\nInput is read lazily in chunks and results are streamed out as they complete,\nin input order unless --unordered is given.\n\nCOMMON EXAMPLES:\n  chunkmap --op sha256 access.log\n  chunkmap --op json --ignore-errors events.jsonl.gz\n  cat words.txt | chunkmap --op upper --threads 4 --unordered"
)]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Input files (stdin if not specified, or use "-" to explicitly specify stdin)
    pub files: Vec<String>,

    /// Operation applied to each line
    #[arg(short = 'o', long = "op", value_enum)]
    pub op: LineOp,

    /// Lines grouped per dispatch unit (default: 1 for streamed input)
    #[arg(long = "chunk-size", help_heading = "Performance Options")]
    pub chunk_size: Option<usize>,

    /// Number of worker threads (default: number of CPUs)
    #[arg(short = 'j', long = "threads", help_heading = "Performance Options")]
    pub threads: Option<usize>,

    /// Chunks queued ahead of the workers before reading pauses
    #[arg(long = "queue-capacity", help_heading = "Performance Options")]
    pub queue_capacity: Option<usize>,

    /// Emit results as they complete instead of in input order
    #[arg(long = "unordered", help_heading = "Performance Options")]
    pub unordered: bool,

    /// Log failing lines and print --null-text in their place instead of stopping
    #[arg(long = "ignore-errors", help_heading = "Error Handling")]
    pub ignore_errors: bool,

    /// Placeholder printed for lines whose operation failed under --ignore-errors
    #[arg(long = "null-text", default_value = "null", help_heading = "Error Handling")]
    pub null_text: String,

    /// Stop after this long, e.g. "30s" or "5m"
    #[arg(long = "timeout", value_parser = humantime::parse_duration, help_heading = "Error Handling")]
    pub timeout: Option<Duration>,

    /// JSON file with default settings (default: nearest .chunkmap.json)
    #[arg(long = "config", help_heading = "Configuration")]
    pub config: Option<PathBuf>,

    /// Print processing statistics to stderr when done
    #[arg(short = 's', long = "stats", help_heading = "Output Options")]
    pub stats: bool,

    /// Enable debug logging (CHUNKMAP_LOG overrides)
    #[arg(short = 'v', long = "verbose", help_heading = "Output Options")]
    pub verbose: bool,
}

impl Cli {
    /// Layer command-line flags over the file defaults
    pub fn apply_to(&self, mut config: ParallelConfig) -> Result<ParallelConfig> {
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = Some(chunk_size);
        }
        if let Some(threads) = self.threads {
            config.num_workers = threads;
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = Some(capacity);
        }
        if self.unordered {
            config.unordered = true;
        }
        if self.ignore_errors {
            config.ignore_errors = true;
        }
        if self.timeout.is_some() {
            config.timeout = self.timeout;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn input_paths(&self) -> Vec<String> {
        if self.files.is_empty() {
            vec!["-".to_string()]
        } else {
            self.files.clone()
        }
    }
}
