use anyhow::Result;
use std::io::{self, Write};
use std::process;
use std::sync::atomic::{AtomicI32, Ordering};
use std::thread;

use chunkmap::CancelToken;

// Cross-platform signal handling
#[cfg(unix)]
use signal_hook::{consts::SIGINT, consts::SIGTERM, iterator::Signals};

#[cfg(windows)]
use signal_hook::{consts::SIGINT, flag};

/// Standard Unix exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InvalidUsage = 2,
    SignalInt = 130,  // 128 + SIGINT (2)
    SignalPipe = 141, // 128 + SIGPIPE (13)
    SignalTerm = 143, // 128 + SIGTERM (15)
}

impl ExitCode {
    pub fn exit(self) -> ! {
        process::exit(self as i32)
    }

    /// Exit code for a run stopped by `signal`
    pub fn for_signal(signal: i32) -> Self {
        if signal == signal_hook::consts::SIGTERM {
            ExitCode::SignalTerm
        } else {
            ExitCode::SignalInt
        }
    }
}

/// Number of the first signal that asked the current map to stop; 0 if none
static TERMINATING_SIGNAL: AtomicI32 = AtomicI32::new(0);

fn record_signal(signal: i32) {
    let _ = TERMINATING_SIGNAL.compare_exchange(0, signal, Ordering::SeqCst, Ordering::SeqCst);
}

/// Exit code matching the signal that stopped the run, if one did
pub fn signal_exit_code() -> Option<ExitCode> {
    match TERMINATING_SIGNAL.load(Ordering::SeqCst) {
        0 => None,
        signal => Some(ExitCode::for_signal(signal)),
    }
}

/// Signal handler that cancels the running map
///
/// The first SIGINT/SIGTERM cancels the token so workers stop after their
/// current item and partial output is flushed; a second one exits at once.
pub struct SignalHandler {
    _handle: thread::JoinHandle<()>,
}

impl SignalHandler {
    #[cfg(unix)]
    pub fn new(cancel: CancelToken) -> Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM])?;

        let handle = thread::spawn(move || {
            let mut shutdown_count = 0;
            for sig in signals.forever() {
                shutdown_count += 1;
                record_signal(sig);
                if shutdown_count > 1 {
                    ExitCode::for_signal(sig).exit();
                }
                tracing::warn!(signal = sig, "received signal, cancelling");
                cancel.cancel();
            }
        });

        Ok(SignalHandler { _handle: handle })
    }

    #[cfg(windows)]
    pub fn new(cancel: CancelToken) -> Result<Self> {
        // Windows signal handling using flag-based approach
        let term_flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        flag::register(SIGINT, std::sync::Arc::clone(&term_flag))?;

        let handle = thread::spawn(move || {
            let mut shutdown_count = 0;
            loop {
                thread::sleep(std::time::Duration::from_millis(100));
                if term_flag.swap(false, Ordering::Relaxed) {
                    shutdown_count += 1;
                    record_signal(SIGINT);
                    if shutdown_count > 1 {
                        ExitCode::SignalInt.exit();
                    }
                    cancel.cancel();
                }
            }
        });

        Ok(SignalHandler { _handle: handle })
    }
}

/// Safe wrapper for writing to stdout that handles broken pipes and other I/O errors
pub struct SafeStdout {
    stdout: io::BufWriter<io::Stdout>,
}

impl SafeStdout {
    pub fn new() -> Self {
        Self {
            stdout: io::BufWriter::new(io::stdout()),
        }
    }

    /// Write a line to stdout, handling broken pipes gracefully (cross-platform)
    pub fn writeln(&mut self, data: &str) -> Result<()> {
        match writeln!(self.stdout, "{}", data) {
            Ok(()) => Ok(()),
            Err(e) if is_broken_pipe(&e) => {
                // Broken pipe is normal in pipelines - exit quietly
                ExitCode::SignalPipe.exit();
            }
            Err(e) => Err(anyhow::anyhow!("Failed to write to stdout: {}", e)),
        }
    }

    /// Flush stdout, handling errors gracefully (cross-platform)
    pub fn flush(&mut self) -> Result<()> {
        match self.stdout.flush() {
            Ok(()) => Ok(()),
            Err(e) if is_broken_pipe(&e) => ExitCode::SignalPipe.exit(),
            Err(e) => Err(anyhow::anyhow!("Failed to flush stdout: {}", e)),
        }
    }
}

/// Unbuffered stderr for diagnostics and the stats summary
pub struct SafeStderr {
    stderr: io::Stderr,
}

impl SafeStderr {
    pub fn new() -> Self {
        Self {
            stderr: io::stderr(),
        }
    }

    /// Write a line to stderr; if even that fails there is nothing left to report to
    pub fn writeln(&mut self, data: &str) {
        if writeln!(self.stderr, "{}", data).is_err() {
            ExitCode::GeneralError.exit();
        }
    }
}

/// Cross-platform broken pipe detection
fn is_broken_pipe(e: &io::Error) -> bool {
    #[cfg(unix)]
    {
        e.kind() == io::ErrorKind::BrokenPipe
    }
    #[cfg(windows)]
    {
        // On Windows, broken pipe manifests as different error codes
        e.kind() == io::ErrorKind::BrokenPipe
            || e.raw_os_error() == Some(232) // ERROR_NO_DATA "The pipe is being closed"
            || e.raw_os_error() == Some(109) // ERROR_BROKEN_PIPE "The pipe has been ended"
    }
}
