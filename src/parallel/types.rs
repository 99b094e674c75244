//! Type definitions for parallel processing
//!
//! Contains the items, chunks and results exchanged between the manager and
//! the workers, plus the configuration of a single `parallel_map` call.

use serde::Deserialize;
use std::time::Duration;

use super::error::{BoxError, MapError};

/// Upper bound for automatically chosen chunk sizes
pub const MAX_AUTO_CHUNK_SIZE: usize = 1024;

/// Chunks per worker targeted by the automatic chunk size
const AUTO_CHUNKS_PER_WORKER: usize = 4;

/// An input element paired with its zero-based position in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedItem<T> {
    pub index: usize,
    pub value: T,
}

/// A bounded group of items dispatched or returned as one unit
pub type Chunk<X> = Vec<X>;

/// Diagnostic information for a failed item, safe to move across threads
///
/// The trace is rendered to text on the worker that recorded the failure,
/// so nothing tied to that thread has to travel with it.
#[derive(Debug)]
pub struct FaultInfo {
    pub error: BoxError,
    pub trace: String,
}

impl FaultInfo {
    pub fn new(error: BoxError) -> Self {
        let trace = render_trace(error.as_ref());
        Self { error, trace }
    }
}

/// Outcome of applying the user function to one item
///
/// `value` is `None` exactly when `fault` is `Some`.
#[derive(Debug)]
pub struct WorkResult<V> {
    pub index: usize,
    pub value: Option<V>,
    pub fault: Option<FaultInfo>,
}

impl<V> WorkResult<V> {
    pub fn success(index: usize, value: V) -> Self {
        Self {
            index,
            value: Some(value),
            fault: None,
        }
    }

    pub fn failure(index: usize, fault: FaultInfo) -> Self {
        Self {
            index,
            value: None,
            fault: Some(fault),
        }
    }
}

/// What the chunker does with the source after it yields an error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFaultPolicy {
    /// Treat the source as exhausted after its first error
    #[default]
    Stop,
    /// Keep pulling from the source; only valid for sources that stay
    /// consistent after an error (line readers, for example)
    Resume,
}

/// Configuration for parallel processing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// Items per chunk; `None` picks a size from the input's length hint
    pub chunk_size: Option<usize>,
    pub num_workers: usize,
    pub unordered: bool,
    pub ignore_errors: bool,
    /// Capacity of the input channel, in chunks
    pub queue_capacity: Option<usize>,
    pub input_fault_policy: InputFaultPolicy,
    #[serde(with = "humantime_serde_opt")]
    pub timeout: Option<Duration>,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            chunk_size: None,
            num_workers: num_cpus::get(),
            unordered: false,
            ignore_errors: false,
            queue_capacity: None,
            input_fault_policy: InputFaultPolicy::Stop,
            timeout: None,
        }
    }
}

impl ParallelConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    pub fn with_unordered(mut self, unordered: bool) -> Self {
        self.unordered = unordered;
        self
    }

    pub fn with_ignore_errors(mut self, ignore_errors: bool) -> Self {
        self.ignore_errors = ignore_errors;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn with_input_fault_policy(mut self, policy: InputFaultPolicy) -> Self {
        self.input_fault_policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reject settings that would stall or never dispatch anything
    pub fn validate(&self) -> Result<(), MapError> {
        if self.num_workers == 0 {
            return Err(MapError::InvalidConfig(
                "num_workers must be at least 1".to_string(),
            ));
        }
        if self.chunk_size == Some(0) {
            return Err(MapError::InvalidConfig(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == Some(0) {
            return Err(MapError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Chunk size to use for an input with the given `size_hint`
    pub fn effective_chunk_size(&self, size_hint: (usize, Option<usize>)) -> usize {
        if let Some(size) = self.chunk_size {
            return size;
        }
        match size_hint {
            (lower, Some(upper)) if lower == upper => {
                let target_chunks = self.num_workers.max(1) * AUTO_CHUNKS_PER_WORKER;
                (upper / target_chunks).clamp(1, MAX_AUTO_CHUNK_SIZE)
            }
            _ => 1,
        }
    }

    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity
            .unwrap_or_else(|| self.num_workers.max(1) * 2)
    }
}

/// Heading placed before the backtrace section of a rendered trace
pub(crate) const RECORDED_AT: &str = "fault recorded at:";

/// Render an error chain, plus a backtrace when capture is enabled
///
/// The backtrace is taken here, so it shows where the fault was recorded
/// (the worker's call into the user function, or the coordinator reading
/// the input) rather than where the error value was created.
pub(crate) fn render_trace(error: &(dyn std::error::Error + 'static)) -> String {
    let mut trace = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        trace.push_str("\n  caused by: ");
        trace.push_str(&cause.to_string());
        source = cause.source();
    }

    let backtrace = std::backtrace::Backtrace::capture();
    if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
        trace.push('\n');
        trace.push_str(RECORDED_AT);
        trace.push('\n');
        trace.push_str(&backtrace.to_string());
    }
    trace
}

/// `Option<Duration>` as a humantime string ("30s", "5m") in config files
mod humantime_serde_opt {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|text| humantime::parse_duration(&text).map_err(serde::de::Error::custom))
            .transpose()
    }
}
