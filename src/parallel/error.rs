//! Errors surfaced by `parallel_map`

use std::fmt;
use thiserror::Error;

/// Boxed error carried from the fault site to the caller
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors a consumer of the mapped sequence can observe
#[derive(Debug, Error)]
pub enum MapError {
    /// The user function failed on an item while errors were not ignored
    #[error("worker failed on item {index}")]
    Worker {
        index: usize,
        /// Error chain and backtrace rendered in the worker
        trace: String,
        #[source]
        source: BoxError,
    },

    /// The input sequence itself failed while errors were not ignored
    #[error("input source failed after {position} items")]
    Input {
        position: usize,
        #[source]
        source: BoxError,
    },

    #[error("invalid parallel map configuration: {0}")]
    InvalidConfig(String),

    #[error("parallel map was cancelled")]
    Cancelled,

    #[error("parallel map timed out")]
    TimedOut,

    /// Every worker exited while results were still outstanding
    #[error("worker pool disconnected before all results were delivered")]
    PoolDisconnected,
}

impl MapError {
    /// The original error for worker and input faults
    pub fn original_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            MapError::Worker { source, .. } | MapError::Input { source, .. } => {
                Some(source.as_ref())
            }
            _ => None,
        }
    }
}

/// A panic raised by the user function, captured as an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicError {
    pub message: String,
}

impl PanicError {
    pub(crate) fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&'static str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }
}

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panicked: {}", self.message)
    }
}

impl std::error::Error for PanicError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_worker_error_chains_original_cause() {
        let original = std::io::Error::new(std::io::ErrorKind::InvalidData, "bad record");
        let err = MapError::Worker {
            index: 3,
            trace: "bad record".to_string(),
            source: Box::new(original),
        };

        assert_eq!(err.to_string(), "worker failed on item 3");
        let source = err.source().expect("source should be set");
        let io = source
            .downcast_ref::<std::io::Error>()
            .expect("source should be the io error");
        assert_eq!(io.kind(), std::io::ErrorKind::InvalidData);
        assert!(err.original_error().is_some());
    }

    #[test]
    fn test_cause_absent_for_lifecycle_errors() {
        assert!(MapError::Cancelled.original_error().is_none());
        assert!(MapError::TimedOut.original_error().is_none());
        assert!(MapError::PoolDisconnected.source().is_none());
    }

    #[test]
    fn test_panic_error_from_payloads() {
        let static_payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(PanicError::from_payload(static_payload).message, "boom");

        let owned_payload: Box<dyn std::any::Any + Send> = Box::new(format!("item {}", 7));
        assert_eq!(PanicError::from_payload(owned_payload).message, "item 7");

        let other: Box<dyn std::any::Any + Send> = Box::new(42u32);
        assert_eq!(
            PanicError::from_payload(other).to_string(),
            "panicked: non-string panic payload"
        );
    }
}
