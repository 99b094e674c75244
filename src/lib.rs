//! Bounded, chunked parallel map over streaming iterators
//!
//! `chunkmap` applies a function to every element of an input iterator on a
//! fixed pool of worker threads. Input is pulled lazily in chunks, the
//! number of chunks in flight is bounded, and results are streamed back
//! either in input order or as soon as they are ready.
//!
//! ```no_run
//! use chunkmap::{parallel_map, ParallelConfig};
//!
//! let config = ParallelConfig::default().with_chunk_size(64);
//! let lengths = parallel_map(|line: String| Ok::<_, std::io::Error>(line.len()), vec![
//!     "alpha".to_string(),
//!     "beta".to_string(),
//! ], config)?;
//!
//! for length in lengths {
//!     println!("{:?}", length?);
//! }
//! # Ok::<(), chunkmap::MapError>(())
//! ```
//!
//! Faults raised by the function (or panics) either stop the map with a
//! [`MapError`] or, with `ignore_errors`, are logged through `tracing` and
//! replaced by `None` at their position.

pub mod parallel;
pub mod stats;

pub use parallel::{
    parallel_map, try_parallel_map, BoxError, CancelToken, InputFaultPolicy, MapError,
    ParallelConfig, ParallelMap, ParallelMapExt, PanicError,
};
pub use stats::MapStats;
