//! Parallel map engine for chunkmap
//!
//! Applies a function to every element of a (possibly unbounded) iterator
//! on a fixed pool of worker threads and streams the results back without
//! holding the whole input or output in memory.
//!
//! # Module Structure
//!
//! - `types`: Items, chunks, results and configuration
//! - `error`: Errors surfaced to the consumer
//! - `cancel`: Cancellation token shared with the workers
//! - `batching`: Lazy chunking of the input with global indices
//! - `worker`: Worker thread applying the function per item
//! - `pool`: Fixed-size pool sharing one input and one output channel
//! - `sink`: Reorder buffer for ordered delivery
//! - `processor`: `ParallelMap`, the feed/collect coordinator
//! - `ext`: `ParallelMapExt` iterator extension

mod batching;
mod cancel;
mod error;
mod ext;
mod pool;
mod processor;
mod sink;
mod types;
mod worker;

// Re-export public types
pub use batching::{Chunker, InputFault};
pub use cancel::CancelToken;
pub use error::{BoxError, MapError, PanicError};
pub use ext::ParallelMapExt;
pub use processor::{parallel_map, try_parallel_map, ParallelMap};
pub use types::{
    Chunk, FaultInfo, IndexedItem, InputFaultPolicy, ParallelConfig, WorkResult,
    MAX_AUTO_CHUNK_SIZE,
};
