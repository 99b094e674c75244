//! Worker thread for parallel processing
//!
//! Contains the worker loop that applies the user function to every item of
//! a chunk and sends back one result chunk per input chunk.

use crossbeam_channel::{select, Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::cancel::CancelToken;
use super::error::{BoxError, PanicError};
use super::types::{Chunk, FaultInfo, IndexedItem, WorkResult};

/// The user function after its error type has been boxed
pub(crate) type MapFn<T, V> = Arc<dyn Fn(T) -> Result<V, BoxError> + Send + Sync>;

/// Worker thread: processes chunks until the input channel closes
///
/// Returns the number of chunks it completed.
pub(crate) fn worker_thread<T, V>(
    worker_id: usize,
    chunk_receiver: Receiver<Chunk<IndexedItem<T>>>,
    result_sender: Sender<Chunk<WorkResult<V>>>,
    func: MapFn<T, V>,
    cancel: CancelToken,
) -> usize {
    let mut completed = 0usize;

    'worker_loop: loop {
        select! {
            recv(cancel.signal()) -> _ => break 'worker_loop,
            recv(chunk_receiver) -> msg => {
                let chunk = match msg {
                    Ok(chunk) => chunk,
                    Err(_) => break 'worker_loop,
                };

                let Some(results) = worker_process_chunk(chunk, func.as_ref(), &cancel) else {
                    break 'worker_loop;
                };

                if result_sender.send(results).is_err() {
                    // Manager is gone, nobody will read further results
                    break 'worker_loop;
                }
                completed += 1;
            }
        }
    }

    tracing::debug!(worker_id, chunks = completed, "worker exiting");
    completed
}

/// Apply the function to each item; `None` when cancelled part-way
fn worker_process_chunk<T, V>(
    chunk: Chunk<IndexedItem<T>>,
    func: &(dyn Fn(T) -> Result<V, BoxError> + Send + Sync),
    cancel: &CancelToken,
) -> Option<Chunk<WorkResult<V>>> {
    let mut results = Vec::with_capacity(chunk.len());
    for item in chunk {
        if cancel.is_cancelled() {
            return None;
        }
        results.push(apply_item(item, func));
    }
    Some(results)
}

/// Run the function on one item, turning errors and panics into faults
pub(crate) fn apply_item<T, V>(
    item: IndexedItem<T>,
    func: &(dyn Fn(T) -> Result<V, BoxError> + Send + Sync),
) -> WorkResult<V> {
    let IndexedItem { index, value } = item;
    match panic::catch_unwind(AssertUnwindSafe(|| func(value))) {
        Ok(Ok(output)) => WorkResult::success(index, output),
        Ok(Err(error)) => WorkResult::failure(index, FaultInfo::new(error)),
        Err(payload) => {
            let error: BoxError = Box::new(PanicError::from_payload(payload));
            WorkResult::failure(index, FaultInfo::new(error))
        }
    }
}
