//! Fixed-size worker pool
//!
//! All workers share one bounded input channel (many consumers) and one
//! output channel (many producers). Each dispatched chunk is received by
//! exactly one worker; result chunks come back in completion order.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::thread::{self, JoinHandle};

use super::cancel::CancelToken;
use super::types::{Chunk, IndexedItem, WorkResult};
use super::worker::{worker_thread, MapFn};

/// Result chunks buffered per worker before workers block on send
const RESULT_SLOTS_PER_WORKER: usize = 4;

pub(crate) struct WorkerPool<T, V> {
    chunk_sender: Option<Sender<Chunk<IndexedItem<T>>>>,
    result_receiver: Option<Receiver<Chunk<WorkResult<V>>>>,
    handles: Vec<JoinHandle<usize>>,
    cancel: CancelToken,
}

impl<T, V> WorkerPool<T, V>
where
    T: Send + 'static,
    V: Send + 'static,
{
    /// Spawn `num_workers` threads running the worker loop
    pub(crate) fn spawn(
        num_workers: usize,
        queue_capacity: usize,
        func: MapFn<T, V>,
        cancel: CancelToken,
    ) -> std::io::Result<Self> {
        let (chunk_sender, chunk_receiver) = bounded(queue_capacity);
        let (result_sender, result_receiver) = bounded(num_workers * RESULT_SLOTS_PER_WORKER);

        let mut pool = Self {
            chunk_sender: Some(chunk_sender),
            result_receiver: Some(result_receiver),
            handles: Vec::with_capacity(num_workers),
            cancel,
        };

        for worker_id in 0..num_workers {
            let chunk_receiver = chunk_receiver.clone();
            let result_sender = result_sender.clone();
            let worker_func = func.clone();
            let worker_cancel = pool.cancel.clone();

            // On spawn failure `pool` is dropped, which stops the workers
            // already started.
            let handle = thread::Builder::new()
                .name(format!("chunkmap-worker-{}", worker_id))
                .spawn(move || {
                    worker_thread(
                        worker_id,
                        chunk_receiver,
                        result_sender,
                        worker_func,
                        worker_cancel,
                    )
                })?;
            pool.handles.push(handle);
        }

        tracing::debug!(num_workers, queue_capacity, "worker pool started");
        Ok(pool)
    }
}

impl<T, V> WorkerPool<T, V> {
    pub(crate) fn chunk_sender(&self) -> Option<&Sender<Chunk<IndexedItem<T>>>> {
        self.chunk_sender.as_ref()
    }

    pub(crate) fn result_receiver(&self) -> Option<&Receiver<Chunk<WorkResult<V>>>> {
        self.result_receiver.as_ref()
    }

    /// Stop accepting input; workers exit once the queue is drained
    pub(crate) fn close_input(&mut self) {
        self.chunk_sender.take();
    }

    /// Stop every worker after its current item and join the threads
    pub(crate) fn shutdown(&mut self) {
        if self.handles.is_empty() && self.chunk_sender.is_none() {
            return;
        }

        self.cancel.cancel();
        self.chunk_sender.take();
        // Unblocks workers waiting to send results
        self.result_receiver.take();

        let mut chunks_completed = 0usize;
        for (idx, handle) in self.handles.drain(..).enumerate() {
            match handle.join() {
                Ok(completed) => chunks_completed += completed,
                Err(_) => tracing::warn!(worker_id = idx, "worker thread panicked"),
            }
        }
        tracing::debug!(chunks_completed, "worker pool stopped");
    }

    /// Wait for workers that are exiting on their own (input closed)
    pub(crate) fn join(&mut self) {
        self.chunk_sender.take();
        let mut chunks_completed = 0usize;
        for (idx, handle) in self.handles.drain(..).enumerate() {
            match handle.join() {
                Ok(completed) => chunks_completed += completed,
                Err(_) => tracing::warn!(worker_id = idx, "worker thread panicked"),
            }
        }
        self.result_receiver.take();
        tracing::debug!(chunks_completed, "worker pool finished");
    }
}

impl<T, V> Drop for WorkerPool<T, V> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
