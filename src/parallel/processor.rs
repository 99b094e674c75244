//! Main parallel processor
//!
//! `ParallelMap` is the coordinating loop: it feeds chunks into the worker
//! pool, collects result chunks, reorders them when required and applies
//! the fault policy. It runs on the caller's thread, one step per call to
//! `next()`.

use crossbeam_channel::Select;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use crate::stats::MapStats;

use super::batching::{Chunker, InputFault};
use super::cancel::CancelToken;
use super::error::{BoxError, MapError};
use super::pool::WorkerPool;
use super::sink::ReorderBuffer;
use super::types::{Chunk, IndexedItem, ParallelConfig, WorkResult};
use super::worker::MapFn;

type Source<'a, T> = Box<dyn Iterator<Item = Result<T, BoxError>> + 'a>;
type Outcome<V> = Result<Option<V>, MapError>;

/// Apply `func` to every element of `input` on a pool of worker threads
///
/// Returns a lazy iterator; nothing is read from `input` until it is
/// polled. See [`ParallelMap`] for the meaning of its items.
pub fn parallel_map<'a, F, T, V, E, I>(
    func: F,
    input: I,
    config: ParallelConfig,
) -> Result<ParallelMap<'a, T, V>, MapError>
where
    F: Fn(T) -> Result<V, E> + Send + Sync + 'static,
    E: Into<BoxError>,
    I: IntoIterator<Item = T>,
    I::IntoIter: 'a,
    T: Send + 'static,
    V: Send + 'static,
{
    try_parallel_map(func, input.into_iter().map(Ok::<T, Infallible>), config)
}

/// Like [`parallel_map`], for sources that can fail while being read
///
/// An `Err` element is an input fault: it either stops the map or, with
/// `ignore_errors`, is logged and skipped without consuming an index.
pub fn try_parallel_map<'a, F, T, V, E, S, SE>(
    func: F,
    input: S,
    config: ParallelConfig,
) -> Result<ParallelMap<'a, T, V>, MapError>
where
    F: Fn(T) -> Result<V, E> + Send + Sync + 'static,
    E: Into<BoxError>,
    S: IntoIterator<Item = Result<T, SE>>,
    S::IntoIter: 'a,
    SE: Into<BoxError>,
    T: Send + 'static,
    V: Send + 'static,
{
    config.validate()?;

    let source = input.into_iter();
    let chunk_size = config.effective_chunk_size(source.size_hint());
    let source: Source<'a, T> = Box::new(
        source.map(|item: Result<T, SE>| -> Result<T, BoxError> { item.map_err(Into::into) }),
    );

    ParallelMap::start(source, box_map_fn(func), chunk_size, &config)
}

fn box_map_fn<F, T, V, E>(func: F) -> MapFn<T, V>
where
    F: Fn(T) -> Result<V, E> + Send + Sync + 'static,
    E: Into<BoxError>,
    T: 'static,
    V: 'static,
{
    Arc::new(move |value: T| -> Result<V, BoxError> { func(value).map_err(Into::into) })
}

/// Coordinator state; owned by one `ParallelMap` and never shared
#[derive(Debug, Default)]
struct ManagerState {
    next_output_index: usize,
    read_input_length: usize,
    input_exhausted: bool,
    /// Set once a propagated fault is pending; no further chunks are fed
    feeding_halted: bool,
}

/// What the multiplexed wait produced
enum Ready<V> {
    Dispatched(usize),
    Collected(Chunk<WorkResult<V>>),
    Cancelled,
    Disconnected,
}

/// Lazy, single-pass sequence of mapped values
///
/// Items are:
/// - `Ok(Some(v))` for each successfully mapped element,
/// - `Ok(None)` in place of an element whose function call failed, when
///   `ignore_errors` is set (the fault is logged instead),
/// - `Err(MapError)` once, when the map stops; the iterator yields `None`
///   afterwards.
///
/// In ordered mode values come out in input order and a propagated worker
/// fault is raised at its own position, after every earlier value. In
/// unordered mode values come out as workers finish them.
///
/// Dropping the iterator early stops and joins the worker threads.
pub struct ParallelMap<'a, T, V> {
    chunks: Chunker<Source<'a, T>>,
    pool: WorkerPool<T, V>,
    staged: Option<Chunk<IndexedItem<T>>>,
    state: ManagerState,
    reorder: ReorderBuffer<Outcome<V>>,
    ready: VecDeque<Outcome<V>>,
    unordered: bool,
    ignore_errors: bool,
    cancel: CancelToken,
    deadline: Option<Instant>,
    stats: MapStats,
    started: Instant,
    finished: bool,
}

impl<'a, T, V> ParallelMap<'a, T, V>
where
    T: Send + 'static,
    V: Send + 'static,
{
    fn start(
        source: Source<'a, T>,
        func: MapFn<T, V>,
        chunk_size: usize,
        config: &ParallelConfig,
    ) -> Result<Self, MapError> {
        let cancel = CancelToken::new();
        let pool = WorkerPool::spawn(
            config.num_workers,
            config.effective_queue_capacity(),
            func,
            cancel.clone(),
        )
        .map_err(|e| MapError::InvalidConfig(format!("failed to spawn worker threads: {}", e)))?;

        let started = Instant::now();
        tracing::debug!(
            chunk_size,
            num_workers = config.num_workers,
            unordered = config.unordered,
            ignore_errors = config.ignore_errors,
            "parallel map started"
        );

        Ok(Self {
            chunks: Chunker::new(source, chunk_size, config.input_fault_policy),
            pool,
            staged: None,
            state: ManagerState::default(),
            reorder: ReorderBuffer::new(),
            ready: VecDeque::new(),
            unordered: config.unordered,
            ignore_errors: config.ignore_errors,
            cancel,
            deadline: config.timeout.map(|timeout| started + timeout),
            stats: MapStats::new(),
            started,
            finished: false,
        })
    }
}

impl<'a, T, V> ParallelMap<'a, T, V> {
    /// Token that cancels this map from any thread
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Counters so far; `elapsed` is frozen once the map has finished
    pub fn stats(&self) -> MapStats {
        let mut stats = self.stats.clone();
        if !self.finished {
            stats.elapsed = self.started.elapsed();
        }
        stats.max_reorder_depth = self.reorder.high_water();
        stats
    }

    fn is_complete(&self) -> bool {
        self.state.input_exhausted
            && self.staged.is_none()
            && self.state.next_output_index == self.state.read_input_length
    }

    /// Advance the coordinator by one feed/collect round
    fn step(&mut self) -> Result<(), MapError> {
        if self.cancel.is_cancelled() {
            return Err(MapError::Cancelled);
        }

        self.stage_next_chunk();
        // Reading the source may block; a cancel that arrived meanwhile wins
        if self.cancel.is_cancelled() {
            return Err(MapError::Cancelled);
        }
        if !self.ready.is_empty() || self.is_complete() {
            return Ok(());
        }

        match self.wait_ready()? {
            Ready::Dispatched(len) => {
                self.state.read_input_length += len;
                self.stats.chunks_dispatched += 1;
                Ok(())
            }
            Ready::Collected(results) => {
                self.collect(results);
                Ok(())
            }
            Ready::Cancelled => Err(MapError::Cancelled),
            Ready::Disconnected if self.cancel.is_cancelled() => Err(MapError::Cancelled),
            Ready::Disconnected => Err(MapError::PoolDisconnected),
        }
    }

    /// Feed phase: pull the next chunk from the source unless one is waiting
    ///
    /// Returns with a chunk staged, the input exhausted, feeding halted or
    /// the map cancelled. Ignored input faults keep pulling, since no
    /// result may be in flight to wake the wait that follows.
    fn stage_next_chunk(&mut self) {
        while self.staged.is_none()
            && !self.state.input_exhausted
            && !self.state.feeding_halted
            && !self.cancel.is_cancelled()
        {
            match self.chunks.next() {
                Some(Ok(chunk)) => {
                    self.stats.items_read += chunk.len();
                    self.staged = Some(chunk);
                }
                Some(Err(fault)) => self.input_fault(fault),
                None => {
                    self.state.input_exhausted = true;
                    // Workers exit once the queue drains
                    self.pool.close_input();
                }
            }
        }
    }

    fn input_fault(&mut self, fault: InputFault) {
        self.stats.input_faults += 1;
        if self.ignore_errors {
            tracing::error!(
                position = fault.position,
                error = %fault.error,
                trace = %super::types::render_trace(fault.error.as_ref()),
                "input fault ignored"
            );
            return;
        }

        self.state.feeding_halted = true;
        let error = MapError::Input {
            position: fault.position,
            source: fault.error,
        };
        if self.unordered {
            self.ready.push_back(Err(error));
        } else {
            // Raised once every element read before the fault is delivered
            self.reorder.insert(fault.position, Err(error));
            self.drain_reorder_buffer();
        }
    }

    /// Block until a chunk can be dispatched, a result chunk arrives, the
    /// map is cancelled or the deadline passes
    fn wait_ready(&mut self) -> Result<Ready<V>, MapError> {
        let sender = self.pool.chunk_sender();
        let Some(receiver) = self.pool.result_receiver() else {
            return Ok(Ready::Disconnected);
        };

        let mut sel = Select::new();
        // The staged chunk travels with its send registration
        let mut send_op = None;
        if let Some(sender) = sender {
            if let Some(chunk) = self.staged.take() {
                send_op = Some((sel.send(sender), sender, chunk));
            }
        }
        let recv_op = sel.recv(receiver);
        let cancel_op = sel.recv(self.cancel.signal());

        let oper = match self.deadline {
            Some(deadline) => match sel.select_deadline(deadline) {
                Ok(oper) => oper,
                Err(_) => {
                    self.staged = send_op.map(|(_, _, chunk)| chunk);
                    return Err(MapError::TimedOut);
                }
            },
            None => sel.select(),
        };

        let index = oper.index();
        let ready = match send_op {
            Some((send_index, sender, chunk)) if send_index == index => {
                let len = chunk.len();
                match oper.send(sender, chunk) {
                    Ok(()) => Ready::Dispatched(len),
                    Err(_) => Ready::Disconnected,
                }
            }
            not_sent => {
                self.staged = not_sent.map(|(_, _, chunk)| chunk);
                if index == recv_op {
                    match oper.recv(receiver) {
                        Ok(results) => Ready::Collected(results),
                        Err(_) => Ready::Disconnected,
                    }
                } else {
                    debug_assert_eq!(index, cancel_op);
                    let _ = oper.recv(self.cancel.signal());
                    Ready::Cancelled
                }
            }
        };

        Ok(ready)
    }

    /// Collect phase: apply the fault policy and route each result
    fn collect(&mut self, results: Chunk<WorkResult<V>>) {
        self.stats.results_received += results.len();

        for result in results {
            let WorkResult {
                index,
                value,
                fault,
            } = result;

            let outcome = match fault {
                None => Ok(value),
                Some(fault) => {
                    self.stats.worker_faults += 1;
                    if self.ignore_errors {
                        tracing::error!(
                            index,
                            error = %fault.error,
                            trace = %fault.trace,
                            "worker fault ignored"
                        );
                        Ok(None)
                    } else {
                        self.state.feeding_halted = true;
                        Err(MapError::Worker {
                            index,
                            trace: fault.trace,
                            source: fault.error,
                        })
                    }
                }
            };

            if self.unordered {
                let is_fault = outcome.is_err();
                self.ready.push_back(outcome);
                self.state.next_output_index += 1;
                if is_fault {
                    return;
                }
            } else {
                self.reorder.insert(index, outcome);
            }
        }

        if !self.unordered {
            self.drain_reorder_buffer();
        }
    }

    fn drain_reorder_buffer(&mut self) {
        self.reorder.drain_ready(
            &mut self.state.next_output_index,
            &mut self.ready,
            |outcome| outcome.is_err(),
        );
    }

    /// Stop the pool after a propagated fault, cancellation or timeout
    fn abort(&mut self) {
        self.finished = true;
        self.stats.elapsed = self.started.elapsed();
        self.staged = None;
        tracing::debug!(
            delivered = self.stats.results_delivered,
            discarded = self.reorder.len(),
            "parallel map stopped early"
        );
        self.pool.shutdown();
    }

    /// Every dispatched index has been delivered
    fn complete(&mut self) {
        self.finished = true;
        self.stats.elapsed = self.started.elapsed();
        self.pool.join();
        tracing::debug!(
            delivered = self.stats.results_delivered,
            worker_faults = self.stats.worker_faults,
            input_faults = self.stats.input_faults,
            "parallel map finished"
        );
    }
}

impl<'a, T, V> Iterator for ParallelMap<'a, T, V> {
    type Item = Result<Option<V>, MapError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(outcome) = self.ready.pop_front() {
                return match outcome {
                    Ok(value) => {
                        self.stats.results_delivered += 1;
                        Some(Ok(value))
                    }
                    Err(error) => {
                        self.ready.clear();
                        self.abort();
                        Some(Err(error))
                    }
                };
            }

            if self.finished {
                return None;
            }

            if self.is_complete() {
                self.complete();
                return None;
            }

            if let Err(error) = self.step() {
                self.abort();
                return Some(Err(error));
            }
        }
    }
}
