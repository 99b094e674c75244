//! Result ordering for parallel processing
//!
//! Holds results that arrived ahead of their turn and releases them in
//! global index order.

use std::collections::{HashMap, VecDeque};

/// Out-of-order results keyed by global index
///
/// Entries leave in increasing index order, so the buffer only ever holds
/// results that overtook a slower chunk.
#[derive(Debug)]
pub(crate) struct ReorderBuffer<R> {
    pending: HashMap<usize, R>,
    high_water: usize,
}

impl<R> ReorderBuffer<R> {
    pub(crate) fn new() -> Self {
        Self {
            pending: HashMap::new(),
            high_water: 0,
        }
    }

    pub(crate) fn insert(&mut self, index: usize, result: R) {
        self.pending.insert(index, result);
        self.high_water = self.high_water.max(self.pending.len());
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    /// Largest number of entries held at once
    pub(crate) fn high_water(&self) -> usize {
        self.high_water
    }

    /// Move every result that is next in line into `ready`
    ///
    /// `stop_after` marks entries after which nothing more may be released
    /// (a propagated fault); draining halts right after such an entry.
    pub(crate) fn drain_ready(
        &mut self,
        next_output_index: &mut usize,
        ready: &mut VecDeque<R>,
        stop_after: impl Fn(&R) -> bool,
    ) {
        while let Some(result) = self.pending.remove(next_output_index) {
            let stop = stop_after(&result);
            ready.push_back(result);
            *next_output_index += 1;
            if stop {
                break;
            }
        }
    }
}
