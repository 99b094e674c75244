//! Chunking of the input sequence
//!
//! Pairs each element with its global index and groups the indexed items
//! into chunks of at most `chunk_size`, pulling from the source lazily.

use super::error::BoxError;
use super::types::{Chunk, IndexedItem, InputFaultPolicy};

/// An error raised by the source while a chunk was being assembled
#[derive(Debug)]
pub struct InputFault {
    /// Number of elements successfully read before the error
    pub position: usize,
    pub error: BoxError,
}

/// Lazy chunker over a fallible source
///
/// Items read before a source error are still emitted as a (short) chunk;
/// the error is reported by the following call. Under
/// `InputFaultPolicy::Stop` nothing is read from the source afterwards.
pub struct Chunker<I> {
    source: I,
    chunk_size: usize,
    policy: InputFaultPolicy,
    next_index: usize,
    pending_fault: Option<InputFault>,
    finished: bool,
}

impl<I, T, E> Chunker<I>
where
    I: Iterator<Item = Result<T, E>>,
    E: Into<BoxError>,
{
    pub fn new(source: I, chunk_size: usize, policy: InputFaultPolicy) -> Self {
        Self {
            source,
            chunk_size: chunk_size.max(1),
            policy,
            next_index: 0,
            pending_fault: None,
            finished: false,
        }
    }

    /// Number of elements read successfully so far
    pub fn items_read(&self) -> usize {
        self.next_index
    }

    fn fault(&mut self, error: E) -> InputFault {
        if self.policy == InputFaultPolicy::Stop {
            self.finished = true;
        }
        InputFault {
            position: self.next_index,
            error: error.into(),
        }
    }
}

impl<I, T, E> Iterator for Chunker<I>
where
    I: Iterator<Item = Result<T, E>>,
    E: Into<BoxError>,
{
    type Item = Result<Chunk<IndexedItem<T>>, InputFault>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(fault) = self.pending_fault.take() {
            return Some(Err(fault));
        }
        if self.finished {
            return None;
        }

        let mut chunk = Vec::with_capacity(self.chunk_size);
        while chunk.len() < self.chunk_size {
            match self.source.next() {
                Some(Ok(value)) => {
                    chunk.push(IndexedItem {
                        index: self.next_index,
                        value,
                    });
                    self.next_index += 1;
                }
                Some(Err(error)) => {
                    let fault = self.fault(error);
                    if chunk.is_empty() {
                        return Some(Err(fault));
                    }
                    self.pending_fault = Some(fault);
                    return Some(Ok(chunk));
                }
                None => {
                    self.finished = true;
                    break;
                }
            }
        }

        if chunk.is_empty() {
            None
        } else {
            Some(Ok(chunk))
        }
    }
}
