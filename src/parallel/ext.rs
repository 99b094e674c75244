//! Iterator extension for calling `parallel_map` in method position

use super::error::{BoxError, MapError};
use super::processor::{self, ParallelMap};
use super::types::ParallelConfig;

/// Adds `.parallel_map(config, func)` to anything iterable
///
/// ```no_run
/// use chunkmap::{ParallelConfig, ParallelMapExt};
///
/// let config = ParallelConfig::default().with_num_workers(4);
/// for value in (0..100u64).parallel_map(config, |x| Ok::<_, std::io::Error>(x * 2)).unwrap() {
///     println!("{:?}", value);
/// }
/// ```
pub trait ParallelMapExt: IntoIterator + Sized {
    fn parallel_map<'a, F, V, E>(
        self,
        config: ParallelConfig,
        func: F,
    ) -> Result<ParallelMap<'a, Self::Item, V>, MapError>
    where
        F: Fn(Self::Item) -> Result<V, E> + Send + Sync + 'static,
        E: Into<BoxError>,
        Self::IntoIter: 'a,
        Self::Item: Send + 'static,
        V: Send + 'static,
    {
        processor::parallel_map(func, self, config)
    }
}

impl<I: IntoIterator> ParallelMapExt for I {}
