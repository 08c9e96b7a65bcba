use rayon::prelude::*;

use crate::error::Result;

/// Per-element map over a slice, either inline or on a worker pool.
///
/// The strategy is picked once when a network is built. Results always come
/// back in input order and the caller blocks until every element is done.
#[derive(Debug)]
pub enum ParallelMap {
    Sequential,
    Pooled(rayon::ThreadPool),
}

impl ParallelMap {
    /// `threads = None` lets rayon size the pool from the available cores.
    pub fn new(parallel: bool, threads: Option<usize>) -> Result<ParallelMap> {
        if !parallel {
            return Ok(ParallelMap::Sequential);
        }

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(threads) = threads {
            builder = builder.num_threads(threads);
        }
        Ok(ParallelMap::Pooled(builder.build()?))
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self, ParallelMap::Pooled(_))
    }

    pub fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        match self {
            ParallelMap::Sequential => items.iter().map(f).collect(),
            ParallelMap::Pooled(pool) => pool.install(|| items.par_iter().map(f).collect()),
        }
    }
}
