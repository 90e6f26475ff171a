//! Worker pool and ordered block dispatch.
//!
//! The pool is built lazily on the first multi-threaded call and cached in
//! an `Arc`.  Calls take a snapshot of that `Arc` before submitting work,
//! so `resize` and `release` can swap or drop the cached pool at any time
//! without touching in-flight submissions: those complete against the pool
//! they started with.  A thread count of 1 bypasses the pool entirely and
//! runs on the calling thread.

use std::sync::{Arc, Mutex};

use log::debug;
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::error::{Error, Result};

struct PoolCell {
    threads: usize,
    pool: Option<Arc<ThreadPool>>,
}

pub struct WorkerPool {
    cell: Mutex<PoolCell>,
}

impl WorkerPool {
    /// `threads` must already be validated by the caller.
    pub fn new(threads: usize) -> Self {
        Self {
            cell: Mutex::new(PoolCell {
                threads,
                pool: None,
            }),
        }
    }

    pub fn thread_count(&self) -> usize {
        self.cell.lock().expect("pool lock poisoned").threads
    }

    /// Store a new thread count and drop the cached pool so the next call
    /// rebuilds it.  Returns the previous count.
    pub fn resize(&self, threads: usize) -> usize {
        let mut cell = self.cell.lock().expect("pool lock poisoned");
        let previous = cell.threads;
        if threads != previous {
            debug!("resizing worker pool: {previous} -> {threads} threads");
            cell.threads = threads;
            cell.pool = None;
        }
        previous
    }

    /// Drop the cached pool.  In-flight calls keep their snapshot; the next
    /// call recreates the pool lazily.
    pub fn release(&self) {
        let mut cell = self.cell.lock().expect("pool lock poisoned");
        if cell.pool.take().is_some() {
            debug!("released worker pool");
        }
    }

    /// Snapshot the pool for one call.  `None` means single-threaded mode.
    pub fn snapshot(&self) -> Result<Option<Arc<ThreadPool>>> {
        let mut cell = self.cell.lock().expect("pool lock poisoned");
        if cell.threads <= 1 {
            return Ok(None);
        }
        if cell.pool.is_none() {
            let threads = cell.threads;
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("shufpack-worker-{i}"))
                .build()
                .map_err(|e| Error::ThreadPool(e.to_string()))?;
            debug!("built worker pool with {threads} threads");
            cell.pool = Some(Arc::new(pool));
        }
        Ok(cell.pool.clone())
    }
}

/// Run `f(0..jobs)` and collect the results in job order.
///
/// With a pool, jobs run as an indexed parallel map whose collect preserves
/// index order; without one (or with fewer than two jobs) they run on the
/// calling thread.  Both paths produce identical output, and the first
/// error aborts the whole call.
pub fn run_ordered<T, F>(pool: Option<&ThreadPool>, jobs: usize, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> Result<T> + Send + Sync,
{
    match pool {
        Some(pool) if jobs > 1 => {
            pool.install(|| (0..jobs).into_par_iter().map(&f).collect())
        }
        _ => (0..jobs).map(f).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_and_parallel_agree() {
        let pool = WorkerPool::new(4);
        let snap = pool.snapshot().unwrap();
        let seq = run_ordered(None, 100, |i| Ok(i * 3)).unwrap();
        let par = run_ordered(snap.as_deref(), 100, |i| Ok(i * 3)).unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn single_thread_mode_has_no_pool() {
        let pool = WorkerPool::new(1);
        assert!(pool.snapshot().unwrap().is_none());
    }

    #[test]
    fn resize_returns_previous_and_takes_effect() {
        let pool = WorkerPool::new(2);
        assert_eq!(pool.resize(6), 2);
        assert_eq!(pool.thread_count(), 6);
        assert_eq!(pool.resize(1), 6);
        assert!(pool.snapshot().unwrap().is_none());
    }

    #[test]
    fn release_then_reuse_rebuilds() {
        let pool = WorkerPool::new(2);
        assert!(pool.snapshot().unwrap().is_some());
        pool.release();
        assert!(pool.snapshot().unwrap().is_some());
    }

    #[test]
    fn inflight_snapshot_survives_resize() {
        let pool = WorkerPool::new(2);
        let snap = pool.snapshot().unwrap();
        pool.resize(8);
        // The old snapshot still executes correctly.
        let out = run_ordered(snap.as_deref(), 10, |i| Ok(i)).unwrap();
        assert_eq!(out, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn first_error_aborts() {
        let err = run_ordered(None, 10, |i| {
            if i == 3 {
                Err(Error::Backend("boom".to_string()))
            } else {
                Ok(i)
            }
        });
        assert!(err.is_err());
    }
}
