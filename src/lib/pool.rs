//! Bounded worker pool for per-barcode processing.
//!
//! Each unit of work is one barcode's families; units are independent, so
//! they can go to any worker and results may come back in any order
//! across barcodes. The submitting thread hands each drained result to
//! its single-threaded callback, keeping output writing unsynchronized.
//! The jobs and results channels are both bounded by the configured
//! queue depth, so memory stays proportional to the queue, not the input.
//!
//! A worker error (as opposed to a per-family failure the worker handled
//! itself) is returned to the submitter, which logs and aborts; dropping
//! the pool closes the channels and joins every worker, so no worker
//! outlives the run on the error path.

use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

enum Inner<J, R> {
    /// No worker threads: jobs run on the submitting thread.
    Inline {
        #[allow(clippy::type_complexity)]
        func: Box<dyn Fn(J) -> Result<R>>,
    },
    Threaded {
        jobs: Option<Sender<J>>,
        results: Receiver<Result<R>>,
        workers: Vec<JoinHandle<()>>,
        submitted: u64,
        collected: u64,
    },
}

/// A pool of workers applying one function to a stream of jobs.
///
/// With `processes == 0` everything runs inline on the submitting thread,
/// mirroring the single-process mode of the pipeline.
pub struct FamilyPool<J, R> {
    inner: Inner<J, R>,
}

impl<J: Send + 'static, R: Send + 'static> FamilyPool<J, R> {
    /// Creates a pool.
    ///
    /// `queue_size` bounds both the pending-jobs and the pending-results
    /// channels; `func` is the worker body, whose `Err` aborts the run.
    pub fn new<F>(processes: usize, queue_size: usize, func: F) -> Self
    where
        F: Fn(J) -> Result<R> + Send + Sync + 'static,
    {
        if processes == 0 {
            return Self { inner: Inner::Inline { func: Box::new(func) } };
        }

        let (jobs_tx, jobs_rx) = bounded::<J>(queue_size.max(1));
        let (results_tx, results_rx) = bounded::<Result<R>>(queue_size.max(1) + processes);
        let func = Arc::new(func);
        let workers = (0..processes)
            .map(|_| {
                let jobs_rx = jobs_rx.clone();
                let results_tx = results_tx.clone();
                let func = Arc::clone(&func);
                std::thread::spawn(move || {
                    for job in &jobs_rx {
                        // A send failure means the submitter is gone;
                        // nothing left to do but exit.
                        if results_tx.send(func(job)).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();

        Self {
            inner: Inner::Threaded {
                jobs: Some(jobs_tx),
                results: results_rx,
                workers,
                submitted: 0,
                collected: 0,
            },
        }
    }

    /// Submits one job and returns any results that are ready.
    ///
    /// Blocks only when the job queue is full, in which case it collects
    /// results while waiting so the pipeline cannot deadlock.
    pub fn submit(&mut self, job: J) -> Result<Vec<R>> {
        match &mut self.inner {
            Inner::Inline { func } => Ok(vec![func(job)?]),
            Inner::Threaded { jobs, results, submitted, collected, .. } => {
                let mut ready = Vec::new();
                for result in results.try_iter() {
                    *collected += 1;
                    ready.push(result?);
                }

                let sender = jobs.as_ref().ok_or_else(|| anyhow!("pool already shut down"))?;
                let mut job = job;
                loop {
                    match sender.try_send(job) {
                        Ok(()) => break,
                        Err(TrySendError::Full(returned)) => {
                            job = returned;
                            let result =
                                results.recv().map_err(|_| anyhow!("all workers exited"))?;
                            *collected += 1;
                            ready.push(result?);
                        }
                        Err(TrySendError::Disconnected(_)) => {
                            return Err(anyhow!("all workers exited"));
                        }
                    }
                }
                *submitted += 1;
                Ok(ready)
            }
        }
    }

    /// Waits for every outstanding job and returns the remaining results.
    pub fn flush(&mut self) -> Result<Vec<R>> {
        match &mut self.inner {
            Inner::Inline { .. } => Ok(Vec::new()),
            Inner::Threaded { results, submitted, collected, .. } => {
                let mut ready = Vec::new();
                while collected < submitted {
                    let result = results.recv().map_err(|_| anyhow!("all workers exited"))?;
                    *collected += 1;
                    ready.push(result?);
                }
                Ok(ready)
            }
        }
    }
}

impl<J, R> Drop for FamilyPool<J, R> {
    fn drop(&mut self) {
        if let Inner::Threaded { jobs, results, workers, .. } = &mut self.inner {
            // Closing the jobs channel stops the workers; draining the
            // results unblocks any worker mid-send.
            jobs.take();
            while results.try_recv().is_ok() {}
            for worker in workers.drain(..) {
                let _ = worker.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_pool_runs_on_submit() {
        let mut pool: FamilyPool<u64, u64> = FamilyPool::new(0, 4, |n| Ok(n * n));
        assert_eq!(pool.submit(7).unwrap(), vec![49]);
        assert!(pool.flush().unwrap().is_empty());
    }

    #[test]
    fn threaded_pool_returns_all_results() {
        let mut pool: FamilyPool<u64, u64> = FamilyPool::new(3, 2, |n| Ok(n + 1));
        let mut results = Vec::new();
        for n in 0..100 {
            results.extend(pool.submit(n).unwrap());
        }
        results.extend(pool.flush().unwrap());
        results.sort_unstable();
        assert_eq!(results, (1..=100).collect::<Vec<_>>());
    }

    #[test]
    fn worker_error_aborts() {
        let mut pool: FamilyPool<u64, u64> =
            FamilyPool::new(2, 2, |n| if n == 5 { Err(anyhow!("boom on {n}")) } else { Ok(n) });
        let mut failed = false;
        for n in 0..20 {
            if pool.submit(n).is_err() {
                failed = true;
                break;
            }
        }
        let flush = pool.flush();
        assert!(failed || flush.is_err(), "the failing job must surface");
    }

    #[test]
    fn flush_is_idempotent() {
        let mut pool: FamilyPool<u64, u64> = FamilyPool::new(1, 2, Ok);
        pool.submit(1).unwrap();
        let first: u64 = pool.flush().unwrap().iter().sum::<u64>()
            + pool.flush().unwrap().iter().sum::<u64>();
        assert_eq!(first, 1);
    }

    #[test]
    fn drop_joins_workers_with_pending_jobs() {
        let mut pool: FamilyPool<u64, u64> = FamilyPool::new(2, 8, |n| {
            std::thread::sleep(std::time::Duration::from_millis(1));
            Ok(n)
        });
        for n in 0..10 {
            pool.submit(n).unwrap();
        }
        drop(pool); // must not hang
    }
}
