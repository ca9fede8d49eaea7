//! Bounded worker pool for graph jobs

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::error::{EngineError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of worker threads fed from one bounded queue. At most
/// `threads + queue_depth` jobs are admitted at once; submissions beyond
/// that fail immediately instead of queueing.
///
/// Workers are plain threads, not rayon workers, so a job blocked on a
/// cache key never picks up another job while it waits. Parallel algorithm
/// kernels still run on the global rayon pool.
pub struct WorkerPool {
    queue: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    threads: usize,
    capacity: usize,
    in_flight: Arc<AtomicUsize>,
}

/// Releases an admission slot when the job finishes or unwinds
struct Slot(Arc<AtomicUsize>);

impl Drop for Slot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

fn run_worker(id: usize, queue: Receiver<Job>) {
    for job in queue {
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            log::error!("Job on worker {} panicked; its caller gets an internal error", id);
        }
    }
    log::debug!("Worker {} stopped", id);
}

impl WorkerPool {
    /// `threads == 0` means one thread per logical CPU
    pub fn new(threads: usize, queue_depth: usize) -> Result<Self> {
        let threads = if threads > 0 { threads } else { num_cpus::get() };
        let capacity = threads + queue_depth;

        // Admission is counted separately, so every admitted job fits
        let (queue, jobs) = bounded::<Job>(capacity);
        let workers = (0..threads)
            .map(|id| {
                let jobs = jobs.clone();
                thread::Builder::new()
                    .name(format!("gene-network-{}", id))
                    .spawn(move || run_worker(id, jobs))
                    .map_err(|e| EngineError::Internal(format!("failed to start worker {}: {}", id, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        log::info!(
            "Worker pool started with {} threads, queue depth {}",
            threads,
            queue_depth
        );

        Ok(Self {
            queue: Some(queue),
            workers,
            threads,
            capacity,
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Jobs that may be admitted at once
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs admitted and not yet finished
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    fn rejected(&self) -> EngineError {
        log::warn!("Worker pool full ({} jobs), rejecting submission", self.capacity);
        EngineError::CapacityExceeded {
            resource: "worker pool",
            limit: self.capacity,
            requested: self.capacity + 1,
        }
    }

    /// Queue `job` on the pool. Fails with `CapacityExceeded` when every
    /// slot is taken. The job runs to completion even if the returned handle
    /// is dropped.
    pub fn submit<T, F>(&self, job: F) -> Result<JobHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let capacity = self.capacity;
        let admitted = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            })
            .is_ok();
        if !admitted {
            return Err(self.rejected());
        }

        let slot = Slot(Arc::clone(&self.in_flight));
        let (sender, receiver) = bounded(1);
        let task: Job = Box::new(move || {
            let outcome = job();
            drop(slot);
            // The caller may have stopped waiting
            let _ = sender.send(outcome);
        });

        // A refused task is dropped here, which releases its slot
        let queue = self.queue.as_ref().ok_or_else(lost_worker)?;
        queue.try_send(task).map_err(|_| self.rejected())?;

        Ok(JobHandle { receiver })
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the queue lets workers drain what was admitted, then exit
        drop(self.queue.take());
        let current = thread::current().id();
        for worker in self.workers.drain(..) {
            if worker.thread().id() != current && worker.join().is_err() {
                log::error!("Worker thread exited abnormally");
            }
        }
    }
}

/// One-shot handle on a submitted job's result
#[derive(Debug)]
pub struct JobHandle<T> {
    receiver: Receiver<Result<T>>,
}

impl<T> JobHandle<T> {
    /// Block until the job finishes
    pub fn wait(self) -> Result<T> {
        self.receiver.recv().map_err(|_| lost_worker())?
    }

    /// Wait at most `timeout`; `None` if the job is still running
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(lost_worker())),
        }
    }
}

fn lost_worker() -> EngineError {
    EngineError::Internal("worker exited without producing a result".to_string())
}
