//! Worker pool with dedicated OS threads shared by pooled schedulers.
//!
//! Concurrent and Sequential schedulers hand their eligible tasks to a `WorkerPool`.
//! The pool never inspects the jobs it runs; ordering is entirely the business of the
//! scheduler that submitted them.
//!
//! # Design
//!
//! - **No polling**: permanent workers block on channel `recv`
//! - **Clean shutdown**: dropping the sender drains the queue, then unblocks workers
//! - **Compensation**: a worker about to block inside [`managed_block`] lends its slot to a
//!   temporary thread, so stages that apply backpressure to each other cannot starve a
//!   small pool

use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::WorkerPoolConfig;

/// Unit of work executed by the pool.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// How often a compensation thread re-checks whether it should retire.
const RETIRE_POLL: Duration = Duration::from_millis(20);

/// How long `shutdown` waits for each permanent worker to exit.
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors that can occur when using a `WorkerPool`.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool has been shut down.
    #[error("pool has been shut down")]
    PoolShutdown,

    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal error (thread spawn failure and the like).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Number of permanent worker threads.
    pub worker_count: usize,

    /// Compensation threads currently alive.
    pub compensation_threads: usize,

    /// Currently executing jobs.
    pub active_tasks: u64,

    /// Jobs waiting in the queue.
    pub queued_tasks: u64,

    /// Total jobs that ran to completion (including ones that panicked).
    pub completed_tasks: u64,

    /// Total jobs that panicked.
    pub panicked_tasks: u64,

    /// Total jobs submitted.
    pub submitted_tasks: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
struct PoolCounters {
    active_tasks: AtomicU64,
    queued_tasks: AtomicU64,
    completed_tasks: AtomicU64,
    panicked_tasks: AtomicU64,
    submitted_tasks: AtomicU64,
}

impl PoolCounters {
    /// Get a snapshot of current statistics.
    fn snapshot(&self, worker_count: usize, compensation_threads: usize) -> PoolStats {
        PoolStats {
            worker_count,
            compensation_threads,
            active_tasks: self.active_tasks.load(Ordering::Relaxed),
            queued_tasks: self.queued_tasks.load(Ordering::Relaxed),
            completed_tasks: self.completed_tasks.load(Ordering::Relaxed),
            panicked_tasks: self.panicked_tasks.load(Ordering::Relaxed),
            submitted_tasks: self.submitted_tasks.load(Ordering::Relaxed),
        }
    }
}

/// State shared between the pool handle and every worker thread.
struct PoolShared {
    config: WorkerPoolConfig,
    task_rx: Receiver<Job>,
    counters: PoolCounters,
    compensating: AtomicUsize,
    compensation_seq: AtomicU64,
    shutdown: AtomicBool,
}

thread_local! {
    /// Pool owning the current thread, if it is a pool worker.
    static CURRENT_POOL: RefCell<Option<Arc<PoolShared>>> = const { RefCell::new(None) };
}

static COMMON_POOL: Mutex<Option<Arc<WorkerPool>>> = Mutex::new(None);

/// Fixed-size pool of OS threads fed by an unbounded channel.
pub struct WorkerPool {
    /// Task sender (to workers). Option allows clean shutdown by dropping.
    task_tx: RwLock<Option<Sender<Job>>>,

    shared: Arc<PoolShared>,

    /// Permanent worker thread handles.
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.shared.config)
            .field("shutdown", &self.shared.shutdown.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    /// Create a new worker pool and spawn its permanent workers.
    ///
    /// # Errors
    ///
    /// - `PoolError::InvalidConfig` if the configuration is invalid
    /// - `PoolError::Internal` if a worker thread cannot be spawned
    pub fn new(config: WorkerPoolConfig) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let (task_tx, task_rx) = unbounded::<Job>();
        let shared = Arc::new(PoolShared {
            config,
            task_rx,
            counters: PoolCounters::default(),
            compensating: AtomicUsize::new(0),
            compensation_seq: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        });

        let worker_count = shared.config.worker_count;
        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let name = format!("{}-{worker_id}", shared.config.thread_name_prefix);
            match spawn_worker(name, Arc::clone(&shared), None) {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Dropping the sender releases the workers spawned so far.
                    drop(task_tx);
                    return Err(PoolError::Internal(format!("failed to spawn worker thread: {e}")));
                }
            }
        }

        info!(
            worker_count = worker_count,
            max_compensation_threads = shared.config.max_compensation_threads,
            prefix = %shared.config.thread_name_prefix,
            "WorkerPool initialized"
        );

        Ok(Self {
            task_tx: RwLock::new(Some(task_tx)),
            shared,
            workers: Mutex::new(workers),
        })
    }

    /// Process-wide pool used by schedulers that are not given one explicitly.
    ///
    /// Created on first use with [`WorkerPoolConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Internal` if the pool threads cannot be spawned.
    pub fn common() -> Result<Arc<Self>, PoolError> {
        let mut common = COMMON_POOL.lock();
        if let Some(pool) = common.as_ref() {
            return Ok(Arc::clone(pool));
        }
        let pool = Arc::new(Self::new(
            WorkerPoolConfig::default().with_thread_name_prefix("taskwire-common"),
        )?);
        *common = Some(Arc::clone(&pool));
        Ok(pool)
    }

    /// Submit a job for execution on some worker.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::PoolShutdown` if the pool has been shut down.
    pub fn execute<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let task_tx = self.task_tx.read();
        let Some(sender) = task_tx.as_ref() else {
            return Err(PoolError::PoolShutdown);
        };

        // Count before sending so a fast worker never decrements below zero.
        self.shared.counters.queued_tasks.fetch_add(1, Ordering::Relaxed);
        if sender.send(Box::new(job)).is_err() {
            self.shared.counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
            return Err(PoolError::PoolShutdown);
        }
        self.shared.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Number of permanent worker threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.shared.config.worker_count
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.shared.counters.snapshot(
            self.shared.config.worker_count,
            self.shared.compensating.load(Ordering::Relaxed),
        )
    }

    /// Whether `shutdown` has been called (or the pool dropped).
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
    }

    /// Shut down the pool gracefully.
    ///
    /// Stops accepting jobs, lets workers drain jobs already queued, then joins each
    /// permanent worker with a timeout. Workers that don't exit in time are detached.
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("Shutting down worker pool");

        // Drop the sender to unblock all workers waiting on recv()
        *self.task_tx.write() = None;

        let mut workers = self.workers.lock();
        let worker_count = workers.len();

        for (idx, worker) in workers.drain(..).enumerate() {
            let (tx, rx) = crossbeam_channel::bounded(1);
            let join_thread = thread::spawn(move || {
                let result = worker.join();
                let _ = tx.send(result.is_ok());
            });

            match rx.recv_timeout(JOIN_TIMEOUT) {
                Ok(true) => debug!(worker_id = idx, "Worker joined successfully"),
                Ok(false) => warn!(worker_id = idx, "Worker panicked"),
                Err(_) => {
                    warn!(worker_id = idx, "Worker did not exit within timeout - detaching");
                    continue;
                }
            }

            let _ = join_thread.join();
        }

        info!(worker_count = worker_count, "Worker pool shut down complete");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Signal shutdown but don't join workers in Drop
        if !self.shared.shutdown.swap(true, Ordering::AcqRel) {
            *self.task_tx.write() = None;
            debug!("WorkerPool dropped without explicit shutdown - workers will be detached");
        }
    }
}

/// Runs a blocking operation, compensating the pool if the caller is one of its workers.
///
/// When called on a pool worker, a temporary worker is spawned for the duration of
/// `blocker` (subject to `max_compensation_threads`), so queued jobs keep making progress
/// while this worker waits. On any other thread `blocker` simply runs.
pub fn managed_block<R>(blocker: impl FnOnce() -> R) -> R {
    let shared = CURRENT_POOL.with(|current| current.borrow().clone());
    let Some(shared) = shared else {
        return blocker();
    };

    let _compensation = Compensation::begin(&shared);
    blocker()
}

/// Guard for a compensation thread; retires the thread when dropped.
struct Compensation {
    retire: Option<Arc<AtomicBool>>,
}

impl Compensation {
    fn begin(shared: &Arc<PoolShared>) -> Self {
        let none = Self { retire: None };
        if shared.shutdown.load(Ordering::Acquire) {
            return none;
        }

        let limit = shared.config.max_compensation_threads;
        let reserved = shared
            .compensating
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live < limit).then_some(live + 1)
            })
            .is_ok();
        if !reserved {
            warn!(limit = limit, "compensation thread limit reached; blocking worker");
            return none;
        }

        let retire = Arc::new(AtomicBool::new(false));
        let seq = shared.compensation_seq.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}-compensation-{seq}", shared.config.thread_name_prefix);
        match spawn_worker(name, Arc::clone(shared), Some(Arc::clone(&retire))) {
            Ok(_detached) => Self {
                retire: Some(retire),
            },
            Err(e) => {
                shared.compensating.fetch_sub(1, Ordering::AcqRel);
                warn!(error = %e, "failed to spawn compensation thread");
                none
            }
        }
    }
}

impl Drop for Compensation {
    fn drop(&mut self) {
        if let Some(retire) = self.retire.take() {
            retire.store(true, Ordering::Release);
        }
    }
}

/// Spawn a worker thread. Compensation workers carry a `retire` flag.
fn spawn_worker(
    name: String,
    shared: Arc<PoolShared>,
    retire: Option<Arc<AtomicBool>>,
) -> std::io::Result<JoinHandle<()>> {
    let stack_size = shared.config.thread_stack_size;
    thread::Builder::new()
        .name(name)
        .stack_size(stack_size)
        .spawn(move || {
            CURRENT_POOL.with(|current| *current.borrow_mut() = Some(Arc::clone(&shared)));
            debug!("Worker thread started");

            loop {
                let job = match &retire {
                    None => match shared.task_rx.recv() {
                        Ok(job) => job,
                        // Channel closed and drained - clean exit
                        Err(_) => break,
                    },
                    Some(retire) => {
                        if retire.load(Ordering::Acquire) {
                            break;
                        }
                        match shared.task_rx.recv_timeout(RETIRE_POLL) {
                            Ok(job) => job,
                            Err(RecvTimeoutError::Timeout) => continue,
                            Err(RecvTimeoutError::Disconnected) => break,
                        }
                    }
                };
                run_job(&shared, job);
            }

            if retire.is_some() {
                shared.compensating.fetch_sub(1, Ordering::AcqRel);
            }
            CURRENT_POOL.with(|current| current.borrow_mut().take());
            debug!("Worker thread exiting");
        })
}

fn run_job(shared: &PoolShared, job: Job) {
    let counters = &shared.counters;
    counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
    counters.active_tasks.fetch_add(1, Ordering::Relaxed);

    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        counters.panicked_tasks.fetch_add(1, Ordering::Relaxed);
        warn!("job panicked on worker pool thread");
    }

    counters.active_tasks.fetch_sub(1, Ordering::Relaxed);
    counters.completed_tasks.fetch_add(1, Ordering::Relaxed);
}
