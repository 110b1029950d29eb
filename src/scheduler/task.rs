//! Dependency-counted execution units submitted to the worker pool.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, warn};

use crate::core::WorkerPool;

type InlineJob = Box<dyn FnOnce()>;

thread_local! {
    /// Jobs rejected by a pool while this thread was already running one inline.
    static INLINE_QUEUE: RefCell<Option<VecDeque<InlineJob>>> = const { RefCell::new(None) };
}

/// Work performed once a task becomes eligible.
pub(crate) trait TaskBody: Send + Sync + 'static {
    /// Runs the task. Called at most once per task.
    fn run(&self);
}

/// A unit of work that becomes eligible when its dependency count reaches zero, and is
/// then forked onto a worker pool.
pub(crate) struct Task<B> {
    pool: Arc<WorkerPool>,
    dependencies: AtomicUsize,
    body: B,
}

impl<B: TaskBody> Task<B> {
    pub(crate) fn new(pool: Arc<WorkerPool>, dependencies: usize, body: B) -> Arc<Self> {
        Arc::new(Self {
            pool,
            dependencies: AtomicUsize::new(dependencies),
            body,
        })
    }

    /// Resolves one dependency; the call that resolves the last one forks the task.
    pub(crate) fn resolve_dependency(self: &Arc<Self>) {
        let previous = self
            .dependencies
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        match previous {
            Ok(1) => self.fork(),
            Ok(_) => {}
            Err(_) => error!("dependency resolved on a task that was already eligible"),
        }
    }

    fn fork(self: &Arc<Self>) {
        let task = Arc::clone(self);
        if let Err(e) = self.pool.execute(move || task.body.run()) {
            warn!(error = %e, "worker pool rejected task; running it on the calling thread");
            let task = Arc::clone(self);
            run_inline(Box::new(move || task.body.run()));
        }
    }
}

impl<B> Task<B> {
    pub(crate) const fn body(&self) -> &B {
        &self.body
    }

    /// Takes the body back once no other handle to the task remains.
    pub(crate) fn into_body(self: Arc<Self>) -> Result<B, Arc<Self>> {
        Arc::try_unwrap(self).map(|task| task.body)
    }
}

/// Runs `job` on this thread. A job rejected while another runs inline is queued behind
/// it, so a chain of successors resolving each other stays flat on the stack.
fn run_inline(job: InlineJob) {
    let mut job = Some(job);
    INLINE_QUEUE.with(|queue| {
        if let Some(pending) = queue.borrow_mut().as_mut() {
            pending.extend(job.take());
        }
    });
    if job.is_none() {
        return;
    }

    INLINE_QUEUE.with(|queue| *queue.borrow_mut() = Some(VecDeque::new()));
    while let Some(current) = job {
        current();
        job = INLINE_QUEUE.with(|queue| queue.borrow_mut().as_mut().and_then(VecDeque::pop_front));
    }
    INLINE_QUEUE.with(|queue| *queue.borrow_mut() = None);
}

/// Body holding one closure, run exactly once.
pub(crate) struct OnceBody {
    work: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl OnceBody {
    pub(crate) fn new(work: impl FnOnce() + Send + 'static) -> Self {
        Self {
            work: Mutex::new(Some(Box::new(work))),
        }
    }
}

impl TaskBody for OnceBody {
    fn run(&self) {
        let work = self.work.lock().take();
        if let Some(work) = work {
            work();
        }
    }
}
