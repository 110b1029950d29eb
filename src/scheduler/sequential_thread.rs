//! Scheduler with one dedicated thread draining a FIFO queue.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::{
    DataWeigher, Handler, SchedulerCore, SchedulerSettings, TaskScheduler, TaskSchedulerType,
};
use crate::core::SchedulerError;

/// Tasks drained per wake-up when no batch size is configured.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// How often an idle scheduler thread re-checks its liveness flag.
const IDLE_POLL: Duration = Duration::from_millis(10);

struct Queued<T> {
    handler: Handler<T>,
    data: T,
    weight: u64,
}

/// One run of the drain thread, from `start` until it exits.
struct Drainer {
    handle: JoinHandle<()>,
    alive: Arc<AtomicBool>,
    /// Disconnects when the thread exits; nothing is ever sent.
    exited: Receiver<()>,
}

impl Drainer {
    fn is_current(&self) -> bool {
        self.handle.thread().id() == thread::current().id()
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire) && !self.handle.is_finished()
    }

    fn join(self, name: &str) {
        if self.handle.join().is_err() {
            warn!(scheduler = %name, "scheduler thread panicked");
        }
    }
}

/// Runs tasks one at a time, in insertion order, on a thread owned by the scheduler.
///
/// Insertion only reserves capacity and enqueues, so a producer never waits for a
/// handler to run. Capacity is weighed per payload when a [`DataWeigher`] is set.
///
/// The thread must be started with [`start`](TaskScheduler::start). Tasks inserted
/// before that wait in the queue. [`stop`](TaskScheduler::stop) lets the batch in
/// progress finish and leaves the rest queued for a later `start`. At most one drain
/// thread runs at a time: `start` waits for a stopping thread to exit first.
///
/// Dropping the scheduler discards whatever is still queued and releases its capacity.
pub struct SequentialThreadScheduler<T> {
    core: Arc<SchedulerCore>,
    weigher: Option<DataWeigher<T>>,
    batch_size: usize,
    tx: Sender<Queued<T>>,
    rx: Receiver<Queued<T>>,
    drainer: Mutex<Option<Drainer>>,
}

impl<T> fmt::Debug for SequentialThreadScheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequentialThreadScheduler")
            .field("core", &self.core)
            .field("batch_size", &self.batch_size)
            .field("queued", &self.rx.len())
            .field(
                "running",
                &self.drainer.lock().as_ref().is_some_and(Drainer::is_alive),
            )
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> SequentialThreadScheduler<T> {
    /// Creates a stopped scheduler.
    ///
    /// Without a `weigher` every payload weighs 1. A `batch_size` of zero is treated
    /// as one.
    pub fn new(
        settings: SchedulerSettings,
        weigher: Option<DataWeigher<T>>,
        batch_size: usize,
    ) -> Self {
        let (tx, rx) = unbounded();
        Self {
            core: Arc::new(SchedulerCore::new(
                TaskSchedulerType::SequentialThread,
                settings,
            )),
            weigher,
            batch_size: batch_size.max(1),
            tx,
            rx,
            drainer: Mutex::new(None),
        }
    }

    /// Whether the scheduler thread is running and has not been asked to stop.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.drainer.lock().as_ref().is_some_and(Drainer::is_alive)
    }

    /// Tasks waiting in the queue, excluding the one currently executing.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.rx.len()
    }

    fn weigh(&self, data: &T) -> u64 {
        self.weigher.as_ref().map_or(1, |weigher| weigher(data))
    }

    fn enqueue(&self, handler: &Handler<T>, data: T, weight: u64) {
        let queued = Queued {
            handler: Arc::clone(handler),
            data,
            weight,
        };
        if let Err(e) = self.tx.send(queued) {
            // The scheduler owns a receiver, so this only happens mid-teardown.
            let lost = e.into_inner();
            self.core.off_ramp().off_ramp(lost.weight);
            error!(scheduler = %self.core.name(), "queue closed; task dropped");
        }
    }

    fn spawn(&self) -> Result<Drainer, SchedulerError> {
        let alive = Arc::new(AtomicBool::new(true));
        let (exit_tx, exited) = crossbeam_channel::bounded::<()>(0);
        let core = Arc::clone(&self.core);
        let rx = self.rx.clone();
        let flag = Arc::clone(&alive);
        let batch_size = self.batch_size;
        let handle = thread::Builder::new()
            .name(format!("taskwire-{}", self.core.name()))
            .spawn(move || {
                let _exit = exit_tx;
                drain(&core, &rx, &flag, batch_size);
            })
            .map_err(|e| SchedulerError::ThreadSpawn {
                name: self.core.name().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Drainer {
            handle,
            alive,
            exited,
        })
    }
}

impl<T: Send + 'static> TaskScheduler<T> for SequentialThreadScheduler<T> {
    fn core(&self) -> &SchedulerCore {
        &self.core
    }

    fn put(&self, handler: &Handler<T>, data: T) -> Result<(), SchedulerError> {
        let weight = self.weigh(&data);
        self.core.on_ramp().on_ramp(weight);
        self.enqueue(handler, data, weight);
        Ok(())
    }

    fn offer(&self, handler: &Handler<T>, data: T) -> Result<bool, SchedulerError> {
        let weight = self.weigh(&data);
        if !self.core.on_ramp().attempt_on_ramp(weight) {
            return Ok(false);
        }
        self.enqueue(handler, data, weight);
        Ok(true)
    }

    fn inject(&self, handler: &Handler<T>, data: T) -> Result<(), SchedulerError> {
        let weight = self.weigh(&data);
        self.core.on_ramp().force_on_ramp(weight);
        self.enqueue(handler, data, weight);
        Ok(())
    }

    fn start(&self) -> Result<(), SchedulerError> {
        loop {
            let mut slot = self.drainer.lock();
            if let Some(drainer) = slot.as_ref() {
                if drainer.is_alive() {
                    return Err(SchedulerError::AlreadyStarted(self.core.name().to_string()));
                }
                if drainer.is_current() {
                    // Restarted from one of its own handlers: keep draining on this thread.
                    drainer.alive.store(true, Ordering::Release);
                    info!(scheduler = %self.core.name(), "scheduler thread resumed");
                    return Ok(());
                }
                if !drainer.handle.is_finished() {
                    let exited = drainer.exited.clone();
                    drop(slot);
                    debug!(scheduler = %self.core.name(), "waiting for stopping thread to exit");
                    let _ = exited.recv();
                    continue;
                }
            }

            if let Some(previous) = slot.take() {
                previous.join(self.core.name());
            }
            *slot = Some(self.spawn()?);
            info!(
                scheduler = %self.core.name(),
                batch_size = self.batch_size,
                "scheduler thread started"
            );
            return Ok(());
        }
    }

    fn stop(&self) {
        let (exited, alive) = {
            let slot = self.drainer.lock();
            let Some(drainer) = slot.as_ref() else {
                return;
            };
            drainer.alive.store(false, Ordering::Release);
            if drainer.is_current() {
                debug!(scheduler = %self.core.name(), "stop requested from scheduler thread");
                return;
            }
            (drainer.exited.clone(), Arc::clone(&drainer.alive))
        };

        loop {
            match exited.recv_timeout(IDLE_POLL) {
                Err(RecvTimeoutError::Timeout) if alive.load(Ordering::Acquire) => {
                    debug!(scheduler = %self.core.name(), "scheduler thread resumed while stopping");
                    return;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let mut slot = self.drainer.lock();
        if slot
            .as_ref()
            .is_some_and(|drainer| Arc::ptr_eq(&drainer.alive, &alive))
        {
            if let Some(drainer) = slot.take() {
                drainer.join(self.core.name());
            }
            info!(
                scheduler = %self.core.name(),
                queued = self.rx.len(),
                "scheduler thread stopped"
            );
        }
    }
}

impl<T> Drop for SequentialThreadScheduler<T> {
    fn drop(&mut self) {
        if let Some(drainer) = self.drainer.get_mut().take() {
            drainer.alive.store(false, Ordering::Release);
            if !drainer.is_current() {
                drainer.join(self.core.name());
            }
        }

        let mut discarded = 0_usize;
        while let Ok(queued) = self.rx.try_recv() {
            self.core.off_ramp().off_ramp(queued.weight);
            discarded += 1;
        }
        if discarded > 0 {
            warn!(
                scheduler = %self.core.name(),
                discarded = discarded,
                "scheduler dropped with queued tasks; their capacity was released"
            );
        }
    }
}

/// Body of the scheduler thread.
fn drain<T>(core: &SchedulerCore, rx: &Receiver<Queued<T>>, alive: &AtomicBool, batch_size: usize) {
    debug!(scheduler = %core.name(), "drain loop running");
    while alive.load(Ordering::Acquire) {
        let first = match rx.recv_timeout(IDLE_POLL) {
            Ok(queued) => queued,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        run(core, first);
        for _ in 1..batch_size {
            match rx.try_recv() {
                Ok(queued) => run(core, queued),
                Err(_) => break,
            }
        }
    }
    debug!(scheduler = %core.name(), "drain loop exiting");
}

fn run<T>(core: &SchedulerCore, queued: Queued<T>) {
    core.execute(&queued.handler, queued.data, queued.weight);
}
