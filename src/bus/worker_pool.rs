//! Fixed-size thread pool used for background dispatch.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use super::DispatchError;

type Job = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// Statistics from the worker pool.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub workers: usize,
    pub jobs_completed: usize,
    pub jobs_failed: usize,
}

#[derive(Default)]
struct PoolState {
    completed: AtomicUsize,
    failed: AtomicUsize,
    in_flight: Mutex<usize>,
    idle: Condvar,
}

impl PoolState {
    fn begin(&self) -> Result<(), DispatchError> {
        let mut in_flight = self
            .in_flight
            .lock()
            .map_err(|_| DispatchError::LockPoisoned("pool begin"))?;
        *in_flight += 1;
        Ok(())
    }

    fn finish(&self) {
        // A poisoned counter only happens if a waiter panicked; keep counting.
        let mut in_flight = match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *in_flight = in_flight.saturating_sub(1);
        if *in_flight == 0 {
            self.idle.notify_all();
        }
    }
}

/// A pool of named worker threads fed through a channel.
///
/// ## Example
///
/// ```ignore
/// let pool = WorkerPool::new(4, "handlers")?;
/// pool.execute(|| {
///     send_welcome_email()?;
///     Ok(())
/// })?;
/// pool.wait_idle()?;
/// let stats = pool.shutdown();
/// ```
pub struct WorkerPool {
    sender: Mutex<Option<Sender<Job>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    state: Arc<PoolState>,
    workers: usize,
}

impl WorkerPool {
    /// Spawn `workers` threads (at least one) named `{thread_name}-{index}`.
    pub fn new(workers: usize, thread_name: &str) -> Result<Self, DispatchError> {
        let workers = workers.max(1);
        let (sender, receiver) = channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let state = Arc::new(PoolState::default());

        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let receiver = Arc::clone(&receiver);
            let state = Arc::clone(&state);
            let handle = thread::Builder::new()
                .name(format!("{}-{}", thread_name, index))
                .spawn(move || worker_loop(receiver, state))?;
            handles.push(handle);
        }

        debug!(workers, thread_name, "worker pool started");

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            handles: Mutex::new(handles),
            state,
            workers,
        })
    }

    /// Queue a job. Fails once the pool has been shut down.
    pub fn execute<F>(&self, job: F) -> Result<(), DispatchError>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let sender = self
            .sender
            .lock()
            .map_err(|_| DispatchError::LockPoisoned("pool sender"))?;
        let Some(sender) = sender.as_ref() else {
            return Err(DispatchError::PoolClosed);
        };

        self.state.begin()?;
        if sender.send(Box::new(job)).is_err() {
            self.state.finish();
            return Err(DispatchError::PoolClosed);
        }
        Ok(())
    }

    /// Block until every queued job has run.
    pub fn wait_idle(&self) -> Result<(), DispatchError> {
        let mut in_flight = self
            .state
            .in_flight
            .lock()
            .map_err(|_| DispatchError::LockPoisoned("pool wait"))?;
        while *in_flight > 0 {
            in_flight = self
                .state
                .idle
                .wait(in_flight)
                .map_err(|_| DispatchError::LockPoisoned("pool wait"))?;
        }
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self.workers,
            jobs_completed: self.state.completed.load(Ordering::SeqCst),
            jobs_failed: self.state.failed.load(Ordering::SeqCst),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().map(|s| s.is_none()).unwrap_or(true)
    }

    /// Stop accepting jobs, let workers drain the queue and join them.
    pub fn shutdown(&self) -> PoolStats {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }

        let handles = match self.handles.lock() {
            Ok(mut handles) => std::mem::take(&mut *handles),
            Err(_) => Vec::new(),
        };
        for handle in handles {
            if handle.join().is_err() {
                error!("worker thread panicked outside a job");
            }
        }

        let stats = self.stats();
        debug!(?stats, "worker pool stopped");
        stats
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(receiver: Arc<Mutex<Receiver<Job>>>, state: Arc<PoolState>) {
    loop {
        let job = match receiver.lock() {
            Ok(receiver) => receiver.recv(),
            Err(_) => break,
        };

        // Sender dropped and queue drained
        let Ok(job) = job else { break };

        match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(Ok(())) => {
                state.completed.fetch_add(1, Ordering::SeqCst);
            }
            Ok(Err(_)) => {
                state.failed.fetch_add(1, Ordering::SeqCst);
            }
            Err(_) => {
                error!("job panicked");
                state.failed.fetch_add(1, Ordering::SeqCst);
            }
        }
        state.finish();
    }
}
