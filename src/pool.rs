use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;

use tokio::sync::oneshot;

/// Number of agent sessions that may run at the same time.
pub const POOL_SIZE: usize = 4;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-capacity set of OS threads for running blocking automation work.
///
/// The async side never blocks: [`WorkerPool::submit`] pushes the closure onto
/// a FIFO queue and returns a oneshot receiver to await. Capacity is fixed at
/// construction; when every worker is busy, submitted work queues until one
/// frees up.
pub struct WorkerPool {
    sender: Option<mpsc::Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
    submitted: AtomicU64,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "worker pool needs at least one thread");

        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size)
            .map(|n| {
                let receiver = Arc::clone(&receiver);
                thread::Builder::new()
                    .name(format!("agent-worker-{n}"))
                    .spawn(move || worker_loop(receiver))
                    .expect("failed to spawn agent worker thread")
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
            submitted: AtomicU64::new(0),
        }
    }

    /// Queue a blocking unit of work and return a handle to await its result.
    ///
    /// Dropping the receiver abandons the wait only: the closure still runs to
    /// completion on its worker and holds the slot until it finishes. There is
    /// no pool-imposed timeout on a unit of work.
    pub fn submit<F, T>(&self, work: F) -> oneshot::Receiver<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            // A panicking job must not take its worker thread down with it.
            // Dropping `tx` unsent surfaces as a RecvError to the waiter.
            if let Ok(value) = panic::catch_unwind(AssertUnwindSafe(work)) {
                let _ = tx.send(value);
            }
        });

        self.submitted.fetch_add(1, Ordering::Relaxed);
        if let Some(sender) = &self.sender {
            let _ = sender.send(job);
        }
        rx
    }

    pub fn capacity(&self) -> usize {
        self.workers.len()
    }

    /// Total units of work accepted since startup.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }
}

fn worker_loop(receiver: Arc<Mutex<mpsc::Receiver<Job>>>) {
    loop {
        // Hold the lock only long enough to pull the next job off the queue.
        let job = receiver.lock().unwrap().recv();
        match job {
            Ok(job) => job(),
            Err(_) => break, // queue closed, pool is shutting down
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the queue lets workers drain queued and in-flight jobs
        // before they exit.
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
