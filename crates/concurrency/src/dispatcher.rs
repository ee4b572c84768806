//! Operation dispatcher
//!
//! Callers never touch the map directly. Each call is packaged as a job with
//! a one-shot reply channel and pushed onto one of two bounded lanes:
//!
//! ```text
//!   create/update/delete/batch ──► write lane ──► 1 writer thread  ─┐
//!                                                                    ├─► handler
//!   read ───────────────────────► read lane  ──► N reader threads ─┘
//! ```
//!
//! A full lane blocks the caller (backpressure). Within the write lane jobs
//! run in FIFO order; readers share one receiver and run concurrently.
//!
//! ## Shutdown
//!
//! [`Dispatcher::close`] drops the dispatcher's senders. Workers keep
//! draining until every job already enqueued has run, then exit, and
//! `close` joins them. Calls made after `close` fail with
//! [`DispatchError::Closed`].

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use snapkv_core::StoreError;

/// Which lane an operation travels on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    /// Serialized through the single writer
    Write,
    /// Shared by the reader pool
    Read,
}

/// Executes operations on behalf of the worker threads
pub trait OperationHandler: Send + Sync + 'static {
    /// Operation submitted by callers
    type Op: Send + 'static;
    /// Result handed back to the caller
    type Output: Send + 'static;

    /// Lane for `op`
    fn lane(&self, op: &Self::Op) -> Lane;

    /// Run `op` to completion
    fn execute(&self, op: Self::Op) -> Self::Output;
}

/// Dispatcher errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The dispatcher no longer accepts work
    #[error("dispatcher is closed")]
    Closed,

    /// Caller deadline elapsed; the job may still run
    #[error("timed out waiting for the operation")]
    Timeout,

    /// The worker dropped the reply without answering
    #[error("worker terminated before replying")]
    WorkerGone,
}

impl From<DispatchError> for StoreError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Closed => StoreError::Closed,
            DispatchError::Timeout => StoreError::Timeout,
            DispatchError::WorkerGone => StoreError::internal(e.to_string()),
        }
    }
}

/// Dispatcher sizing
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Bound of each lane
    pub queue_capacity: usize,
    /// Reader threads sharing the read lane
    pub reader_threads: usize,
    /// Optional per-call deadline
    pub call_timeout: Option<Duration>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            queue_capacity: 100,
            reader_threads: 2,
            call_timeout: None,
        }
    }
}

struct Job<H: OperationHandler> {
    op: H::Op,
    reply: Sender<H::Output>,
}

/// Routes operations from callers to worker threads
pub struct Dispatcher<H: OperationHandler> {
    write_tx: Mutex<Option<Sender<Job<H>>>>,
    read_tx: Mutex<Option<Sender<Job<H>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    handler: Arc<H>,
    call_timeout: Option<Duration>,
}

impl<H: OperationHandler> Dispatcher<H> {
    /// Spawn the writer and reader threads
    pub fn start(handler: Arc<H>, config: &DispatcherConfig) -> std::io::Result<Self> {
        let (write_tx, write_rx) = channel::bounded::<Job<H>>(config.queue_capacity);
        let (read_tx, read_rx) = channel::bounded::<Job<H>>(config.queue_capacity);

        let mut workers = Vec::with_capacity(config.reader_threads + 1);
        workers.push(spawn_worker("snapkv-writer".to_string(), handler.clone(), write_rx)?);
        for i in 0..config.reader_threads {
            workers.push(spawn_worker(
                format!("snapkv-reader-{}", i),
                handler.clone(),
                read_rx.clone(),
            )?);
        }

        debug!(
            target: "snapkv::dispatch",
            queue_capacity = config.queue_capacity,
            reader_threads = config.reader_threads,
            "Dispatcher started"
        );

        Ok(Dispatcher {
            write_tx: Mutex::new(Some(write_tx)),
            read_tx: Mutex::new(Some(read_tx)),
            workers: Mutex::new(workers),
            handler,
            call_timeout: config.call_timeout,
        })
    }

    /// Submit `op` and wait for its result.
    ///
    /// Blocks while the lane is full. With a deadline configured, gives up
    /// with `Timeout` once it passes; a job already enqueued still runs.
    pub fn call(&self, op: H::Op) -> Result<H::Output, DispatchError> {
        let sender = match self.handler.lane(&op) {
            Lane::Write => self.write_tx.lock().clone(),
            Lane::Read => self.read_tx.lock().clone(),
        }
        .ok_or(DispatchError::Closed)?;

        let (reply_tx, reply_rx) = channel::bounded(1);
        let job = Job {
            op,
            reply: reply_tx,
        };

        match self.call_timeout {
            None => {
                sender.send(job).map_err(|_| DispatchError::WorkerGone)?;
                drop(sender);
                reply_rx.recv().map_err(|_| DispatchError::WorkerGone)
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                sender.send_timeout(job, timeout).map_err(|e| match e {
                    SendTimeoutError::Timeout(_) => DispatchError::Timeout,
                    SendTimeoutError::Disconnected(_) => DispatchError::WorkerGone,
                })?;
                drop(sender);
                let remaining = deadline.saturating_duration_since(Instant::now());
                reply_rx.recv_timeout(remaining).map_err(|e| match e {
                    RecvTimeoutError::Timeout => DispatchError::Timeout,
                    RecvTimeoutError::Disconnected => DispatchError::WorkerGone,
                })
            }
        }
    }

    /// Stop accepting work, drain both lanes and join every worker.
    ///
    /// Returns false if already closed.
    pub fn close(&self) -> bool {
        let write = self.write_tx.lock().take();
        let read = self.read_tx.lock().take();
        if write.is_none() && read.is_none() {
            return false;
        }
        drop(write);
        drop(read);

        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            let name = worker.thread().name().unwrap_or("worker").to_string();
            if worker.join().is_err() {
                warn!(target: "snapkv::dispatch", worker = %name, "Worker panicked");
            }
        }
        debug!(target: "snapkv::dispatch", "Dispatcher drained and stopped");
        true
    }

    /// True once [`close`](Self::close) has run
    pub fn is_closed(&self) -> bool {
        self.write_tx.lock().is_none()
    }

    /// Handler shared with the workers
    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }
}

impl<H: OperationHandler> Drop for Dispatcher<H> {
    fn drop(&mut self) {
        self.close();
    }
}

fn spawn_worker<H: OperationHandler>(
    name: String,
    handler: Arc<H>,
    jobs: Receiver<Job<H>>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name(name).spawn(move || {
        for job in jobs.iter() {
            let output = handler.execute(job.op);
            // Caller may have timed out and dropped the receiver
            let _ = job.reply.send(output);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    enum TestOp {
        Append(u32),
        Len,
        Sleep(Duration),
    }

    #[derive(Default)]
    struct Recorder {
        log: Mutex<Vec<u32>>,
        executed: AtomicUsize,
    }

    impl OperationHandler for Recorder {
        type Op = TestOp;
        type Output = usize;

        fn lane(&self, op: &TestOp) -> Lane {
            match op {
                TestOp::Len => Lane::Read,
                _ => Lane::Write,
            }
        }

        fn execute(&self, op: TestOp) -> usize {
            self.executed.fetch_add(1, Ordering::SeqCst);
            match op {
                TestOp::Append(n) => {
                    let mut log = self.log.lock();
                    log.push(n);
                    log.len()
                }
                TestOp::Len => self.log.lock().len(),
                TestOp::Sleep(d) => {
                    thread::sleep(d);
                    0
                }
            }
        }
    }

    fn start(config: DispatcherConfig) -> (Arc<Recorder>, Dispatcher<Recorder>) {
        let handler = Arc::new(Recorder::default());
        let dispatcher = Dispatcher::start(handler.clone(), &config).unwrap();
        (handler, dispatcher)
    }

    #[test]
    fn test_writes_run_in_submission_order() {
        let (handler, dispatcher) = start(DispatcherConfig::default());
        for n in 0..20 {
            assert_eq!(dispatcher.call(TestOp::Append(n)).unwrap(), n as usize + 1);
        }
        assert_eq!(dispatcher.call(TestOp::Len).unwrap(), 20);
        assert_eq!(*handler.log.lock(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_close_rejects_new_calls() {
        let (_handler, dispatcher) = start(DispatcherConfig::default());
        assert!(dispatcher.close());
        assert!(dispatcher.is_closed());
        assert_eq!(dispatcher.call(TestOp::Len), Err(DispatchError::Closed));
        assert!(!dispatcher.close());
    }

    #[test]
    fn test_close_drains_enqueued_jobs() {
        let (handler, dispatcher) = start(DispatcherConfig::default());
        let dispatcher = Arc::new(dispatcher);

        // Park the writer so the appends pile up behind it
        let blocker = {
            let d = dispatcher.clone();
            thread::spawn(move || d.call(TestOp::Sleep(Duration::from_millis(300))))
        };
        thread::sleep(Duration::from_millis(30));

        let callers: Vec<_> = (0..10)
            .map(|n| {
                let d = dispatcher.clone();
                thread::spawn(move || d.call(TestOp::Append(n)))
            })
            .collect();
        thread::sleep(Duration::from_millis(100));

        dispatcher.close();
        assert_eq!(handler.log.lock().len(), 10);

        assert!(blocker.join().unwrap().is_ok());
        for caller in callers {
            assert!(caller.join().unwrap().is_ok());
        }
    }

    #[test]
    fn test_deadline_returns_timeout_but_job_still_runs() {
        let (handler, dispatcher) = start(DispatcherConfig {
            call_timeout: Some(Duration::from_millis(20)),
            ..DispatcherConfig::default()
        });

        let result = dispatcher.call(TestOp::Sleep(Duration::from_millis(200)));
        assert_eq!(result, Err(DispatchError::Timeout));

        // Close waits for the sleeping job to finish
        dispatcher.close();
        assert_eq!(handler.executed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispatch_error_maps_to_store_error() {
        assert!(matches!(StoreError::from(DispatchError::Closed), StoreError::Closed));
        assert!(matches!(StoreError::from(DispatchError::Timeout), StoreError::Timeout));
        assert!(matches!(
            StoreError::from(DispatchError::WorkerGone),
            StoreError::Internal(_)
        ));
    }
}
