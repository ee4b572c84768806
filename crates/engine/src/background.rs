//! Background expiry sweeper
//!
//! One thread wakes on a fixed interval and asks the engine to evict every
//! expired entry. Stopping drops the signal sender; the thread notices on
//! its next select, finishes any sweep already running, and exits.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use snapkv_core::StoreValue;

use crate::operations::OperationEngine;

/// Periodic expiry sweep running on its own thread
pub struct ExpirySweeper {
    stop_tx: Mutex<Option<Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    interval: Duration,
}

impl ExpirySweeper {
    /// Spawn the sweeper thread
    pub fn start<V: StoreValue>(
        engine: Arc<OperationEngine<V>>,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let handle = thread::Builder::new()
            .name("snapkv-sweeper".to_string())
            .spawn(move || {
                let ticker = channel::tick(interval);
                loop {
                    crossbeam::select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            let report = engine.sweep();
                            if report.evicted > 0 {
                                debug!(
                                    target: "snapkv::sweeper",
                                    evicted = report.evicted,
                                    persisted = report.persisted,
                                    "Periodic sweep"
                                );
                            }
                        }
                    }
                }
            })?;

        info!(
            target: "snapkv::sweeper",
            interval_ms = interval.as_millis() as u64,
            "Expiry sweeper started"
        );

        Ok(ExpirySweeper {
            stop_tx: Mutex::new(Some(stop_tx)),
            handle: Mutex::new(Some(handle)),
            interval,
        })
    }

    /// Sweep period
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True until [`stop`](Self::stop) is called
    pub fn is_running(&self) -> bool {
        self.stop_tx.lock().is_some()
    }

    /// Signal the thread and wait for it to exit. Idempotent.
    pub fn stop(&self) {
        drop(self.stop_tx.lock().take());
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                warn!(target: "snapkv::sweeper", "Sweeper thread panicked");
            } else {
                debug!(target: "snapkv::sweeper", "Expiry sweeper stopped");
            }
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
