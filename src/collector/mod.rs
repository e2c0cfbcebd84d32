//! Ingestion pipeline: a bounded queue fronted by a worker pool.

use crate::core::{Result, Span, UrpoError};
use crate::storage::StorageBackend;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Point-in-time snapshot of the collector's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorMetrics {
    pub received: u64,
    pub stored: u64,
    pub errors: u64,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    stored: AtomicU64,
    errors: AtomicU64,
}

/// Owns the ingestion queue and worker pool.
///
/// `submit` is non-blocking (`try_send`); `stop` closes the queue and joins
/// every worker, bounded by a deadline.
pub struct Collector {
    sender: Mutex<Option<mpsc::Sender<Span>>>,
    counters: Arc<Counters>,
    stopping: Arc<AtomicBool>,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Collector {
    /// Builds a collector with a bounded queue of the given capacity. Call
    /// [`Collector::start`] to spawn workers before submitting spans.
    pub fn new(buffer_size: usize) -> (Self, mpsc::Receiver<Span>) {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        let collector = Self {
            sender: Mutex::new(Some(sender)),
            counters: Arc::new(Counters::default()),
            stopping: Arc::new(AtomicBool::new(false)),
            worker_handles: Mutex::new(Vec::new()),
        };
        (collector, receiver)
    }

    /// Spawns `workers` tasks draining the queue into `storage`.
    pub fn start(
        &self,
        workers: usize,
        receiver: mpsc::Receiver<Span>,
        storage: Arc<dyn StorageBackend>,
    ) {
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let mut handles = self.worker_handles.lock().expect("worker handle lock poisoned");
        for worker_id in 0..workers {
            let receiver = receiver.clone();
            let storage = storage.clone();
            let counters = self.counters.clone();

            let handle = tokio::spawn(async move {
                loop {
                    let span = {
                        let mut rx = receiver.lock().await;
                        rx.recv().await
                    };
                    let Some(span) = span else { break };

                    match storage.write(span).await {
                        Ok(()) => {
                            counters.stored.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            counters.errors.fetch_add(1, Ordering::Relaxed);
                            tracing::warn!(worker = worker_id, error = %e, "span rejected");
                        }
                    }
                }
            });
            handles.push(handle);
        }
    }

    /// Submits a span for asynchronous processing. Never blocks.
    pub fn submit(&self, span: Span) -> Result<()> {
        if self.stopping.load(Ordering::SeqCst) {
            return Err(UrpoError::ShuttingDown);
        }
        let sender = {
            let guard = self.sender.lock().expect("sender lock poisoned");
            match guard.as_ref() {
                Some(sender) => sender.clone(),
                None => return Err(UrpoError::ShuttingDown),
            }
        };
        match sender.try_send(span) {
            Ok(()) => {
                self.counters.received.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(UrpoError::Backpressure),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(UrpoError::ShuttingDown),
        }
    }

    /// Stops accepting new spans, drains the queue, and joins every worker,
    /// bounded by `deadline`. Idempotent: calling twice is safe.
    pub async fn stop(&self, deadline: Duration) -> Result<()> {
        self.stopping.store(true, Ordering::SeqCst);
        // Drop the sender so `rx.recv()` returns `None` once the queue drains.
        self.sender.lock().expect("sender lock poisoned").take();

        let handles = {
            let mut guard = self.worker_handles.lock().expect("worker handle lock poisoned");
            std::mem::take(&mut *guard)
        };

        let join_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };

        match tokio::time::timeout(deadline, join_all).await {
            Ok(()) => Ok(()),
            Err(_) => Err(UrpoError::DeadlineExceeded),
        }
    }

    /// A value-copy snapshot of the received/stored/errors counters.
    pub fn metrics(&self) -> CollectorMetrics {
        CollectorMetrics {
            received: self.counters.received.load(Ordering::Relaxed),
            stored: self.counters.stored.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
        }
    }
}
