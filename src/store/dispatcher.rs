use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tracing::debug;
use tracing::error;

use crate::DispatchError;
use crate::DispatcherConfig;
use crate::Error;
use crate::Result;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Execution context for store access.
///
/// `Inline` runs the job on the calling task. `Worker` queues it to a
/// dedicated thread that drains jobs in submission order; the thread exits
/// once every clone of the dispatcher is dropped.
#[derive(Clone, Debug)]
pub enum CacheDispatcher {
    Inline,
    Worker(Arc<WorkerHandle>),
}

#[derive(Debug)]
pub struct WorkerHandle {
    sender: mpsc::Sender<Job>,
}

impl CacheDispatcher {
    pub fn inline() -> Self {
        CacheDispatcher::Inline
    }

    pub fn worker(queue_size: usize) -> Result<Self> {
        let (sender, mut receiver) = mpsc::channel::<Job>(queue_size);

        std::thread::Builder::new()
            .name("normcache-store".into())
            .spawn(move || {
                debug!("store worker started");
                while let Some(job) = receiver.blocking_recv() {
                    // a panicking job drops its reply sender; the caller sees ReplyDropped
                    if std::panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        error!("store job panicked");
                    }
                }
                debug!("store worker stopped");
            })
            .map_err(|e| Error::Fatal(format!("failed to spawn store worker: {e}")))?;

        Ok(CacheDispatcher::Worker(Arc::new(WorkerHandle { sender })))
    }

    pub fn from_config(config: &DispatcherConfig) -> Result<Self> {
        if config.use_worker_thread {
            Self::worker(config.queue_size)
        } else {
            Ok(Self::inline())
        }
    }

    pub fn is_worker(&self) -> bool {
        matches!(self, CacheDispatcher::Worker(_))
    }

    /// Runs `job` in this execution context and returns its result
    pub async fn run<F, R>(
        &self,
        job: F,
    ) -> Result<R>
    where
        F: FnOnce() -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        match self {
            CacheDispatcher::Inline => job(),
            CacheDispatcher::Worker(handle) => {
                let (reply_tx, reply_rx) = oneshot::channel();
                let job: Job = Box::new(move || {
                    let _ = reply_tx.send(job());
                });
                handle.sender.send(job).await.map_err(|_| DispatchError::WorkerStopped)?;
                reply_rx.await.map_err(|_| DispatchError::ReplyDropped)?
            }
        }
    }
}
