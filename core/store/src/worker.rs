//! Dedicated worker thread for a store.
//!
//! Stores assume a single writer. A [`StoreWorker`] owns one store on its
//! own thread and runs submitted operations one at a time, in submission
//! order, off the caller's (possibly async) thread.

use std::cmp::Ordering;
use std::future::Future;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::directory::Directory;
use crate::index::ChunkedIndex;
use coffer_common::{Error, Result};
use coffer_document::Serializable;

/// A store that can be flushed and closed by a [`StoreWorker`].
pub trait Durable: Send + 'static {
    /// Persist buffered state.
    fn flush(&mut self) -> Result<()>;

    /// Flush and release the store.
    fn close(&mut self) -> Result<()>;
}

impl Durable for Directory {
    fn flush(&mut self) -> Result<()> {
        Directory::flush(self)
    }

    fn close(&mut self) -> Result<()> {
        Directory::close(self)
    }
}

impl<T, C> Durable for ChunkedIndex<T, C>
where
    T: Serializable + Clone + PartialEq + Send + 'static,
    C: Fn(&T, &T) -> Ordering + Send + 'static,
{
    fn flush(&mut self) -> Result<()> {
        ChunkedIndex::flush(self)
    }

    fn close(&mut self) -> Result<()> {
        ChunkedIndex::close(self)
    }
}

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

enum Request<S> {
    Run(Job<S>),
    Flush(oneshot::Sender<Result<()>>),
    Close(oneshot::Sender<Result<()>>),
}

fn stopped() -> Error {
    Error::Storage("Store worker is not running".to_string())
}

/// Handle to a store running on a dedicated thread.
///
/// Operations are accepted when submitted and always run to completion.
/// Dropping the handle without [`close`](Self::close) closes the store
/// best-effort once every submitted operation has run.
pub struct StoreWorker<S: Durable> {
    request_tx: mpsc::Sender<Request<S>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl<S: Durable> StoreWorker<S> {
    /// Move `store` onto a new worker thread.
    ///
    /// # Errors
    /// - The thread cannot be spawned
    pub fn spawn(store: S, config: WorkerConfig) -> Result<Self> {
        let (request_tx, request_rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("coffer-store".to_string())
            .spawn(move || serve(store, request_rx, config))?;

        Ok(Self {
            request_tx,
            thread: Some(thread),
        })
    }

    fn send(&self, request: Request<S>) -> Result<()> {
        self.request_tx.send(request).map_err(|_| stopped())
    }

    /// Submit an operation and wait for its result.
    ///
    /// The operation is queued immediately; the returned future only waits
    /// for the result. Dropping the future does not cancel the operation.
    pub fn run<F, R>(&self, operation: F) -> impl Future<Output = Result<R>>
    where
        F: FnOnce(&mut S) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job<S> = Box::new(move |store: &mut S| {
            let _ = reply_tx.send(operation(store));
        });
        let sent = self.send(Request::Run(job));

        async move {
            sent?;
            reply_rx.await.map_err(|_| stopped())?
        }
    }

    /// Flush the store after every previously submitted operation.
    pub fn flush(&self) -> impl Future<Output = Result<()>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let sent = self.send(Request::Flush(reply_tx));

        async move {
            sent?;
            reply_rx.await.map_err(|_| stopped())?
        }
    }

    /// Close the store and stop the worker.
    ///
    /// Runs after every previously submitted operation, then flushes and
    /// closes the store and joins the thread.
    pub async fn close(mut self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Request::Close(reply_tx))?;
        let result = reply_rx.await.map_err(|_| stopped())?;

        if let Some(thread) = self.thread.take() {
            tokio::task::spawn_blocking(move || thread.join())
                .await
                .map_err(|e| Error::Storage(format!("Failed to join store worker: {}", e)))?
                .map_err(|_| Error::Storage("Store worker panicked".to_string()))?;
        }
        result
    }
}

fn serve<S: Durable>(mut store: S, request_rx: mpsc::Receiver<Request<S>>, config: WorkerConfig) {
    info!(flush_interval = ?config.flush_interval, "Store worker started");

    let mut next_flush = config.flush_interval.map(|period| Instant::now() + period);
    let mut modified = false;

    loop {
        let received = match next_flush {
            Some(deadline) => {
                request_rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
            }
            None => request_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(Request::Run(job)) => {
                job(&mut store);
                modified = true;
            }
            Ok(Request::Flush(reply_tx)) => {
                let result = store.flush();
                modified = result.is_err();
                let _ = reply_tx.send(result);
            }
            Ok(Request::Close(reply_tx)) => {
                let result = store.close();
                if let Err(e) = &result {
                    error!(error = %e, "Store close failed");
                }
                let _ = reply_tx.send(result);
                info!("Store worker stopped");
                return;
            }
            Err(RecvTimeoutError::Timeout) => {
                if modified {
                    debug!("Periodic store flush");
                    match store.flush() {
                        Ok(()) => modified = false,
                        Err(e) => warn!(error = %e, "Periodic store flush failed"),
                    }
                }
                next_flush = config.flush_interval.map(|period| Instant::now() + period);
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Store worker dropped without close");
                if let Err(e) = store.close() {
                    error!(error = %e, "Store close failed");
                }
                return;
            }
        }
    }
}
