//! UI execution context
//!
//! Control state may only be touched from the thread the toolkit assigns to
//! it. [`UiDispatcher`] is the seam for "run this on the UI thread";
//! [`UiThread`] implements it with one dedicated OS thread draining a
//! `crossbeam-channel` job queue.

use crate::error::DispatchError;
use crossbeam_channel::{unbounded, Sender};
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Unit of work queued onto the UI thread
pub type UiJob = Box<dyn FnOnce() + Send + 'static>;

/// Executes callbacks on the UI-owning execution context
pub trait UiDispatcher: Send + Sync {
    /// Queue `job`; it runs later on the UI context
    fn dispatch(&self, job: UiJob) -> Result<(), DispatchError>;
}

/// Run `f` on the UI context and await its result
pub async fn run_on<T, F>(dispatcher: &dyn UiDispatcher, f: F) -> Result<T, DispatchError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    dispatcher.dispatch(Box::new(move || {
        let result = catch_unwind(AssertUnwindSafe(f));
        let _ = tx.send(result);
    }))?;

    match rx.await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(_)) => Err(DispatchError::Panicked),
        Err(_) => Err(DispatchError::Dropped),
    }
}

/// Dedicated UI thread fed by a job queue
pub struct UiThread {
    sender: Option<Sender<UiJob>>,
    handle: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

impl UiThread {
    pub fn spawn(name: &str) -> io::Result<Self> {
        let (sender, receiver) = unbounded::<UiJob>();
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            while let Ok(job) = receiver.recv() {
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    warn!("UI job panicked");
                }
            }
            debug!("UI thread exiting");
        })?;
        let thread_id = handle.thread().id();

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            thread_id,
        })
    }

    /// Id of the UI thread, used by controls to enforce affinity
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Stop accepting jobs, drain the queue and join the thread
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("UI thread terminated abnormally");
            }
        }
    }
}

impl UiDispatcher for UiThread {
    fn dispatch(&self, job: UiJob) -> Result<(), DispatchError> {
        let sender = self.sender.as_ref().ok_or(DispatchError::Closed)?;
        sender.send(job).map_err(|_| DispatchError::Closed)
    }
}

impl Drop for UiThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}
