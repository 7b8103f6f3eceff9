//! Single-thread execution affinity for host state.
//!
//! Operations that touch host state must run on one designated thread. The
//! executor owns that thread and a job queue. Callers on other threads
//! enqueue a job and block until its result comes back; a caller already on
//! the thread runs the job in place, so nested submissions cannot deadlock.
//! A panicking job is reported as an error and the thread keeps serving.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};

use crate::error::AffinityError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs on one dedicated thread.
pub struct AffinityExecutor {
    sender: Mutex<Option<Sender<Job>>>,
    thread_id: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AffinityExecutor {
    /// Starts the affinity thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to create the thread.
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_jobs(&receiver))?;

        debug!(thread = name, "Affinity thread started");
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            thread_id: handle.thread().id(),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Whether the caller is running on the affinity thread.
    #[must_use]
    pub fn is_affinity_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Runs `job` on the affinity thread and waits for its result.
    ///
    /// # Errors
    ///
    /// [`AffinityError::Panicked`] if the job panicked,
    /// [`AffinityError::Stopped`] if the executor has shut down.
    pub fn invoke_and_wait<F, T>(&self, job: F) -> Result<T, AffinityError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.is_affinity_thread() {
            return run_caught(job);
        }

        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(AffinityError::Stopped)?;

        let (reply, result) = crossbeam_channel::bounded(1);
        sender
            .send(Box::new(move || {
                // The caller may have given up; nothing to do then.
                let _ = reply.send(run_caught(job));
            }))
            .map_err(|_| AffinityError::Stopped)?;

        result.recv().map_err(|_| AffinityError::Stopped)?
    }

    /// Stops accepting jobs, lets queued jobs finish and joins the thread.
    ///
    /// Called from the affinity thread itself, the thread is detached
    /// instead of joined.
    pub fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if self.is_affinity_thread() {
                return;
            }
            if handle.join().is_err() {
                warn!("Affinity thread terminated abnormally");
            }
        }
        debug!("Affinity thread stopped");
    }
}

impl Drop for AffinityExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_jobs(receiver: &Receiver<Job>) {
    for job in receiver {
        job();
    }
}

/// Runs `job`, converting a panic into [`AffinityError::Panicked`].
pub(crate) fn run_caught<F, T>(job: F) -> Result<T, AffinityError>
where
    F: FnOnce() -> T,
{
    panic::catch_unwind(AssertUnwindSafe(job))
        .map_err(|payload| AffinityError::Panicked(panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
