// SPDX-License-Identifier: GPL-3.0-only
//! Background execution context for platform callbacks
//!
//! Every device, session and image callback of every feed runs on one
//! dedicated thread. This serializes callback delivery across feeds. The
//! thread is started lazily by the server and stopped with a blocking join;
//! once [`CallbackWorker::stop`] returns, no posted job runs any more.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// A unit of work posted to the worker
pub type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Quit,
}

/// Handle used by platforms to post callbacks onto the worker thread
///
/// Cheap to clone. Posting after the worker stopped is a no-op that
/// returns `false`.
#[derive(Clone)]
pub struct WorkerHandle {
    sender: Sender<Message>,
    stop_signal: Arc<AtomicBool>,
}

impl WorkerHandle {
    /// Queue a job; returns `false` if the worker has stopped
    pub fn post<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.stop_signal.load(Ordering::SeqCst) {
            return false;
        }
        self.sender.send(Message::Run(Box::new(job))).is_ok()
    }

    /// Whether the worker behind this handle is still accepting jobs
    pub fn is_alive(&self) -> bool {
        !self.stop_signal.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// The shared callback thread
pub struct CallbackWorker {
    /// Thread handle for joining
    thread_handle: Option<JoinHandle<()>>,
    /// Set once stopping; pending jobs are discarded after this
    stop_signal: Arc<AtomicBool>,
    sender: Sender<Message>,
    /// Name for logging
    name: String,
}

impl CallbackWorker {
    /// Spawn the worker thread
    pub fn start(name: &str) -> std::io::Result<Self> {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let (sender, receiver) = mpsc::channel();

        info!(name = %name, "Starting camera callback worker");

        let thread_stop = Arc::clone(&stop_signal);
        let thread_name = name.to_string();
        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(thread_name, receiver, thread_stop))?;

        Ok(Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            sender,
            name: name.to_string(),
        })
    }

    /// Handle for posting jobs
    pub fn handle(&self) -> WorkerHandle {
        WorkerHandle {
            sender: self.sender.clone(),
            stop_signal: Arc::clone(&self.stop_signal),
        }
    }

    /// Check if the thread is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Stop the worker and wait for the thread to finish
    ///
    /// A job already running completes; queued jobs are dropped unrun.
    /// Calling this from the worker thread itself only signals the stop.
    pub fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        let _ = self.sender.send(Message::Quit);

        let Some(handle) = self.thread_handle.take() else {
            return;
        };

        if handle.thread().id() == thread::current().id() {
            warn!(name = %self.name, "Worker asked to stop itself; not joining");
            return;
        }

        debug!(name = %self.name, "Waiting for callback worker to finish");
        if let Err(e) = handle.join() {
            warn!(name = %self.name, "Callback worker panicked: {:?}", e);
        } else {
            info!(name = %self.name, "Callback worker stopped");
        }
    }
}

fn run(name: String, receiver: Receiver<Message>, stop_signal: Arc<AtomicBool>) {
    debug!(name = %name, "Callback worker thread started");

    while let Ok(message) = receiver.recv() {
        if stop_signal.load(Ordering::SeqCst) {
            debug!(name = %name, "Stop signal received");
            break;
        }
        match message {
            Message::Run(job) => job(),
            Message::Quit => break,
        }
    }

    debug!(name = %name, "Callback worker thread exiting");
}

impl Drop for CallbackWorker {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "CallbackWorker dropped, stopping");
            self.stop();
        }
    }
}

impl std::fmt::Debug for CallbackWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackWorker")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}
