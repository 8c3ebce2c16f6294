use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use crossbeam_channel::{Sender, unbounded};
use parking_lot::Mutex;
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Stop,
}

/// Single worker thread that runs posted jobs one at a time, in post order.
pub struct WorkQueue {
    name: String,
    sender: Sender<Message>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WorkQueue {
    pub fn spawn(name: &str) -> Result<Self> {
        let (sender, receiver) = unbounded::<Message>();
        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                while let Ok(message) = receiver.recv() {
                    match message {
                        Message::Run(job) => job(),
                        Message::Stop => break,
                    }
                }
            })
            .with_context(|| format!("failed to spawn work queue thread {name}"))?;

        Ok(Self {
            name: name.to_owned(),
            sender,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Returns `false` once the queue has been shut down.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) -> bool {
        let posted = self.sender.send(Message::Run(Box::new(job))).is_ok();
        if !posted {
            warn!(queue = %self.name, "dropping job posted after shutdown");
        }
        posted
    }

    /// Blocks until every job posted before this call has run.
    /// Must not be called from inside a job.
    pub fn flush(&self) {
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        if self.post(move || {
            let _ = done_tx.send(());
        }) {
            let _ = done_rx.recv();
        }
    }

    pub fn shutdown(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        let _ = self.sender.send(Message::Stop);
        if handle.join().is_err() {
            warn!(queue = %self.name, "work queue thread panicked");
        }
        debug!(queue = %self.name, "work queue stopped");
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}
