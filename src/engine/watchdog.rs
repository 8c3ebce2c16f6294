use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::{debug, warn};

type Pulse = dyn Fn(Instant) -> bool + Send + Sync;

struct WorkerState {
    running: bool,
    stopped: bool,
    last_active: Instant,
    handle: Option<JoinHandle<()>>,
    spawned: usize,
}

struct Shared {
    pulse_every: Duration,
    idle_timeout: Duration,
    pulse: Box<Pulse>,
    state: Mutex<WorkerState>,
}

/// Low-frequency worker that calls `pulse` every `pulse_every` and exits on
/// its own once nothing has been active for `idle_timeout`. `touch` marks
/// activity and restarts the thread when it has idled out.
///
/// `pulse` returns `true` while there is ongoing work (e.g. pointers down),
/// which counts as activity.
#[derive(Clone)]
pub struct MaintenanceWorker {
    shared: Arc<Shared>,
}

impl MaintenanceWorker {
    pub fn new(
        pulse_every: Duration,
        idle_timeout: Duration,
        pulse: impl Fn(Instant) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                pulse_every,
                idle_timeout,
                pulse: Box::new(pulse),
                state: Mutex::new(WorkerState {
                    running: false,
                    stopped: false,
                    last_active: Instant::now(),
                    handle: None,
                    spawned: 0,
                }),
            }),
        }
    }

    pub fn touch(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.last_active = Instant::now();
        if state.running || state.stopped {
            return Ok(());
        }

        if let Some(finished) = state.handle.take()
            && finished.join().is_err()
        {
            warn!("maintenance thread panicked");
        }

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("bubble-maintenance".to_owned())
            .spawn(move || run(&shared))
            .context("failed to spawn maintenance thread")?;
        state.handle = Some(handle);
        state.running = true;
        state.spawned += 1;
        debug!(spawned = state.spawned, "maintenance worker started");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// How many times the thread has been (re)started.
    pub fn spawn_count(&self) -> usize {
        self.shared.state.lock().spawned
    }

    /// Stops the thread and waits for it. Later `touch` calls do nothing.
    pub fn stop(&self) {
        let handle = {
            let mut state = self.shared.state.lock();
            state.stopped = true;
            state.handle.take()
        };
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            warn!("maintenance thread panicked");
        }
        self.shared.state.lock().running = false;
    }
}

fn run(shared: &Shared) {
    loop {
        thread::sleep(shared.pulse_every);
        let now = Instant::now();
        let busy = (shared.pulse)(now);

        let mut state = shared.state.lock();
        if state.stopped {
            state.running = false;
            break;
        }
        if busy {
            state.last_active = now;
        }
        if now.duration_since(state.last_active) >= shared.idle_timeout {
            state.running = false;
            debug!("maintenance worker idle; exiting");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    fn wait_until(limit: Duration, condition: impl Fn() -> bool) -> bool {
        let started = Instant::now();
        while started.elapsed() < limit {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    #[test]
    fn idles_out_and_restarts_lazily() {
        let pulses = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pulses);
        let worker = MaintenanceWorker::new(
            Duration::from_millis(2),
            Duration::from_millis(30),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                false
            },
        );
        assert!(!worker.is_running());

        worker.touch().unwrap();
        assert!(worker.is_running());
        assert!(wait_until(Duration::from_secs(2), || !worker.is_running()));
        assert!(pulses.load(Ordering::SeqCst) > 0);

        worker.touch().unwrap();
        assert!(worker.is_running());
        assert_eq!(worker.spawn_count(), 2);
        worker.stop();
    }

    #[test]
    fn busy_pulse_keeps_worker_alive() {
        let busy = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&busy);
        let worker = MaintenanceWorker::new(
            Duration::from_millis(2),
            Duration::from_millis(20),
            move |_| flag.load(Ordering::SeqCst),
        );
        worker.touch().unwrap();
        thread::sleep(Duration::from_millis(80));
        assert!(worker.is_running());

        busy.store(false, Ordering::SeqCst);
        assert!(wait_until(Duration::from_secs(2), || !worker.is_running()));
        assert_eq!(worker.spawn_count(), 1);
    }

    #[test]
    fn stop_is_final() {
        let worker = MaintenanceWorker::new(
            Duration::from_millis(2),
            Duration::from_secs(5),
            |_| false,
        );
        worker.touch().unwrap();
        worker.stop();
        assert!(!worker.is_running());
        worker.touch().unwrap();
        assert!(!worker.is_running());
        assert_eq!(worker.spawn_count(), 1);
    }
}
