use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{error, warn};

const SLEEP_CHUNK_MS: u64 = 25;

/// Cancellation flag shared by the listener and the worker.
#[derive(Clone, Default, Debug)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Sleeps for `duration` in short chunks. Returns true as soon as shutdown has
/// been triggered.
pub fn sleep_with_cancellation(shutdown: &Shutdown, duration: Duration) -> bool {
    let mut elapsed = Duration::ZERO;
    while elapsed < duration {
        if shutdown.is_triggered() {
            return true;
        }
        let step = (duration - elapsed).min(Duration::from_millis(SLEEP_CHUNK_MS));
        thread::sleep(step);
        elapsed += step;
    }
    shutdown.is_triggered()
}

pub fn join_task_handle<T>(handle: &mut Option<thread::JoinHandle<T>>, task_name: &str) -> Option<T> {
    let handle = handle.take()?;
    if handle.thread().id() == thread::current().id() {
        warn!(
            "Skipping join for `{}` because shutdown was called from the same thread",
            task_name
        );
        return None;
    }

    match handle.join() {
        Ok(value) => Some(value),
        Err(_) => {
            error!("`{}` thread panicked", task_name);
            None
        }
    }
}
