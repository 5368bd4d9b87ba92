use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::task::Task;

/// FIFO of pending tasks shared by the listener and the worker.
///
/// Every push and pop happens under one mutex. Clones are handles to the same
/// queue. There is no capacity bound.
#[derive(Clone, Default)]
pub struct TaskQueue {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    tasks: Mutex<VecDeque<Task>>,
    ready: Condvar,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, task: Task) {
        self.lock().push_back(task);
        self.shared.ready.notify_one();
    }

    #[cfg(test)]
    pub fn try_dequeue(&self) -> Option<Task> {
        self.lock().pop_front()
    }

    /// Pops the head, waiting up to `timeout` for one to arrive.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<Task> {
        let tasks = self.lock();
        let (mut tasks, _) = self
            .shared
            .ready
            .wait_timeout_while(tasks, timeout, |tasks| tasks.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        tasks.pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes and returns everything still queued, oldest first.
    pub fn drain(&self) -> Vec<Task> {
        self.lock().drain(..).collect()
    }

    // A panic while holding the lock cannot leave the deque half-modified,
    // so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Task>> {
        self.shared
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
