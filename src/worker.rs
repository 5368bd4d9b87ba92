use std::time::Duration;

use log::{debug, info, warn};

use crate::processor::{Outcome, Processor};
use crate::queue::TaskQueue;
use crate::shutdown::Shutdown;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: usize,
    pub relocated: usize,
    /// Tasks still queued when `exit` arrived.
    pub discarded: usize,
}

/// Drains the task queue one task at a time until the exit token arrives.
pub struct Worker {
    processor: Processor,
    idle_wait: Duration,
}

impl Worker {
    pub fn new(processor: Processor, idle_wait: Duration) -> Self {
        Self {
            processor,
            idle_wait,
        }
    }

    /// Blocks until an `exit` task is dequeued, then triggers `shutdown` so
    /// the listener stops accepting.
    pub fn run(self, queue: &TaskQueue, shutdown: &Shutdown) -> WorkerStats {
        info!("Worker started");
        let mut stats = WorkerStats::default();

        loop {
            let Some(task) = queue.dequeue_timeout(self.idle_wait) else {
                continue;
            };
            debug!("Dequeued {task} ({} still queued)", queue.len());

            match self.processor.process(&task) {
                Outcome::Exit => {
                    info!("Received exit; stopping worker");
                    shutdown.trigger();
                    break;
                }
                Outcome::Relocated(_) => {
                    stats.processed += 1;
                    stats.relocated += 1;
                }
                _ => stats.processed += 1,
            }
        }

        let leftover = queue.drain();
        if !leftover.is_empty() {
            warn!("Discarding {} tasks queued behind exit", leftover.len());
        }
        stats.discarded = leftover.len();
        stats
    }
}
