mod classify;
mod config;
mod detector;
mod error;
mod listener;
mod logging;
mod processor;
mod queue;
mod relocate;
mod shutdown;
mod task;
mod worker;

use std::fs;
use std::io;
use std::process::ExitCode;
use std::thread;

use log::{error, info};

use crate::classify::Classifier;
use crate::config::Config;
use crate::detector::Labels;
use crate::error::WatchError;
use crate::listener::{Listener, ListenerStats};
use crate::processor::Processor;
use crate::queue::TaskQueue;
use crate::shutdown::{Shutdown, join_task_handle};
use crate::worker::{Worker, WorkerStats};

fn main() -> ExitCode {
    logging::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Clipwatch failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), WatchError> {
    info!("Starting Clipwatch");
    let config = Config::load()?;
    fs::create_dir_all(&config.save_dir)?;

    // Model loading is slow; it finishes before the socket accepts anything.
    let labels = match &config.detector.label_file {
        Some(path) => Labels::from_file(path)?,
        None => Labels::coco(),
    };
    let detector = detector::load(&config.detector);
    let classifier = Classifier::new(detector, labels, config.confidence_threshold);
    let processor = Processor::new(&config, classifier);

    let listener = Listener::bind(&config)?;
    let worker = Worker::new(processor, config.idle_wait());
    let (listener_stats, worker_stats) =
        serve(listener, worker, &TaskQueue::new(), &Shutdown::new())?;

    if let Some(stats) = listener_stats {
        info!(
            "Listener handled {} connections ({} queued, {} dropped)",
            stats.connections, stats.enqueued, stats.dropped
        );
    }
    if let Some(stats) = worker_stats {
        info!(
            "Worker processed {} tasks, saved {} clips, discarded {}",
            stats.processed, stats.relocated, stats.discarded
        );
    }
    info!("Clipwatch stopped");
    Ok(())
}

/// Runs the listener and worker on their own threads until the worker sees
/// `exit`. The listener may stop earlier on a socket failure; the worker keeps
/// draining the queue regardless.
fn serve(
    listener: Listener,
    worker: Worker,
    queue: &TaskQueue,
    shutdown: &Shutdown,
) -> io::Result<(Option<ListenerStats>, Option<WorkerStats>)> {
    let mut listener_handle = Some(thread::Builder::new().name("listener".into()).spawn({
        let queue = queue.clone();
        let shutdown = shutdown.clone();
        move || listener.run(&queue, &shutdown)
    })?);

    let mut worker_handle = Some(thread::Builder::new().name("worker".into()).spawn({
        let queue = queue.clone();
        let shutdown = shutdown.clone();
        move || worker.run(&queue, &shutdown)
    })?);

    let worker_stats = join_task_handle(&mut worker_handle, "worker");
    // Covers a worker that panicked before it could signal.
    shutdown.trigger();
    let listener_stats = join_task_handle(&mut listener_handle, "listener");
    Ok((listener_stats, worker_stats))
}
