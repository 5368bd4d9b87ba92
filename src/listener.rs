use std::io::{self, ErrorKind, Read};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use log::{error, info, warn};

use crate::config::Config;
use crate::error::WatchError;
use crate::queue::TaskQueue;
use crate::shutdown::{Shutdown, sleep_with_cancellation};
use crate::task::Task;

/// Largest payload read from one connection. Longer paths are truncated by the
/// single read.
pub const MAX_MESSAGE_BYTES: usize = 1024;
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Accepts one-shot notifications and pushes them onto the task queue.
///
/// Each connection carries a single unframed UTF-8 message. Nothing is ever
/// written back; the connection is closed as soon as the read returns.
pub struct Listener {
    socket: TcpListener,
    read_timeout: Duration,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ListenerStats {
    pub connections: usize,
    pub enqueued: usize,
    pub dropped: usize,
}

impl Listener {
    pub fn bind(config: &Config) -> Result<Self, WatchError> {
        let socket = TcpListener::bind(config.bind_addr())?;
        // Accept is polled so the shutdown flag is seen without closing the
        // socket out from under a blocked accept.
        socket.set_nonblocking(true)?;

        let listener = Self {
            socket,
            read_timeout: config.read_timeout(),
        };
        info!("Listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Runs until shutdown is triggered or the socket fails.
    pub fn run(self, queue: &TaskQueue, shutdown: &Shutdown) -> ListenerStats {
        let mut stats = ListenerStats::default();

        loop {
            if shutdown.is_triggered() {
                info!("Listener stopping on shutdown");
                break;
            }

            match self.socket.accept() {
                Ok((stream, peer)) => {
                    stats.connections += 1;
                    match self.receive(stream) {
                        Ok(Some(task)) => {
                            info!("Queue: {task}");
                            queue.enqueue(task);
                            stats.enqueued += 1;
                        }
                        Ok(None) => stats.dropped += 1,
                        Err(err) => {
                            error!("Exiting listener on read error from {peer}: {err}");
                            break;
                        }
                    }
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    sleep_with_cancellation(shutdown, ACCEPT_POLL_INTERVAL);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    error!("Exiting listener on accept error: {err}");
                    break;
                }
            }
        }

        stats
    }

    /// Reads the single message a client sends. The stream is dropped, and
    /// so closed, on every return path.
    fn receive(&self, mut stream: TcpStream) -> io::Result<Option<Task>> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(self.read_timeout))?;

        let mut buf = [0u8; MAX_MESSAGE_BYTES];
        let read = match stream.read(&mut buf) {
            Ok(read) => read,
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                warn!(
                    "Dropping connection that sent nothing within {:?}",
                    self.read_timeout
                );
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        Ok(decode_payload(&buf[..read]))
    }
}

/// Turns raw bytes into a task. Empty, whitespace-only and non-UTF-8 payloads
/// yield nothing. Trailing whitespace is dropped so `echo exit | nc` works.
pub fn decode_payload(bytes: &[u8]) -> Option<Task> {
    match std::str::from_utf8(bytes) {
        Ok(text) => {
            let text = text.trim_end();
            if text.is_empty() {
                None
            } else {
                Some(Task::new(text))
            }
        }
        Err(err) => {
            warn!("Dropping payload that is not valid UTF-8: {err}");
            None
        }
    }
}
