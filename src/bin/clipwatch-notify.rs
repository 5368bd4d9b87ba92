//! One-shot notifier for the clipwatch daemon.
//!
//! Sends a single path (or `exit`) and closes the connection. The daemon never
//! replies.
//!
//! ## Usage
//! `clipwatch-notify /var/lib/motion/01-20240101120000.mp4`
//!
//! ## Environment Variables
//! - `CLIPWATCH_HOST` - daemon host (default: `127.0.0.1`)
//! - `CLIPWATCH_PORT` - daemon port (default: `19011`)

use std::env;
use std::io::Write;
use std::net::TcpStream;

use anyhow::{Context, Result, bail};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 19011;
// The daemon reads one message of at most this many bytes.
const MAX_MESSAGE_BYTES: usize = 1024;

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let (Some(payload), None) = (args.next(), args.next()) else {
        bail!("usage: clipwatch-notify <path|exit>");
    };
    if payload.len() > MAX_MESSAGE_BYTES {
        bail!("payload is {} bytes; the daemon reads at most {MAX_MESSAGE_BYTES}", payload.len());
    }

    let host = env::var("CLIPWATCH_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let port = match env::var("CLIPWATCH_PORT") {
        Ok(raw) => raw
            .parse::<u16>()
            .with_context(|| format!("invalid CLIPWATCH_PORT {raw:?}"))?,
        Err(_) => DEFAULT_PORT,
    };

    let mut stream = TcpStream::connect((host.as_str(), port))
        .with_context(|| format!("failed to connect to {host}:{port}"))?;
    stream
        .write_all(payload.as_bytes())
        .context("failed to send payload")?;
    Ok(())
}
