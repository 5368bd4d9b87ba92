use std::fmt;
use std::io;
use std::path::PathBuf;

#[derive(Debug)]
pub enum WatchError {
    Io(io::Error),
    Config(String),
    Relocation { path: PathBuf, source: io::Error },
}

impl fmt::Display for WatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchError::Io(err) => write!(f, "Filesystem error: {err}"),
            WatchError::Config(err) => write!(f, "Configuration error: {err}"),
            WatchError::Relocation { path, source } => {
                write!(f, "Failed to relocate {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for WatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WatchError::Io(err) => Some(err),
            WatchError::Relocation { source, .. } => Some(source),
            WatchError::Config(_) => None,
        }
    }
}

impl From<io::Error> for WatchError {
    fn from(value: io::Error) -> Self {
        WatchError::Io(value)
    }
}

