use std::fmt;
use std::path::PathBuf;

/// Payload that stops the worker.
pub const EXIT_TOKEN: &str = "exit";

/// One notification received from a client: a path, or the exit token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task(String);

/// What the worker should do with a task. Patterns are checked in the order
/// the variants are listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    Exit,
    Clip(PathBuf),
    Image(PathBuf),
    Unrecognized,
}

impl Task {
    pub fn new(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_exit(&self) -> bool {
        self.0 == EXIT_TOKEN
    }

    pub fn kind(&self, clip_extension: &str, image_extension: &str) -> TaskKind {
        if self.is_exit() {
            TaskKind::Exit
        } else if self.0.ends_with(clip_extension) {
            TaskKind::Clip(PathBuf::from(&self.0))
        } else if self.0.ends_with(image_extension) {
            TaskKind::Image(PathBuf::from(&self.0))
        } else {
            TaskKind::Unrecognized
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Event key of a clip path: everything before the first `-`.
///
/// The split runs over the whole path, not just the file name, so a `-` in a
/// parent directory ends the key early. Camera output never contains one.
pub fn group_key(path: &str) -> &str {
    path.split_once('-').map_or(path, |(key, _)| key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(payload: &str) -> TaskKind {
        Task::new(payload).kind(".mp4", ".jpg")
    }

    #[test]
    fn classifies_payloads_in_pattern_order() {
        assert_eq!(kind("exit"), TaskKind::Exit);
        assert_eq!(
            kind("/var/motion/01-20240101.mp4"),
            TaskKind::Clip(PathBuf::from("/var/motion/01-20240101.mp4"))
        );
        assert_eq!(
            kind("/var/motion/01-20240101-03.jpg"),
            TaskKind::Image(PathBuf::from("/var/motion/01-20240101-03.jpg"))
        );
        assert_eq!(kind("/var/motion/notes.txt"), TaskKind::Unrecognized);
    }

    #[test]
    fn exit_must_match_exactly() {
        assert_eq!(kind("EXIT"), TaskKind::Unrecognized);
        assert_eq!(kind("exit now"), TaskKind::Unrecognized);
        assert!(!Task::new("exit.mp4").is_exit());
    }

    #[test]
    fn extension_match_is_a_suffix_match() {
        assert_eq!(kind("clip.mp4.bak"), TaskKind::Unrecognized);
        assert_eq!(kind("clip.MP4"), TaskKind::Unrecognized);
    }

    #[test]
    fn group_key_splits_on_first_dash() {
        assert_eq!(group_key("/var/motion/01-20240101-1200.mp4"), "/var/motion/01");
        assert_eq!(group_key("nodash.mp4"), "nodash.mp4");
        assert_eq!(group_key("/var/cam-a/01-x.mp4"), "/var/cam");
    }
}
