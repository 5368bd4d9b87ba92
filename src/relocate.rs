use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use log::{error, info};

use crate::error::WatchError;

/// Where a saved clip and its matching image ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    pub clip: PathBuf,
    pub image: PathBuf,
}

/// Moves `clip` and `image` into `save_dir`, keeping their file names.
///
/// Either both files move or neither does: when the image move fails the clip
/// is moved back before the error is returned.
pub fn relocate_pair(save_dir: &Path, clip: &Path, image: &Path) -> Result<Relocation, WatchError> {
    let clip_dest = move_into(save_dir, clip)?;
    match move_into(save_dir, image) {
        Ok(image_dest) => {
            info!(
                "Saved {} and {} to {}",
                clip.display(),
                image.display(),
                save_dir.display()
            );
            Ok(Relocation {
                clip: clip_dest,
                image: image_dest,
            })
        }
        Err(err) => {
            if let Err(rollback) = move_file(&clip_dest, clip) {
                error!(
                    "Failed to restore {} after partial relocation: {rollback}",
                    clip.display()
                );
            }
            Err(err)
        }
    }
}

/// Moves one file into `dir`, keeping its file name.
pub fn move_into(dir: &Path, path: &Path) -> Result<PathBuf, WatchError> {
    let relocation_error = |source| WatchError::Relocation {
        path: path.to_path_buf(),
        source,
    };

    let name = path
        .file_name()
        .ok_or_else(|| relocation_error(io::Error::new(ErrorKind::InvalidInput, "path has no file name")))?;
    let dest = dir.join(name);
    move_file(path, &dest).map_err(relocation_error)?;
    Ok(dest)
}

// Rename fails across filesystems (e.g. onto a USB disk), so fall back to
// copy + remove while the source still exists.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(err) if from.is_file() => {
            if fs::copy(from, to).is_err() {
                let _ = fs::remove_file(to);
                return Err(err);
            }
            fs::remove_file(from)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path, contents: &str) {
        fs::write(path, contents).expect("write fixture");
    }

    #[test]
    fn moves_both_files_keeping_names() {
        let source = tempfile::tempdir().expect("source dir");
        let saves = tempfile::tempdir().expect("save dir");
        let clip = source.path().join("07-20240101.mp4");
        let image = source.path().join("07-20240101-02.jpg");
        touch(&clip, "clip");
        touch(&image, "image");

        let moved = relocate_pair(saves.path(), &clip, &image).expect("relocate");

        assert_eq!(moved.clip, saves.path().join("07-20240101.mp4"));
        assert_eq!(moved.image, saves.path().join("07-20240101-02.jpg"));
        assert!(!clip.exists());
        assert!(!image.exists());
        assert_eq!(fs::read_to_string(&moved.clip).expect("read clip"), "clip");
        assert_eq!(fs::read_to_string(&moved.image).expect("read image"), "image");
    }

    #[test]
    fn failed_image_move_restores_clip() {
        let source = tempfile::tempdir().expect("source dir");
        let saves = tempfile::tempdir().expect("save dir");
        let clip = source.path().join("08-20240101.mp4");
        let image = source.path().join("08-20240101-01.jpg");
        touch(&clip, "clip");

        let err = relocate_pair(saves.path(), &clip, &image).unwrap_err();

        assert!(matches!(err, WatchError::Relocation { ref path, .. } if path == &image));
        assert!(clip.exists());
        assert!(!saves.path().join("08-20240101.mp4").exists());
    }

    #[test]
    fn missing_clip_moves_nothing() {
        let source = tempfile::tempdir().expect("source dir");
        let saves = tempfile::tempdir().expect("save dir");
        let clip = source.path().join("09-20240101.mp4");
        let image = source.path().join("09-20240101-01.jpg");
        touch(&image, "image");

        assert!(relocate_pair(saves.path(), &clip, &image).is_err());
        assert!(image.exists());
    }

    #[test]
    fn missing_save_dir_is_an_error() {
        let source = tempfile::tempdir().expect("source dir");
        let clip = source.path().join("10-20240101.mp4");
        touch(&clip, "clip");

        let err = move_into(&source.path().join("nope"), &clip).unwrap_err();
        assert!(err.to_string().contains("Failed to relocate"));
        assert!(clip.exists());
    }
}
