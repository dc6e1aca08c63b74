//! Background line reader feeding the counting loop

use super::IngestError;
use crossbeam_channel::{bounded, Receiver, Sender};
use ignore::WalkBuilder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use tracing::warn;

pub(super) enum ReadEvent {
    FileStart(PathBuf),
    Line(String),
    /// The file could not be opened or stopped being readable; the reader
    /// moves on to the next one.
    Failed { path: PathBuf, error: std::io::Error },
}

/// A single file, or every regular file below a directory in path order.
pub(super) fn collect_input_files(input: &Path) -> Result<Vec<PathBuf>, IngestError> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(IngestError::InputNotFound(input.to_path_buf()));
    }

    let mut files = Vec::new();
    let walker = WalkBuilder::new(input)
        .hidden(true)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build();
    for entry in walker {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_some_and(|t| t.is_file()) {
                    files.push(entry.into_path());
                }
            }
            Err(e) => {
                let error = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
                if files.is_empty() && error.kind() == std::io::ErrorKind::PermissionDenied {
                    return Err(IngestError::Walk {
                        path: input.to_path_buf(),
                        source: error,
                    });
                }
                warn!("Skipping unreadable entry below {}: {}", input.display(), error);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Start a thread that streams the lines of `files` through a bounded
/// channel. The thread stops early once the receiver is dropped.
pub(super) fn spawn_reader(files: Vec<PathBuf>, capacity: usize) -> (Receiver<ReadEvent>, JoinHandle<()>) {
    let (tx, rx) = bounded(capacity);
    let handle = std::thread::spawn(move || {
        for path in files {
            if !read_file(&path, &tx) {
                return;
            }
        }
    });
    (rx, handle)
}

/// Returns false when the receiver hung up.
fn read_file(path: &Path, tx: &Sender<ReadEvent>) -> bool {
    if tx.send(ReadEvent::FileStart(path.to_path_buf())).is_err() {
        return false;
    }
    let file = match File::open(path) {
        Ok(f) => f,
        Err(error) => {
            return tx
                .send(ReadEvent::Failed {
                    path: path.to_path_buf(),
                    error,
                })
                .is_ok();
        }
    };
    for line in BufReader::new(file).lines() {
        let event = match line {
            Ok(line) => ReadEvent::Line(line),
            Err(error) => {
                return tx
                    .send(ReadEvent::Failed {
                        path: path.to_path_buf(),
                        error,
                    })
                    .is_ok();
            }
        };
        if tx.send(event).is_err() {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_collect_sorted_skips_hidden() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join(".hidden"), "h").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("c.txt"), "c").unwrap();

        let files = collect_input_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.txt"),
                PathBuf::from("b.txt"),
                PathBuf::from("sub").join("c.txt")
            ]
        );
    }

    #[test]
    fn test_reader_streams_lines_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("in.txt");
        std::fs::write(&path, "one\ntwo\nthree\n").unwrap();

        let (rx, handle) = spawn_reader(vec![path], 1);
        let lines: Vec<String> = rx
            .iter()
            .filter_map(|e| match e {
                ReadEvent::Line(l) => Some(l),
                _ => None,
            })
            .collect();
        handle.join().unwrap();
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_reader_stops_when_receiver_dropped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.txt");
        std::fs::write(&path, "line\n".repeat(10_000)).unwrap();

        let (rx, handle) = spawn_reader(vec![path], 2);
        drop(rx);
        handle.join().unwrap();
    }
}
