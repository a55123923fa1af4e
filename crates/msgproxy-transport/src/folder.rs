use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;

use msgproxy_core::{Pushed, Result, RunState, Source, Stage, StageError};

/// Delivers each file in a folder as one chunk, in file-name order, then
/// ends the transport.
pub struct FolderSource {
    files: VecDeque<PathBuf>,
}

impl FolderSource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(StageError::invalid_option(format!(
                "folder source '{}' is not a directory",
                dir.display()
            )));
        }

        let pattern = dir.join("*");
        let pattern = pattern.to_str().ok_or_else(|| {
            StageError::invalid_option(format!("folder path '{}' is not UTF-8", dir.display()))
        })?;
        let mut files: Vec<PathBuf> = glob::glob(pattern)
            .map_err(|err| StageError::invalid_option(format!("folder glob: {err}")))?
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .collect();
        // Glob order is filesystem-dependent; pin it to file-name order.
        files.sort();

        debug!(dir = ?dir, count = files.len(), "folder source scanned");
        Ok(Self {
            files: files.into(),
        })
    }
}

impl Source for FolderSource {
    fn pull(&mut self) -> Result<Bytes> {
        let path = self.files.pop_front().ok_or(StageError::EndOfTransport)?;
        let contents = std::fs::read(&path)?;
        debug!(path = ?path, size = contents.len(), "read folder entry");
        Ok(Bytes::from(contents))
    }
}

/// Writes each chunk to a new file named by a monotonically increasing
/// zero-padded sequence number.
pub struct FolderSink {
    dir: PathBuf,
    sequence: u64,
}

impl FolderSink {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, sequence: 0 })
    }

    fn next_path(&mut self) -> PathBuf {
        self.sequence += 1;
        self.dir.join(format!("{:06}.msg", self.sequence))
    }
}

impl Stage for FolderSink {
    fn push(&mut self, _state: RunState, input: Option<Bytes>) -> Result<Pushed> {
        if let Some(bytes) = input {
            let path = self.next_path();
            std::fs::write(&path, &bytes)?;
            debug!(path = ?path, size = bytes.len(), "wrote folder entry");
        }
        Ok(Pushed::none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "msgproxy-folder-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    #[test]
    fn source_yields_files_in_name_order() {
        let dir = unique_temp_dir("order");
        std::fs::write(dir.join("b.txt"), b"second").unwrap();
        std::fs::write(dir.join("a.txt"), b"first").unwrap();
        std::fs::write(dir.join("c.txt"), b"third").unwrap();

        let mut source = FolderSource::open(&dir).unwrap();
        assert_eq!(source.pull().unwrap().as_ref(), b"first");
        assert_eq!(source.pull().unwrap().as_ref(), b"second");
        assert_eq!(source.pull().unwrap().as_ref(), b"third");
        assert!(matches!(
            source.pull().unwrap_err(),
            StageError::EndOfTransport
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_folder_ends_immediately() {
        let dir = unique_temp_dir("empty");
        let mut source = FolderSource::open(&dir).unwrap();
        assert!(matches!(
            source.pull().unwrap_err(),
            StageError::EndOfTransport
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn sink_numbers_files_monotonically() {
        let dir = unique_temp_dir("sink");
        let out = dir.join("out");

        let mut sink = FolderSink::open(&out).unwrap();
        sink.push(RunState::Active, Some(Bytes::from_static(b"m1")))
            .unwrap();
        sink.push(RunState::Active, Some(Bytes::from_static(b"m2")))
            .unwrap();
        sink.push(RunState::End, None).unwrap();

        assert_eq!(std::fs::read(out.join("000001.msg")).unwrap(), b"m1");
        assert_eq!(std::fs::read(out.join("000002.msg")).unwrap(), b"m2");
        assert!(!out.join("000003.msg").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
