use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;

use msgproxy_core::{Pushed, Result, RunState, Source, Stage, StageError};

/// Delivers one whole file as a single chunk, then ends the transport.
pub struct FileSource {
    path: PathBuf,
    consumed: bool,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(StageError::invalid_option(format!(
                "file source '{}' does not exist or is not a regular file",
                path.display()
            )));
        }
        Ok(Self {
            path,
            consumed: false,
        })
    }
}

impl Source for FileSource {
    fn pull(&mut self) -> Result<Bytes> {
        if self.consumed {
            return Err(StageError::EndOfTransport);
        }
        self.consumed = true;
        let contents = std::fs::read(&self.path)?;
        debug!(path = ?self.path, size = contents.len(), "read file source");
        Ok(Bytes::from(contents))
    }
}

/// Appends every chunk to one file, created on first use.
pub struct FileSink {
    file: File,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self { file })
    }
}

impl Stage for FileSink {
    fn push(&mut self, _state: RunState, input: Option<Bytes>) -> Result<Pushed> {
        if let Some(bytes) = input {
            self.file.write_all(&bytes)?;
            self.file.flush()?;
        }
        Ok(Pushed::none())
    }
}
